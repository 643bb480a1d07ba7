use serde::Serialize;
use tracing::info;

use hololith_core::{PlanDraft, TagDraft};
use hololith_store::Repository;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::tags::tag_from_draft;

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub plans: usize,
    pub tags_created: usize,
}

/// Upsert the built-in plans and create any missing built-in tags.
///
/// Safe to run repeatedly: plans are replaced by code and existing tags are left alone.
pub async fn seed_catalog(
    repo: &dyn Repository,
    clock: &dyn Clock,
) -> Result<SeedReport, EngineError> {
    let mut report = SeedReport::default();

    for draft in std::iter::once(PlanDraft::free()).chain(PlanDraft::paid_tiers()) {
        repo.upsert_plan(&draft).await?;
        report.plans += 1;
    }

    for draft in TagDraft::seed() {
        if repo.find_tag_by_slug(&draft.slug).await?.is_some() {
            continue;
        }
        match repo.insert_tag(&tag_from_draft(draft, clock.now())).await {
            Ok(()) => report.tags_created += 1,
            // Another seeder got there first.
            Err(hololith_store::StoreError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    info!(plans = report.plans, tags_created = report.tags_created, "seed catalog applied");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use hololith_store::{PlanStore, TagStore};

    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let fx = Fixture::new();
        let first = seed_catalog(fx.repo.as_ref(), fx.clock.as_ref()).await.unwrap();
        assert_eq!(first, SeedReport { plans: 4, tags_created: 3 });

        let second = seed_catalog(fx.repo.as_ref(), fx.clock.as_ref()).await.unwrap();
        assert_eq!(second.tags_created, 0);

        let codes: Vec<String> = fx
            .repo
            .list_plans()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.code)
            .collect();
        assert_eq!(codes, ["free", "starter", "pro", "business"]);
        assert_eq!(fx.repo.list_tags().await.unwrap().len(), 3);
    }
}
