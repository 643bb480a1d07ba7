//! View deduplication and the tenant analytics reports.
//!
//! Each submitted view passes through validation, a publish check of its
//! target, viewer hashing and finally either a keyed upsert (identified
//! viewers) or a raw insert (anonymous views). The storage layer's unique
//! idempotency key is what guarantees one row per viewer, target and UTC day.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use hololith_core::analytics::window_start_instant;
use hololith_core::{
    AnalyticsEvent, StoreId, TenantId, TrackOutcome, ViewEventInput, ViewTarget, ViewTotals,
    WeekSeries, hash_viewer,
};
use hololith_store::Repository;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::stores::owned_store;

/// Maximum events accepted by one batch submission.
pub const MAX_BATCH_EVENTS: usize = 50;

/// Trailing seven-day totals for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub store_id: StoreId,
    pub totals: ViewTotals,
}

#[derive(Clone)]
pub struct ViewDedupEngine {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl ViewDedupEngine {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Record one view.
    ///
    /// Fails with [`EngineError::InvalidInput`] for a malformed event and with
    /// [`EngineError::NotFound`] when the target is missing or unpublished.
    /// Nothing is written in either case.
    pub async fn track_view(&self, input: &ViewEventInput) -> Result<TrackOutcome, EngineError> {
        let target = input.target()?;
        let viewer = input.viewer_id()?;
        self.ensure_published(&target).await?;

        let event = AnalyticsEvent::for_target(&target, viewer.map(hash_viewer), self.clock.now());
        if let Some(key) = &event.idempotency_key {
            let inserted = self.repo.upsert_event_by_key(&event).await?;
            debug!(event_type = %event.event_type, key = %key, inserted, "keyed view recorded");
            return Ok(TrackOutcome {
                ok: true,
                deduped: true,
            });
        }

        self.repo.insert_event(&event).await?;
        debug!(event_type = %event.event_type, target = target.target_id(), "anonymous view recorded");
        Ok(TrackOutcome {
            ok: true,
            deduped: false,
        })
    }

    /// Record up to [`MAX_BATCH_EVENTS`] views, each independently.
    ///
    /// Returns how many were accepted. Rejected events are logged and skipped;
    /// earlier events are never rolled back.
    pub async fn track_batch(&self, events: &[ViewEventInput]) -> Result<usize, EngineError> {
        if events.len() > MAX_BATCH_EVENTS {
            warn!(size = events.len(), "view batch rejected");
            return Err(EngineError::InvalidInput(format!(
                "events must contain at most {MAX_BATCH_EVENTS} items"
            )));
        }

        let mut accepted = 0;
        for (index, event) in events.iter().enumerate() {
            match self.track_view(event).await {
                Ok(_) => accepted += 1,
                Err(e) => debug!(index, error = %e, "batch event skipped"),
            }
        }
        Ok(accepted)
    }

    async fn store_published(&self, id: &StoreId) -> Result<bool, EngineError> {
        Ok(self
            .repo
            .get_store(id)
            .await?
            .is_some_and(|store| store.status.is_published()))
    }

    /// Resolve the target and require it, and the store that owns it, to be published.
    async fn ensure_published(&self, target: &ViewTarget) -> Result<(), EngineError> {
        let (visible, what) = match target {
            ViewTarget::Store(id) => (self.store_published(id).await?, "Store"),
            ViewTarget::Product(id) => {
                let visible = match self.repo.get_product(id).await? {
                    Some(product) if product.status.is_published() => {
                        self.store_published(&product.store_id).await?
                    }
                    _ => false,
                };
                (visible, "Product")
            }
            ViewTarget::Page(id) => {
                let visible = match self.repo.get_page(id).await? {
                    Some(page) if page.status.is_published() => {
                        self.store_published(&page.store_id).await?
                    }
                    _ => false,
                };
                (visible, "Page")
            }
        };

        if visible {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("{what} not found")))
        }
    }

    /// Lifetime view counts per type across the tenant's content.
    pub async fn overview(&self, tenant: &TenantId) -> Result<ViewTotals, EngineError> {
        Ok(self.repo.count_views(tenant, None).await?)
    }

    /// Seven zero-filled UTC day buckets ending today.
    pub async fn last_7_days(&self, tenant: &TenantId) -> Result<WeekSeries, EngineError> {
        let now = self.clock.now();
        let since = window_start_instant(now);
        let stamps = self.repo.view_timestamps(tenant, since).await?;
        Ok(WeekSeries::build(now.date_naive(), stamps))
    }

    /// Trailing seven-day totals for one of the tenant's stores.
    pub async fn store_stats(
        &self,
        tenant: &TenantId,
        store: &StoreId,
    ) -> Result<StoreStats, EngineError> {
        owned_store(self.repo.as_ref(), tenant, store).await?;
        let since = window_start_instant(self.clock.now());
        let totals = self.repo.count_store_views(store, since).await?;
        Ok(StoreStats {
            store_id: store.clone(),
            totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use hololith_core::{PageId, Store, ViewEventType};
    use hololith_store::AnalyticsStore;
    use serde_json::json;

    use super::*;
    use crate::pages::CreatePage;
    use crate::testing::Fixture;

    async fn published_store(fx: &Fixture, name: &str) -> (TenantId, Store) {
        let tenant = fx.tenant(name).await;
        let store = fx.store(&tenant, name).await;
        let store = fx.engine.stores().publish(&tenant, &store.id).await.unwrap();
        (tenant, store)
    }

    fn store_view(store: &StoreId, viewer: Option<&str>) -> ViewEventInput {
        ViewEventInput::for_target(
            &ViewTarget::Store(store.clone()),
            viewer.map(str::to_owned),
        )
    }

    #[tokio::test]
    async fn same_viewer_same_day_is_one_row() {
        let fx = Fixture::new();
        let (tenant, store) = published_store(&fx, "dedup").await;
        let views = fx.engine.views();

        let v1 = store_view(&store.id, Some("viewer-one"));
        assert!(views.track_view(&v1).await.unwrap().deduped);
        assert!(views.track_view(&v1).await.unwrap().deduped);
        assert_eq!(views.overview(&tenant).await.unwrap().store_views, 1);

        views
            .track_view(&store_view(&store.id, Some("viewer-two")))
            .await
            .unwrap();
        assert_eq!(views.overview(&tenant).await.unwrap().store_views, 2);

        fx.clock.advance(Duration::hours(24));
        views.track_view(&v1).await.unwrap();
        assert_eq!(views.overview(&tenant).await.unwrap().store_views, 3);
    }

    #[tokio::test]
    async fn keys_are_per_utc_day() {
        let fx = Fixture::new();
        let (_, store) = published_store(&fx, "midnight").await;
        let view = store_view(&store.id, Some("night-owl"));
        let hash = hash_viewer("night-owl");

        fx.clock
            .set(Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 30).unwrap());
        fx.engine.views().track_view(&view).await.unwrap();
        fx.clock.advance(Duration::minutes(1));
        fx.engine.views().track_view(&view).await.unwrap();

        for day in ["2026-03-10", "2026-03-11"] {
            let key = format!("STORE_VIEW:{}:{hash}:{day}", store.id);
            assert_eq!(fx.repo.count_events_with_key(&key).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn anonymous_views_always_insert() {
        let fx = Fixture::new();
        let (tenant, store) = published_store(&fx, "anon").await;
        for _ in 0..3 {
            let outcome = fx
                .engine
                .views()
                .track_view(&store_view(&store.id, None))
                .await
                .unwrap();
            assert!(!outcome.deduped);
        }
        assert_eq!(fx.engine.views().overview(&tenant).await.unwrap().store_views, 3);
    }

    #[tokio::test]
    async fn drafts_are_not_found_and_write_nothing() {
        let fx = Fixture::new();
        let tenant = fx.tenant("drafts").await;
        let store = fx.store(&tenant, "drafts").await;
        let product = fx.product(&tenant, &store.id, "hidden").await;
        let views = fx.engine.views();

        let err = views
            .track_view(&store_view(&store.id, Some("viewer-one")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(m) if m == "Store not found"));

        // Published product in a draft store is still hidden.
        fx.engine.products().publish(&tenant, &product.id).await.unwrap();
        let product_view =
            ViewEventInput::for_target(&ViewTarget::Product(product.id.clone()), None);
        let err = views.track_view(&product_view).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(m) if m == "Product not found"));

        let missing = ViewEventInput::for_target(&ViewTarget::Page(PageId::new("ghost")), None);
        assert!(matches!(
            views.track_view(&missing).await,
            Err(EngineError::NotFound(m)) if m == "Page not found"
        ));

        assert_eq!(views.overview(&tenant).await.unwrap(), ViewTotals::default());
    }

    #[tokio::test]
    async fn malformed_events_are_invalid() {
        let fx = Fixture::new();
        let views = fx.engine.views();

        let unknown = ViewEventInput {
            event_type: "CLICK".into(),
            ..ViewEventInput::default()
        };
        assert!(matches!(
            views.track_view(&unknown).await,
            Err(EngineError::InvalidInput(m)) if m == "Invalid analytics view type"
        ));

        let missing_id = ViewEventInput {
            event_type: "PRODUCT_VIEW".into(),
            store_id: Some("s".into()),
            ..ViewEventInput::default()
        };
        assert!(matches!(
            views.track_view(&missing_id).await,
            Err(EngineError::InvalidInput(m)) if m == "productId is required for PRODUCT_VIEW"
        ));

        let short_viewer = store_view(&StoreId::new("s"), Some("short"));
        assert!(matches!(
            views.track_view(&short_viewer).await,
            Err(EngineError::InvalidInput(m)) if m.starts_with("viewerId must be between")
        ));
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let fx = Fixture::new();
        let (tenant, store) = published_store(&fx, "batch").await;
        let events = vec![
            store_view(&store.id, Some("viewer-one")),
            store_view(&StoreId::new("missing"), None),
            ViewEventInput::default(),
            store_view(&store.id, None),
        ];
        assert_eq!(fx.engine.views().track_batch(&events).await.unwrap(), 2);
        assert_eq!(fx.engine.views().overview(&tenant).await.unwrap().store_views, 2);

        let too_many = vec![store_view(&store.id, None); MAX_BATCH_EVENTS + 1];
        let err = fx.engine.views().track_batch(&too_many).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(m) if m == "events must contain at most 50 items"));
        assert_eq!(fx.engine.views().overview(&tenant).await.unwrap().store_views, 2);
    }

    #[tokio::test]
    async fn last_7_days_is_zero_filled() {
        let fx = Fixture::new();
        let (tenant, store) = published_store(&fx, "weekly").await;
        let product = fx.product(&tenant, &store.id, "weekly-item").await;
        fx.engine.products().publish(&tenant, &product.id).await.unwrap();

        fx.clock.set(Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap());
        fx.engine.views().track_view(&store_view(&store.id, None)).await.unwrap();
        fx.clock.set(Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap());
        let product_view = ViewEventInput::for_target(&ViewTarget::Product(product.id.clone()), None);
        fx.engine.views().track_view(&product_view).await.unwrap();
        fx.engine.views().track_view(&product_view).await.unwrap();

        let series = fx.engine.views().last_7_days(&tenant).await.unwrap();
        assert_eq!(series.start, "2026-03-04");
        assert_eq!(series.days.len(), 7);
        let dates: Vec<NaiveDate> = series
            .days
            .iter()
            .map(|d| NaiveDate::parse_from_str(&d.date, "%Y-%m-%d").unwrap())
            .collect();
        assert!(dates.windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
        assert_eq!(series.days[0].store_views, 1);
        assert_eq!(series.days[6].product_views, 2);
        assert!(series.days[1..6].iter().all(|d| d.store_views + d.product_views == 0));

        // A day later the oldest view falls out of the window.
        fx.clock.advance(Duration::days(1));
        let series = fx.engine.views().last_7_days(&tenant).await.unwrap();
        assert_eq!(series.start, "2026-03-05");
        assert!(series.days.iter().all(|d| d.store_views == 0));
    }

    #[tokio::test]
    async fn store_stats_scope_and_window() {
        let fx = Fixture::new();
        let (tenant, store) = published_store(&fx, "stats").await;
        let (other, _) = published_store(&fx, "elsewhere").await;
        let page = fx
            .engine
            .pages()
            .create(
                &tenant,
                &CreatePage {
                    store_id: store.id.clone(),
                    title: "Home".into(),
                    slug: "home".into(),
                    content: json!({ "version": 1, "blocks": [] }),
                },
            )
            .await
            .unwrap();
        fx.engine.pages().publish(&tenant, &page.id).await.unwrap();

        fx.engine.views().track_view(&store_view(&store.id, None)).await.unwrap();
        let page_view = ViewEventInput::for_target(&ViewTarget::Page(page.id.clone()), None);
        fx.engine.views().track_view(&page_view).await.unwrap();

        let stats = fx.engine.views().store_stats(&tenant, &store.id).await.unwrap();
        assert_eq!(stats.totals.get(ViewEventType::StoreView), 1);
        assert_eq!(stats.totals.get(ViewEventType::PageView), 1);

        assert!(matches!(
            fx.engine.views().store_stats(&other, &store.id).await,
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            fx.engine.views().store_stats(&tenant, &StoreId::new("nope")).await,
            Err(EngineError::NotFound(_))
        ));

        fx.clock.advance(Duration::days(8));
        let stats = fx.engine.views().store_stats(&tenant, &store.id).await.unwrap();
        assert_eq!(stats.totals, ViewTotals::default());
        assert_eq!(fx.engine.views().overview(&tenant).await.unwrap().page_views, 1);
    }

    #[tokio::test]
    async fn concurrent_identified_views_keep_one_row() {
        let fx = Fixture::new();
        let (tenant, store) = published_store(&fx, "racing").await;
        let view = store_view(&store.id, Some("same-viewer"));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let views = fx.engine.views().clone();
                let view = view.clone();
                tokio::spawn(async move { views.track_view(&view).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(fx.engine.views().overview(&tenant).await.unwrap().store_views, 1);
    }
}
