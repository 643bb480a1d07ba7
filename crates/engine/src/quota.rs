use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use hololith_core::quota::{check_product_quota, check_store_quota, check_tag_tier};
use hololith_core::{
    Plan, PlanDraft, Quotas, StoreId, Subscription, TenantId, TenantPlan, Usage,
};
use hololith_store::Repository;

use crate::error::EngineError;
use crate::stores::owned_store;

/// A tenant's plan together with its live usage.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BillingSummary {
    pub subscription: Subscription,
    pub plan: Plan,
    pub usage: Usage,
}

/// Enforces plan allowances before resources are created.
///
/// Every check reads live counts from the repository. Checks and the writes
/// that follow them are separate round-trips, so two concurrent creates may
/// both pass and together exceed a limit by one.
#[derive(Clone)]
pub struct QuotaEngine {
    repo: Arc<dyn Repository>,
}

impl QuotaEngine {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Get or create the tenant's subscription, creating the free plan on demand.
    ///
    /// Returns the subscription joined with its plan. The plan is `None` only if
    /// the subscription references a plan row that no longer exists.
    pub async fn ensure_tenant_subscription(
        &self,
        tenant: &TenantId,
    ) -> Result<(Subscription, Option<Plan>), EngineError> {
        if let Some(subscription) = self.repo.get_subscription(tenant).await? {
            let plan = self.repo.get_plan(&subscription.plan_id).await?;
            return Ok((subscription, plan));
        }

        let free = self.repo.get_or_create_plan(&PlanDraft::free()).await?;
        let subscription = self
            .repo
            .get_or_create_subscription(tenant, &free.id)
            .await?;
        info!(tenant_id = %tenant, plan = %free.code, "created default subscription");

        // A concurrent request may have created the subscription on another plan.
        let plan = if subscription.plan_id == free.id {
            Some(free)
        } else {
            self.repo.get_plan(&subscription.plan_id).await?
        };
        Ok((subscription, plan))
    }

    /// The tenant's subscription and plan.
    ///
    /// Fails with [`EngineError::Internal`] if the subscription's plan cannot be resolved.
    pub async fn get_tenant_plan(&self, tenant: &TenantId) -> Result<TenantPlan, EngineError> {
        let (subscription, plan) = self.ensure_tenant_subscription(tenant).await?;
        let plan = plan.ok_or_else(|| {
            EngineError::Internal(format!(
                "subscription {} references missing plan {}",
                subscription.id, subscription.plan_id
            ))
        })?;
        Ok(TenantPlan { subscription, plan })
    }

    /// Count the tenant's stores and its products across all stores.
    pub async fn compute_usage(
        &self,
        tenant: &TenantId,
        quotas: Quotas,
    ) -> Result<Usage, EngineError> {
        let stores = self.repo.count_stores(tenant).await?;
        let products_total = self.repo.count_products_for_tenant(tenant).await?;
        Ok(Usage {
            stores,
            products_total,
            quotas,
        })
    }

    pub async fn assert_can_create_store(&self, tenant: &TenantId) -> Result<(), EngineError> {
        let TenantPlan { plan, .. } = self.get_tenant_plan(tenant).await?;
        let stores = self.repo.count_stores(tenant).await?;
        debug!(tenant_id = %tenant, stores, max = plan.quotas.max_stores, "store quota check");
        check_store_quota(&plan.quotas, stores)?;
        Ok(())
    }

    /// Check both the per-store and the tenant-wide product limits.
    ///
    /// The store must belong to the tenant.
    pub async fn assert_can_create_product(
        &self,
        tenant: &TenantId,
        store: &StoreId,
    ) -> Result<(), EngineError> {
        owned_store(self.repo.as_ref(), tenant, store).await?;
        let TenantPlan { plan, .. } = self.get_tenant_plan(tenant).await?;
        let in_store = self.repo.count_products_in_store(store).await?;
        let total = self.repo.count_products_for_tenant(tenant).await?;
        debug!(
            tenant_id = %tenant,
            store_id = %store,
            in_store,
            total,
            "product quota check"
        );
        check_product_quota(&plan.quotas, in_store, total)?;
        Ok(())
    }

    pub async fn assert_tag_tier_allowed(
        &self,
        tenant: &TenantId,
        tag_tier: u8,
    ) -> Result<(), EngineError> {
        let TenantPlan { plan, .. } = self.get_tenant_plan(tenant).await?;
        debug!(tenant_id = %tenant, tag_tier, max = plan.quotas.max_tag_tier, "tag tier check");
        check_tag_tier(&plan.quotas, tag_tier)?;
        Ok(())
    }

    /// Move the tenant onto the plan with `plan_code`, resetting the status to active.
    pub async fn set_tenant_plan(
        &self,
        tenant: &TenantId,
        plan_code: &str,
    ) -> Result<TenantPlan, EngineError> {
        let plan = self
            .repo
            .get_plan_by_code(plan_code)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Plan not found: {plan_code}")))?;

        self.ensure_tenant_subscription(tenant).await?;
        let subscription = self.repo.set_subscription_plan(tenant, &plan.id).await?;
        info!(tenant_id = %tenant, plan = %plan.code, "tenant plan changed");
        Ok(TenantPlan { subscription, plan })
    }

    /// Insert or replace a plan by code.
    pub async fn upsert_plan(&self, draft: &PlanDraft) -> Result<Plan, EngineError> {
        Ok(self.repo.upsert_plan(draft).await?)
    }

    /// All plans, smallest first.
    pub async fn list_plans(&self) -> Result<Vec<Plan>, EngineError> {
        Ok(self.repo.list_plans().await?)
    }

    /// Plan, subscription and usage for the billing dashboard.
    pub async fn billing_summary(&self, tenant: &TenantId) -> Result<BillingSummary, EngineError> {
        let TenantPlan { subscription, plan } = self.get_tenant_plan(tenant).await?;
        let usage = self.compute_usage(tenant, plan.quotas).await?;
        Ok(BillingSummary {
            subscription,
            plan,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use hololith_core::{PlanId, QuotaViolation, SubscriptionStatus};
    use hololith_store::PlanStore;
    use hololith_store_memory::MemoryRepository;

    use super::*;
    use crate::testing::{self, Fixture};

    #[tokio::test]
    async fn subscription_is_created_lazily_once() {
        let fx = Fixture::new();
        let tenant = fx.tenant("lazy").await;

        let (first, plan) = fx.engine.quota().ensure_tenant_subscription(&tenant).await.unwrap();
        assert_eq!(plan.map(|p| p.code), Some("free".to_owned()));
        assert_eq!(first.status, SubscriptionStatus::Active);

        let (second, _) = fx.engine.quota().ensure_tenant_subscription(&tenant).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(fx.repo.list_plans().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_limit_boundary() {
        let fx = Fixture::new();
        let tenant = fx.tenant("bound").await;
        let quota = fx.engine.quota();

        quota.assert_can_create_store(&tenant).await.unwrap();
        fx.store(&tenant, "only-store").await;

        let err = quota.assert_can_create_store(&tenant).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::QuotaExceeded(QuotaViolation::MaxStores(1))
        ));
        assert!(err.to_string().contains("maxStores=1"));
    }

    #[tokio::test]
    async fn product_limits_prefer_per_store() {
        let fx = Fixture::new();
        fx.engine
            .quota()
            .upsert_plan(&testing::tight_free_plan())
            .await
            .unwrap();
        let tenant = fx.tenant("products").await;
        let store = fx.store(&tenant, "tight").await;

        for slug in ["one", "two"] {
            fx.engine.quota().assert_can_create_product(&tenant, &store.id).await.unwrap();
            fx.product(&tenant, &store.id, slug).await;
        }
        let err = fx
            .engine
            .quota()
            .assert_can_create_product(&tenant, &store.id)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("maxProductsPerStore"));
    }

    #[tokio::test]
    async fn product_total_cap_applies_when_set() {
        let fx = Fixture::new();
        let mut draft = testing::tight_free_plan();
        draft.quotas.max_stores = 2;
        draft.quotas.max_products_total = Some(3);
        fx.engine.quota().upsert_plan(&draft).await.unwrap();
        let tenant = fx.tenant("total").await;
        let a = fx.store(&tenant, "total-a").await;
        let b = fx.store(&tenant, "total-b").await;
        fx.product(&tenant, &a.id, "a1").await;
        fx.product(&tenant, &a.id, "a2").await;
        fx.product(&tenant, &b.id, "b1").await;

        let err = fx
            .engine
            .quota()
            .assert_can_create_product(&tenant, &b.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::QuotaExceeded(QuotaViolation::MaxProductsTotal(3))
        ));
    }

    #[tokio::test]
    async fn product_check_requires_ownership() {
        let fx = Fixture::new();
        let owner = fx.tenant("owner").await;
        let other = fx.tenant("other").await;
        let store = fx.store(&owner, "owned").await;

        let err = fx
            .engine
            .quota()
            .assert_can_create_product(&other, &store.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn tag_tier_gate_uses_plan() {
        let fx = Fixture::new();
        let tenant = fx.tenant("tiers").await;
        let quota = fx.engine.quota();
        quota.assert_tag_tier_allowed(&tenant, 1).await.unwrap();
        let err = quota.assert_tag_tier_allowed(&tenant, 2).await.unwrap_err();
        assert!(err.to_string().contains("maxTagTier=1"));

        fx.seed().await;
        quota.set_tenant_plan(&tenant, "pro").await.unwrap();
        quota.assert_tag_tier_allowed(&tenant, 3).await.unwrap();
    }

    #[tokio::test]
    async fn set_plan_unknown_code() {
        let fx = Fixture::new();
        let tenant = fx.tenant("unknown").await;
        let err = fx
            .engine
            .quota()
            .set_tenant_plan(&tenant, "platinum")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(m) if m == "Plan not found: platinum"));
    }

    #[tokio::test]
    async fn set_plan_creates_subscription_first() {
        let fx = Fixture::new();
        fx.seed().await;
        let tenant = fx.tenant("upgrade").await;
        let moved = fx.engine.quota().set_tenant_plan(&tenant, "starter").await.unwrap();
        assert_eq!(moved.plan.code, "starter");
        assert_eq!(moved.subscription.status, SubscriptionStatus::Active);

        let summary = fx.engine.quota().billing_summary(&tenant).await.unwrap();
        assert_eq!(summary.plan.code, "starter");
        assert_eq!(summary.usage.stores, 0);
        assert_eq!(summary.usage.quotas.max_stores, 3);
    }

    #[tokio::test]
    async fn missing_plan_is_internal() {
        let repo = Arc::new(MemoryRepository::new());
        let tenant = TenantId::generate();
        repo.get_or_create_subscription(&tenant, &PlanId::new("ghost"))
            .await
            .unwrap();
        let quota = QuotaEngine::new(repo);
        let err = quota.get_tenant_plan(&tenant).await.unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }
}
