use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PlanId, SubscriptionId, TenantId};

/// Code of the plan every tenant falls back to when it has no subscription.
pub const FREE_PLAN_CODE: &str = "free";

/// Resource allowances granted by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Quotas {
    /// Maximum number of stores a tenant may own.
    pub max_stores: u32,
    /// Maximum number of products in any single store.
    pub max_products_per_store: u32,
    /// Optional cap on products across all of the tenant's stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_products_total: Option<u32>,
    /// Highest tag tier the tenant may assign.
    pub max_tag_tier: u8,
}

/// A named limit set, identified by its unique `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub code: String,
    pub name: String,
    pub quotas: Quotas,
    /// Opaque feature flags (e.g. `customDomain`, `analyticsLevel`).
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a plan by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    pub code: String,
    pub name: String,
    pub quotas: Quotas,
    pub features: serde_json::Value,
}

impl PlanDraft {
    /// The default plan created lazily for tenants without a subscription.
    #[must_use]
    pub fn free() -> Self {
        Self {
            code: FREE_PLAN_CODE.to_owned(),
            name: "Free".to_owned(),
            quotas: Quotas {
                max_stores: 1,
                max_products_per_store: 10,
                max_products_total: Some(10),
                max_tag_tier: 1,
            },
            features: serde_json::json!({ "customDomain": false, "analyticsLevel": 1 }),
        }
    }

    /// Paid plans shipped with a fresh installation.
    #[must_use]
    pub fn paid_tiers() -> Vec<Self> {
        let tier = |code: &str, name: &str, stores, per_store, total, tag_tier, custom, level| Self {
            code: code.to_owned(),
            name: name.to_owned(),
            quotas: Quotas {
                max_stores: stores,
                max_products_per_store: per_store,
                max_products_total: Some(total),
                max_tag_tier: tag_tier,
            },
            features: serde_json::json!({ "customDomain": custom, "analyticsLevel": level }),
        };

        vec![
            tier("starter", "Starter", 3, 50, 200, 2, false, 2),
            tier("pro", "Pro", 10, 200, 2_000, 3, true, 3),
            tier("business", "Business", 50, 500, 10_000, 3, true, 3),
        ]
    }
}

/// Lifecycle state of a tenant subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::PastDue => "PAST_DUE",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "PAST_DUE" => Some(Self::PastDue),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }
}

/// Links exactly one tenant to exactly one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub tenant_id: TenantId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subscription with its plan resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TenantPlan {
    pub subscription: Subscription,
    pub plan: Plan,
}

/// Live resource counts for a tenant, alongside the quotas they are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub stores: u64,
    pub products_total: u64,
    pub quotas: Quotas,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_defaults() {
        let free = PlanDraft::free();
        assert_eq!(free.code, FREE_PLAN_CODE);
        assert_eq!(free.quotas.max_stores, 1);
        assert_eq!(free.quotas.max_products_per_store, 10);
        assert_eq!(free.quotas.max_products_total, Some(10));
        assert_eq!(free.quotas.max_tag_tier, 1);
        assert_eq!(free.features["customDomain"], false);
    }

    #[test]
    fn quotas_use_camel_case_and_optional_total() {
        let quotas: Quotas =
            serde_json::from_str(r#"{"maxStores":2,"maxProductsPerStore":5,"maxTagTier":1}"#)
                .unwrap();
        assert_eq!(quotas.max_products_total, None);

        let json = serde_json::to_value(quotas).unwrap();
        assert!(json.get("maxProductsTotal").is_none());
        assert_eq!(json["maxProductsPerStore"], 5);
    }

    #[test]
    fn paid_tiers_are_ordered_by_allowance() {
        let tiers = PlanDraft::paid_tiers();
        let codes: Vec<_> = tiers.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, ["starter", "pro", "business"]);
        assert!(tiers.windows(2).all(|w| w[0].quotas.max_stores < w[1].quotas.max_stores));
    }

    #[test]
    fn subscription_status_round_trips_storage_form() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
        ] {
            assert_eq!(SubscriptionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubscriptionStatus::parse("bogus"), None);
    }
}
