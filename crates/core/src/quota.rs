//! Pure plan-quota arithmetic.
//!
//! Usage is always measured from live counts supplied by the caller; nothing
//! here caches or mutates state.

use thiserror::Error;

use crate::plan::Quotas;

/// A plan limit that would be exceeded by the requested operation.
///
/// The rendered message names the limit and its numeric threshold so that
/// operators and users can see exactly which allowance was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuotaViolation {
    #[error("Plan limit reached: maxStores={0}. Upgrade required.")]
    MaxStores(u32),

    #[error("Plan limit reached: maxProductsPerStore={0}. Upgrade required.")]
    MaxProductsPerStore(u32),

    #[error("Plan limit reached: maxProductsTotal={0}. Upgrade required.")]
    MaxProductsTotal(u32),

    #[error("Tag tier not allowed by plan. tagTier={tier}, maxTagTier={max}.")]
    TagTier { tier: u8, max: u8 },
}

impl QuotaViolation {
    /// Name of the quota field that was violated.
    #[must_use]
    pub fn limit_name(&self) -> &'static str {
        match self {
            Self::MaxStores(_) => "maxStores",
            Self::MaxProductsPerStore(_) => "maxProductsPerStore",
            Self::MaxProductsTotal(_) => "maxProductsTotal",
            Self::TagTier { .. } => "maxTagTier",
        }
    }
}

/// Check whether one more store fits under the plan.
pub fn check_store_quota(quotas: &Quotas, store_count: u64) -> Result<(), QuotaViolation> {
    if store_count >= u64::from(quotas.max_stores) {
        return Err(QuotaViolation::MaxStores(quotas.max_stores));
    }
    Ok(())
}

/// Check whether one more product fits, both in the target store and across the tenant.
///
/// The per-store limit is reported first when both are exhausted.
pub fn check_product_quota(
    quotas: &Quotas,
    products_in_store: u64,
    products_total: u64,
) -> Result<(), QuotaViolation> {
    if products_in_store >= u64::from(quotas.max_products_per_store) {
        return Err(QuotaViolation::MaxProductsPerStore(
            quotas.max_products_per_store,
        ));
    }
    if let Some(max_total) = quotas.max_products_total
        && products_total >= u64::from(max_total)
    {
        return Err(QuotaViolation::MaxProductsTotal(max_total));
    }
    Ok(())
}

/// Check whether a tag of the given tier may be used under the plan.
pub fn check_tag_tier(quotas: &Quotas, tag_tier: u8) -> Result<(), QuotaViolation> {
    if tag_tier > quotas.max_tag_tier {
        return Err(QuotaViolation::TagTier {
            tier: tag_tier,
            max: quotas.max_tag_tier,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotas(stores: u32, per_store: u32, total: Option<u32>, tier: u8) -> Quotas {
        Quotas {
            max_stores: stores,
            max_products_per_store: per_store,
            max_products_total: total,
            max_tag_tier: tier,
        }
    }

    #[test]
    fn store_quota_boundary() {
        let q = quotas(1, 10, None, 1);
        assert!(check_store_quota(&q, 0).is_ok());
        let err = check_store_quota(&q, 1).unwrap_err();
        assert_eq!(err, QuotaViolation::MaxStores(1));
        assert!(err.to_string().contains("maxStores=1"));
        assert!(err.to_string().contains("Upgrade required"));
    }

    #[test]
    fn zero_store_quota_rejects_everything() {
        let q = quotas(0, 10, None, 1);
        assert!(check_store_quota(&q, 0).is_err());
    }

    #[test]
    fn per_store_limit_takes_precedence() {
        let q = quotas(5, 2, Some(2), 1);
        let err = check_product_quota(&q, 2, 2).unwrap_err();
        assert_eq!(err.limit_name(), "maxProductsPerStore");
        assert!(err.to_string().contains("maxProductsPerStore=2"));
    }

    #[test]
    fn total_limit_applies_across_stores() {
        let q = quotas(5, 10, Some(3), 1);
        assert!(check_product_quota(&q, 0, 2).is_ok());
        let err = check_product_quota(&q, 0, 3).unwrap_err();
        assert_eq!(err, QuotaViolation::MaxProductsTotal(3));
    }

    #[test]
    fn absent_total_limit_is_unbounded() {
        let q = quotas(5, 10, None, 1);
        assert!(check_product_quota(&q, 9, 1_000_000).is_ok());
    }

    #[test]
    fn tag_tier_gate() {
        let q = quotas(1, 1, None, 2);
        assert!(check_tag_tier(&q, 1).is_ok());
        assert!(check_tag_tier(&q, 2).is_ok());
        let err = check_tag_tier(&q, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tag tier not allowed by plan. tagTier=3, maxTagTier=2."
        );
    }
}
