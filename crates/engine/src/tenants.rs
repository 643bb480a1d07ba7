use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use hololith_core::catalog::validate_min_len;
use hololith_core::{MemberRole, Membership, MembershipId, Tenant, TenantId, UserId};
use hololith_store::Repository;

use crate::clock::Clock;
use crate::error::EngineError;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateTenant {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
    pub owner_id: UserId,
}

/// One entry of the caller's tenant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TenantMembership {
    pub tenant: TenantSummary,
    pub role: MemberRole,
    pub membership_id: MembershipId,
}

#[derive(Clone)]
pub struct TenantService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl TenantService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Create a tenant owned by `owner`, who becomes its first `TENANT_ADMIN`.
    pub async fn create(&self, owner: &UserId, input: &CreateTenant) -> Result<Tenant, EngineError> {
        validate_min_len("name", &input.name, 2)?;

        let now = self.clock.now();
        let tenant = Tenant {
            id: TenantId::generate(),
            name: input.name.trim().to_owned(),
            owner_id: owner.clone(),
            created_at: now,
        };
        let membership = Membership {
            id: MembershipId::generate(),
            tenant_id: tenant.id.clone(),
            user_id: owner.clone(),
            role: MemberRole::TenantAdmin,
            created_at: now,
        };
        self.repo.create_tenant(&tenant, &membership).await?;

        info!(tenant_id = %tenant.id, owner_id = %owner, "tenant created");
        Ok(tenant)
    }

    /// Every tenant the user belongs to, oldest membership first.
    pub async fn list_mine(&self, user: &UserId) -> Result<Vec<TenantMembership>, EngineError> {
        let memberships = self.repo.list_memberships(user).await?;
        Ok(memberships
            .into_iter()
            .map(|(membership, tenant)| TenantMembership {
                tenant: TenantSummary {
                    id: tenant.id,
                    name: tenant.name,
                    owner_id: tenant.owner_id,
                },
                role: membership.role,
                membership_id: membership.id,
            })
            .collect())
    }

    /// The user's membership in a tenant, if any.
    pub async fn membership(
        &self,
        tenant: &TenantId,
        user: &UserId,
    ) -> Result<Option<Membership>, EngineError> {
        Ok(self.repo.get_membership(tenant, user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn owner_becomes_admin() {
        let fx = Fixture::new();
        let user = fx.user("founder@example.com").await;
        let tenant = fx
            .engine
            .tenants()
            .create(&user, &CreateTenant { name: "  Founders  ".into() })
            .await
            .unwrap();
        assert_eq!(tenant.name, "Founders");

        let membership = fx
            .engine
            .tenants()
            .membership(&tenant.id, &user)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.role, MemberRole::TenantAdmin);

        let mine = fx.engine.tenants().list_mine(&user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].tenant.id, tenant.id);
        assert_eq!(mine[0].membership_id, membership.id);
    }

    #[tokio::test]
    async fn short_names_are_rejected() {
        let fx = Fixture::new();
        let user = fx.user("short@example.com").await;
        let err = fx
            .engine
            .tenants()
            .create(&user, &CreateTenant { name: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(m) if m == "name must be at least 2 characters"));
    }

    #[tokio::test]
    async fn strangers_have_no_membership() {
        let fx = Fixture::new();
        let tenant = fx.tenant("private").await;
        let stranger = fx.user("stranger@example.com").await;
        assert!(
            fx.engine
                .tenants()
                .membership(&tenant, &stranger)
                .await
                .unwrap()
                .is_none()
        );
        assert!(fx.engine.tenants().list_mine(&stranger).await.unwrap().is_empty());
    }
}
