use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use hololith_core::{MemberRole, MembershipId, TenantId, UserId};

use super::AppState;
use crate::auth::identity::AuthUser;
use crate::error::ServerError;

/// Header naming the tenant a dashboard request acts on.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// The tenant a dashboard request acts on, resolved from `X-Tenant-Id` and
/// the caller's membership.
///
/// Only usable on routes behind the auth layer.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub membership_id: MembershipId,
}

impl TenantContext {
    /// Fail unless the caller administers the tenant.
    pub fn require_admin(&self) -> Result<(), ServerError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ServerError::Forbidden("Admin access required".into()))
        }
    }
}

impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServerError::Unauthorized("Unauthorized".into()))?;

        let tenant_id = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(TenantId::new)
            .ok_or_else(|| ServerError::Forbidden("Missing X-Tenant-Id header".into()))?;

        let Some(membership) = state
            .engine
            .tenants()
            .membership(&tenant_id, &user.id)
            .await?
        else {
            debug!(tenant_id = %tenant_id, user_id = %user.id, "tenant access denied");
            return Err(ServerError::Forbidden("Not a member of this tenant".into()));
        };

        Ok(Self {
            tenant_id,
            user_id: user.id,
            role: membership.role,
            membership_id: membership.id,
        })
    }
}
