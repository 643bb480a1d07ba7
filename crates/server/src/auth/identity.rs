use hololith_core::UserId;
use serde::Serialize;
use utoipa::ToSchema;

/// The authenticated caller, inserted into request extensions by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// Public view of a user account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: UserId,
    pub email: String,
}

impl From<&AuthUser> for UserInfo {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
        }
    }
}
