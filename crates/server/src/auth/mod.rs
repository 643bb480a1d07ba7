pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use hololith_core::tenant::normalize_email;
use hololith_core::{User, UserId};
use hololith_engine::{Clock, EngineError};
use hololith_store::{Repository, StoreError};

use crate::config::AuthConfig;
use crate::error::ServerError;

use self::identity::{AuthUser, UserInfo};
use self::jwt::JwtManager;
use self::password::{hash_password, verify_password};

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;

const EMAIL_IN_USE: &str = "Email already in use";
const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH: &str = "Invalid refresh";

/// Tokens handed out by register, login and refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: UserInfo,
    pub access_token: String,
    pub refresh_token: String,
}

/// Account registration, login and token rotation.
///
/// Only an argon2 hash of the most recently issued refresh token is stored,
/// so issuing a new pair invalidates the previous refresh token.
pub struct AuthProvider {
    access: JwtManager,
    refresh: JwtManager,
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl AuthProvider {
    pub fn new(config: &AuthConfig, repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            access: JwtManager::new(&config.access_secret, config.access_expiry_seconds),
            refresh: JwtManager::new(&config.refresh_secret, config.refresh_expiry_seconds),
            repo,
            clock,
        }
    }

    /// Validate an access token.
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, String> {
        self.access.validate_token(token)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession, ServerError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServerError::BadRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.repo.find_user_by_email(&email).await.map_err(engine)?.is_some() {
            return Err(ServerError::BadRequest(EMAIL_IN_USE.into()));
        }

        let user = User {
            id: UserId::generate(),
            email,
            password_hash: hash_password(password).map_err(ServerError::Internal)?,
            refresh_token_hash: None,
            created_at: self.clock.now(),
        };
        match self.repo.create_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(ServerError::BadRequest(EMAIL_IN_USE.into())),
            Err(e) => return Err(engine(e)),
        }
        info!(user_id = %user.id, "user registered");

        self.issue_session(AuthUser {
            id: user.id,
            email: user.email,
        })
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ServerError> {
        let email = normalize_email(email);
        let user = self
            .repo
            .find_user_by_email(&email)
            .await
            .map_err(engine)?
            .ok_or_else(|| ServerError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        if !verify_password(&user.password_hash, password) {
            warn!(user_id = %user.id, "login rejected");
            return Err(ServerError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        self.issue_session(AuthUser {
            id: user.id,
            email: user.email,
        })
        .await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, ServerError> {
        let invalid = || ServerError::Unauthorized(INVALID_REFRESH.into());

        let claimed = self.refresh.validate_token(refresh_token).map_err(|_| invalid())?;
        let user = self
            .repo
            .get_user(&claimed.id)
            .await
            .map_err(engine)?
            .ok_or_else(invalid)?;
        let stored = user.refresh_token_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(stored, refresh_token) {
            return Err(invalid());
        }

        self.issue_session(AuthUser {
            id: user.id,
            email: user.email,
        })
        .await
    }

    /// Forget the stored refresh token.
    pub async fn logout(&self, user: &AuthUser) -> Result<(), ServerError> {
        self.repo
            .set_refresh_token_hash(&user.id, None)
            .await
            .map_err(engine)?;
        info!(user_id = %user.id, "user logged out");
        Ok(())
    }

    /// The current account, as stored.
    pub async fn me(&self, user: &AuthUser) -> Result<UserInfo, ServerError> {
        let stored = self
            .repo
            .get_user(&user.id)
            .await
            .map_err(engine)?
            .ok_or_else(|| ServerError::Unauthorized("Unauthorized".into()))?;
        Ok(UserInfo {
            id: stored.id,
            email: stored.email,
        })
    }

    async fn issue_session(&self, user: AuthUser) -> Result<AuthSession, ServerError> {
        let access_token = self.access.issue_token(&user).map_err(ServerError::Internal)?;
        let refresh_token = self.refresh.issue_token(&user).map_err(ServerError::Internal)?;
        let refresh_hash = hash_password(&refresh_token).map_err(ServerError::Internal)?;
        self.repo
            .set_refresh_token_hash(&user.id, Some(&refresh_hash))
            .await
            .map_err(engine)?;

        Ok(AuthSession {
            user: UserInfo::from(&user),
            access_token,
            refresh_token,
        })
    }
}

fn engine(e: StoreError) -> ServerError {
    ServerError::Engine(EngineError::Store(e))
}

fn validate_email(email: &str) -> Result<(), ServerError> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !email.chars().any(char::is_whitespace)
    });
    if valid {
        Ok(())
    } else {
        Err(ServerError::BadRequest("email must be an email".into()))
    }
}

#[cfg(test)]
mod tests {
    use hololith_engine::SystemClock;
    use hololith_store_memory::MemoryRepository;

    use super::*;

    fn provider() -> AuthProvider {
        AuthProvider::new(
            &AuthConfig::default(),
            Arc::new(MemoryRepository::new()),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("a@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("nope").is_err());
    }

    #[tokio::test]
    async fn register_normalizes_and_rejects_duplicates() {
        let auth = provider();
        let session = auth.register("  Alice@Example.com ", "password123").await.unwrap();
        assert_eq!(session.user.email, "alice@example.com");
        assert_eq!(
            auth.authenticate(&session.access_token).unwrap().id,
            session.user.id
        );

        let err = auth.register("alice@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(m) if m == EMAIL_IN_USE));

        let err = auth.register("bob@example.com", "short").await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[tokio::test]
    async fn login_checks_password() {
        let auth = provider();
        auth.register("carol@example.com", "password123").await.unwrap();
        assert!(auth.login("CAROL@example.com", "password123").await.is_ok());

        for (email, password) in [
            ("carol@example.com", "wrong-password"),
            ("nobody@example.com", "password123"),
        ] {
            let err = auth.login(email, password).await.unwrap_err();
            assert!(matches!(err, ServerError::Unauthorized(m) if m == INVALID_CREDENTIALS));
        }
    }

    #[tokio::test]
    async fn refresh_rotates_and_logout_revokes() {
        let auth = provider();
        let first = auth.register("dave@example.com", "password123").await.unwrap();

        let second = auth.refresh(&first.refresh_token).await.unwrap();
        assert_eq!(second.user.id, first.user.id);

        // The first refresh token was replaced by the rotation.
        let err = auth.refresh(&first.refresh_token).await.unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(m) if m == INVALID_REFRESH));

        // An access token is not a refresh token.
        assert!(auth.refresh(&second.access_token).await.is_err());

        let user = auth.authenticate(&second.access_token).unwrap();
        auth.logout(&user).await.unwrap();
        assert!(auth.refresh(&second.refresh_token).await.is_err());
        assert_eq!(auth.me(&user).await.unwrap().email, "dave@example.com");
    }
}
