use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use hololith_core::UserId;

use super::identity::AuthUser;

/// JWT claims embedded in issued tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    pub email: String,
    /// Unique token ID, so two tokens issued in the same second still differ.
    pub jti: String,
    /// Expiry (seconds since epoch).
    pub exp: usize,
}

/// Issues and validates HMAC-signed tokens of one kind (access or refresh).
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtManager {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Issue a token for the given user.
    pub fn issue_token(&self, user: &AuthUser) -> Result<String, String> {
        #[allow(clippy::cast_possible_truncation)]
        let exp = jsonwebtoken::get_current_timestamp() as usize + self.expiry_seconds as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| format!("JWT encoding failed: {e}"))
    }

    /// Check the signature and expiry and return the token's user.
    pub fn validate_token(&self, token: &str) -> Result<AuthUser, String> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| format!("invalid token: {e}"))?;

        Ok(AuthUser {
            id: UserId::new(token_data.claims.sub),
            email: token_data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AuthUser {
        AuthUser {
            id: UserId::new("user-1"),
            email: "alice@example.com".into(),
        }
    }

    #[test]
    fn issued_tokens_validate() {
        let manager = JwtManager::new("an-access-secret-of-length", 900);
        let token = manager.issue_token(&alice()).unwrap();
        assert_eq!(manager.validate_token(&token).unwrap(), alice());
    }

    #[test]
    fn tokens_are_unique() {
        let manager = JwtManager::new("an-access-secret-of-length", 900);
        let a = manager.issue_token(&alice()).unwrap();
        let b = manager.issue_token(&alice()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn other_secret_is_rejected() {
        let access = JwtManager::new("an-access-secret-of-length", 900);
        let refresh = JwtManager::new("a-refresh-secret-of-length", 900);
        let token = access.issue_token(&alice()).unwrap();
        assert!(refresh.validate_token(&token).is_err());
        assert!(access.validate_token("not.a.token").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let manager = JwtManager::new("an-access-secret-of-length", 0);
        let claims = Claims {
            sub: "user-1".into(),
            email: "alice@example.com".into(),
            jti: "j".into(),
            exp: 1,
        };
        let token = encode(&Header::default(), &claims, &manager.encoding_key).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }
}
