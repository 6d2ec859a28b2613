//! JWT authentication module.
//!
//! Handles token generation and validation, plus password hashing.
//!
//! ## Token Pair
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  access  (60 min)  sub, email, tenant_id, role, jti, token_type=access │
//! │  refresh (7 days)  same claims, token_type=refresh                     │
//! │                    jti stored in refresh_tokens for rotation           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use stockline_core::{RoleName, User};

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub email: String,

    pub tenant_id: String,

    pub role: RoleName,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access" or "refresh")
    pub token_type: String,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_lifetime_secs", &self.access_lifetime_secs)
            .field("refresh_lifetime_secs", &self.refresh_lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: &str, access_lifetime_secs: i64, refresh_lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token.
    pub fn generate_access_token(&self, user: &User) -> Result<IssuedToken, ApiError> {
        self.issue(user, ACCESS, self.access_lifetime_secs)
    }

    /// Generate a refresh token. Its `jti` must be stored before handing it out.
    pub fn generate_refresh_token(&self, user: &User) -> Result<IssuedToken, ApiError> {
        self.issue(user, REFRESH, self.refresh_lifetime_secs)
    }

    fn issue(&self, user: &User, token_type: &str, lifetime_secs: i64) -> Result<IssuedToken, ApiError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(lifetime_secs);
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            tenant_id: user.tenant_id.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: jti.clone(),
            token_type: token_type.to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate {token_type} token: {e}")))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {e}")))?;

        Ok(token_data.claims)
    }

    /// Validate that a token is an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != ACCESS {
            return Err(ApiError::Unauthorized("Expected access token".to_string()));
        }

        Ok(claims)
    }

    /// Validate that a token is a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != REFRESH {
            return Err(ApiError::Unauthorized("Expected refresh token".to_string()));
        }

        Ok(claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a password against its stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "user-001".to_string(),
            tenant_id: "tenant-001".to_string(),
            role_id: "role-001".to_string(),
            role: RoleName::Manager,
            email: "bo@acme.test".to_string(),
            full_name: "Bo".to_string(),
            bio: None,
            avatar_url: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 3600, 86400);

        let access = manager.generate_access_token(&user()).unwrap();
        let claims = manager.validate_access_token(&access.token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.tenant_id, "tenant-001");
        assert_eq!(claims.role, RoleName::Manager);
        assert_eq!(claims.jti, access.jti);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_wrong_token_type() {
        let manager = JwtManager::new("test-secret", 3600, 86400);

        let access = manager.generate_access_token(&user()).unwrap();
        assert!(manager.validate_refresh_token(&access.token).is_err());

        let refresh = manager.generate_refresh_token(&user()).unwrap();
        assert!(manager.validate_access_token(&refresh.token).is_err());
        assert!(refresh.expires_at > access.expires_at);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let a = JwtManager::new("secret-a", 3600, 86400);
        let b = JwtManager::new("secret-b", 3600, 86400);

        let token = a.generate_access_token(&user()).unwrap();
        assert!(matches!(b.validate_access_token(&token.token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
