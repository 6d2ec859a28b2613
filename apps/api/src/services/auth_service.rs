//! Account registration, login and refresh-token rotation.
//!
//! ## Refresh Rotation
//! ```text
//!   client ── refresh R1 ──► validate JWT ──► row R1 live? ──► rotate R1 → R2
//!                                                 │               (one tx)
//!                                                 │ revoked
//!                                                 ▼
//!                                   reuse: revoke every token of the user, 401
//! ```

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, JwtManager};
use crate::error::ApiError;
use crate::AppState;
use stockline_core::validation::{validate_email, validate_password, validate_required_text};
use stockline_core::{Tenant, User};
use stockline_db::repository::tenant::NewAccount;
use stockline_db::repository::token::Rotation;
use stockline_db::Database;

/// Access and refresh token pair handed to the client.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

/// Input of [`AuthService::register`].
#[derive(Debug)]
pub struct Registration<'a> {
    pub business_name: &'a str,
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Authentication service.
pub struct AuthService<'a> {
    db: &'a Database,
    jwt: &'a JwtManager,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        AuthService {
            db: &state.db,
            jwt: &state.jwt,
        }
    }

    /// Creates a tenant together with its first ADMIN user.
    pub async fn register(&self, input: Registration<'_>) -> Result<(Tenant, TokenPair), ApiError> {
        let business_name = validate_required_text("business_name", input.business_name, 100)?;
        let full_name = validate_required_text("full_name", input.full_name, 100)?;
        let email = validate_email(input.email)?;
        validate_password(input.password)?;

        if self.db.tenants().name_taken(&business_name, None).await? {
            return Err(ApiError::Conflict(format!(
                "Business name '{business_name}' is already registered"
            )));
        }
        if self.db.users().email_taken(&email, None).await? {
            return Err(ApiError::Conflict("Email is already registered".to_string()));
        }

        let (tenant, user) = self
            .db
            .tenants()
            .register(NewAccount {
                business_name,
                full_name,
                email,
                password_hash: hash_password(input.password)?,
            })
            .await?;

        info!(tenant_id = %tenant.id, user_id = %user.id, "Account registered");
        let pair = self.issue_pair(user).await?;
        Ok((tenant, pair))
    }

    /// Checks credentials and issues a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        let email = email.trim().to_lowercase();

        let Some((user, hash)) = self.db.users().credentials(&email).await? else {
            warn!(email = %email, "Login for unknown email");
            return Err(invalid_credentials());
        };

        if !verify_password(password, &hash) {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(invalid_credentials());
        }

        self.db.refresh_tokens().purge_expired(&user.id).await?;
        self.db.users().touch_last_login(&user.id).await?;

        let user = self
            .db
            .users()
            .get(&user.id)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))?;

        info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");
        self.issue_pair(user).await
    }

    /// Exchanges a live refresh token for a new pair.
    ///
    /// ## Returns
    /// * `Err(Unauthorized)` - invalid, expired, unknown or reused token.
    ///   Reuse additionally revokes every refresh token of the user.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;

        let record = self
            .db
            .refresh_tokens()
            .get(&claims.jti)
            .await?
            .filter(|r| r.user_id == claims.sub)
            .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".to_string()))?;

        if record.revoked_at.is_none() && !record.is_live(Utc::now()) {
            return Err(ApiError::Unauthorized("Refresh token expired".to_string()));
        }

        let user = self
            .db
            .users()
            .get(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".to_string()))?;

        let next = self.jwt.generate_refresh_token(&user)?;
        let rotation = self
            .db
            .refresh_tokens()
            .rotate(&record.id, &next.jti, &user.id, next.expires_at)
            .await?;

        match rotation {
            Rotation::Rotated => {
                let access = self.jwt.generate_access_token(&user)?;
                Ok(TokenPair {
                    access_token: access.token,
                    refresh_token: next.token,
                    token_type: "Bearer",
                    expires_in: self.jwt.access_lifetime_secs(),
                    user,
                })
            }
            Rotation::Reused => Err(ApiError::Unauthorized(
                "Refresh token reuse detected, all sessions revoked".to_string(),
            )),
            Rotation::Unknown => Err(ApiError::Unauthorized("Invalid refresh token".to_string())),
        }
    }

    /// Revokes the given refresh token when it belongs to `user_id`, or all
    /// of the user's tokens otherwise.
    pub async fn logout(&self, user_id: &str, refresh_token: Option<&str>) -> Result<u64, ApiError> {
        let own_jti = refresh_token
            .and_then(|t| self.jwt.validate_refresh_token(t).ok())
            .filter(|claims| claims.sub == user_id)
            .map(|claims| claims.jti);

        let revoked = match own_jti {
            Some(jti) => {
                self.db.refresh_tokens().revoke(&jti).await?;
                1
            }
            None => self.db.refresh_tokens().revoke_all(user_id).await?,
        };

        info!(user_id = %user_id, revoked, "User logged out");
        Ok(revoked)
    }

    async fn issue_pair(&self, user: User) -> Result<TokenPair, ApiError> {
        let access = self.jwt.generate_access_token(&user)?;
        let refresh = self.jwt.generate_refresh_token(&user)?;

        self.db
            .refresh_tokens()
            .insert(&refresh.jti, &user.id, refresh.expires_at)
            .await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
            expires_in: self.jwt.access_lifetime_secs(),
            user,
        })
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".to_string())
}
