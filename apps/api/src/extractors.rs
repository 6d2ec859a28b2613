//! Custom Axum extractors and pagination helpers.
//!
//! ```text
//!   Authorization: Bearer <jwt>  ──►  AuthUser { id, tenant_id, role }
//!   JSON body                    ──►  JsonBody<T>     (rejections → 400)
//!   ?page=2&limit=20             ──►  Pagination      (page ≥ 1, 1 ≤ limit ≤ 100)
//! ```

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::auth::extract_bearer_token;
use crate::error::ApiError;
use crate::AppState;
use stockline_core::{RoleName, MAX_PAGE_SIZE};
use stockline_db::PageRequest;

// =============================================================================
// Authentication
// =============================================================================

/// The caller, taken from a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub tenant_id: String,
    pub role: RoleName,
    /// Listed in `platform_admins`; may act on any tenant.
    pub platform_admin: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == RoleName::Admin
    }

    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[RoleName]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %self.role, "Role check failed");
            Err(ApiError::Forbidden(
                "Insufficient permissions for this action".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_role(&[RoleName::Admin])
    }

    pub fn require_platform_admin(&self) -> Result<(), ApiError> {
        if self.platform_admin {
            Ok(())
        } else {
            warn!(user_id = %self.id, "Platform admin check failed");
            Err(ApiError::Forbidden(
                "Only platform administrators can do this".to_string(),
            ))
        }
    }

    /// Fails with 403 unless `tenant_id` is the caller's own tenant or the
    /// caller is a platform admin.
    pub fn require_tenant(&self, tenant_id: &str) -> Result<(), ApiError> {
        if self.platform_admin || self.tenant_id == tenant_id {
            Ok(())
        } else {
            warn!(user_id = %self.id, tenant_id, "Cross-tenant access denied");
            Err(ApiError::Forbidden("Access denied to this tenant".to_string()))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".to_string()))?;

        let claims = state.jwt.validate_access_token(token)?;

        Ok(AuthUser {
            platform_admin: state.config.is_platform_admin(&claims.email),
            id: claims.sub,
            email: claims.email,
            tenant_id: claims.tenant_id,
            role: claims.role,
        })
    }
}

// =============================================================================
// Body and Query
// =============================================================================

/// `Json<T>` whose rejections use the API error format.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::Validation(e.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// `Query<T>` whose rejections use the API error format.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::Validation(e.body_text()))?;
        Ok(QueryParams(value))
    }
}

/// Distinguishes an absent field from an explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "present")]` on an
/// `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`.
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// =============================================================================
// Pagination
// =============================================================================

/// Validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Validates `page` (≥ 1, default 1) and `limit` (1..=`max`, default 10).
    pub fn with_max(page: Option<u32>, limit: Option<u32>, max: u32) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);

        if page < 1 {
            return Err(ApiError::Validation("page must be at least 1".to_string()));
        }
        if limit < 1 || limit > max {
            return Err(ApiError::Validation(format!("limit must be between 1 and {max}")));
        }

        Ok(Pagination { page, limit })
    }

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, ApiError> {
        Self::with_max(page, limit, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.offset(), i64::from(self.limit))
    }
}

/// Pagination metadata returned with every list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    pub fn new(total: i64, pagination: Pagination) -> Self {
        let limit = i64::from(pagination.limit);
        let total_pages = (total + limit - 1) / limit;

        PageMeta {
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages,
            has_next_page: i64::from(pagination.page) < total_pages,
            has_prev_page: pagination.page > 1,
        }
    }
}

/// A page of results.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Paginated {
            data,
            meta: PageMeta::new(total, pagination),
        }
    }
}
