//! User routes: own profile, avatar, and user administration.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, Paginated, Pagination, QueryParams};
use crate::routes::ensure_tenant;
use crate::services::upload_service::{remove_upload, save_avatar};
use crate::AppState;
use stockline_core::validation::{
    validate_email, validate_optional_text, validate_password, validate_required_text,
};
use stockline_core::{RoleName, Tenant, User, MAX_AVATAR_BYTES};
use stockline_db::repository::user::{NewUser, UserUpdate};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/profile", get(get_profile).patch(update_profile))
        .route(
            "/profile/avatar",
            post(upload_avatar)
                .delete(delete_avatar)
                .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: RoleName,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<RoleName>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A user together with their tenant.
#[derive(Debug, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub tenant: Option<Tenant>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Validates the profile fields shared by both update endpoints.
async fn build_update(
    state: &AppState,
    user_id: &str,
    email: Option<&str>,
    full_name: Option<&str>,
    bio: Option<&str>,
    password: Option<&str>,
) -> Result<UserUpdate, ApiError> {
    let email = email.map(validate_email).transpose()?;
    if let Some(email) = &email {
        if state.db.users().email_taken(email, Some(user_id)).await? {
            return Err(ApiError::Conflict("Email is already in use".to_string()));
        }
    }

    let full_name = full_name
        .map(|n| validate_required_text("full_name", n, 100))
        .transpose()?;
    let bio = match bio {
        Some(b) => Some(validate_optional_text("bio", Some(b), 500)?.unwrap_or_default()),
        None => None,
    };
    let password_hash = match password {
        Some(p) => {
            validate_password(p)?;
            Some(hash_password(p)?)
        }
        None => None,
    };

    Ok(UserUpdate {
        email,
        full_name,
        bio,
        password_hash,
        role: None,
    })
}

/// Loads a user of the caller's tenant: 404 when missing, 403 when foreign.
async fn load_in_tenant(state: &AppState, caller: &AuthUser, id: &str) -> Result<User, ApiError> {
    let user = state
        .db
        .users()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    ensure_tenant(&user.tenant_id, &caller.tenant_id)?;
    Ok(user)
}

// =============================================================================
// Profile
// =============================================================================

/// GET /users/profile
async fn get_profile(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let user = state
        .db
        .users()
        .get(&caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let tenant = state.db.tenants().get(&user.tenant_id).await?;

    Ok(Json(Profile { user, tenant }))
}

/// PATCH /users/profile - Tenant and role cannot change here
async fn update_profile(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let update = build_update(
        &state,
        &caller.id,
        req.email.as_deref(),
        req.full_name.as_deref(),
        req.bio.as_deref(),
        req.password.as_deref(),
    )
    .await?;

    let user = state.db.users().update(&caller.id, update).await?;
    Ok(Json(user))
}

/// POST /users/profile/avatar - multipart field `avatar`
async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            warn!(user_id = %caller.id, error = %e, "Avatar upload rejected");
            ApiError::Validation("avatar must be at most 5MB".to_string())
        })?;
        upload = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| ApiError::Validation("avatar file is required".to_string()))?;

    let url = save_avatar(&state.config.upload_dir, &caller.id, &content_type, &bytes).await?;

    let previous = match state.db.users().set_avatar(&caller.id, Some(&url)).await {
        Ok(previous) => previous,
        Err(e) => {
            remove_upload(&state.config.upload_dir, &url).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous {
        remove_upload(&state.config.upload_dir, &old).await;
    }

    info!(user_id = %caller.id, url = %url, "Avatar updated");
    Ok(Json(json!({ "avatar_url": url })))
}

/// DELETE /users/profile/avatar
async fn delete_avatar(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(old) = state.db.users().set_avatar(&caller.id, None).await? {
        remove_upload(&state.config.upload_dir, &old).await;
    }

    Ok(Json(json!({ "avatar_url": null })))
}

// =============================================================================
// Administration
// =============================================================================

/// POST /users - Create a user in the caller's tenant
async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    caller.require_admin()?;

    let email = validate_email(&req.email)?;
    let full_name = validate_required_text("full_name", &req.full_name, 100)?;
    validate_password(&req.password)?;

    if state.db.users().email_taken(&email, None).await? {
        return Err(ApiError::Conflict("Email is already in use".to_string()));
    }

    let user = state
        .db
        .users()
        .create(NewUser {
            tenant_id: caller.tenant_id.clone(),
            role: req.role,
            email,
            password_hash: hash_password(&req.password)?,
            full_name,
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, created_by = %caller.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Paginated<User>>, ApiError> {
    caller.require_admin()?;

    let pagination = Pagination::new(query.page, query.limit)?;
    let (users, total) = state
        .db
        .users()
        .list_by_tenant(&caller.tenant_id, pagination.request())
        .await?;

    Ok(Json(Paginated::new(users, total, pagination)))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(load_in_tenant(&state, &caller, &id).await?))
}

/// PATCH /users/{id} - ADMIN or the user themself; only ADMIN changes roles
async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let target = load_in_tenant(&state, &caller, &id).await?;

    if !caller.is_admin() && target.id != caller.id {
        return Err(ApiError::Forbidden("You can only update your own account".to_string()));
    }
    if req.role.is_some() && !caller.is_admin() {
        return Err(ApiError::Forbidden("Only administrators can change roles".to_string()));
    }

    let mut update = build_update(
        &state,
        &target.id,
        req.email.as_deref(),
        req.full_name.as_deref(),
        req.bio.as_deref(),
        req.password.as_deref(),
    )
    .await?;
    update.role = req.role;

    let user = state.db.users().update(&target.id, update).await?;
    Ok(Json(user))
}

/// DELETE /users/{id}
async fn delete_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;

    let target = load_in_tenant(&state, &caller, &id).await?;
    if target.id == caller.id {
        return Err(ApiError::Forbidden("You cannot delete your own account".to_string()));
    }

    state.db.users().delete(&target.id).await?;
    if let Some(avatar) = &target.avatar_url {
        remove_upload(&state.config.upload_dir, avatar).await;
    }

    info!(user_id = %target.id, deleted_by = %caller.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
