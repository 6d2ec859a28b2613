//! Tenant routes.
//!
//! ```text
//!   GET    /tenants            platform admin: every tenant, ADMIN: own tenant
//!   POST   /tenants            platform admin
//!   GET    /tenants/{id}       members of the tenant, platform admin
//!   PATCH  /tenants/{id}       ADMIN of the tenant (name only), platform admin
//!   DELETE /tenants/{id}       ADMIN of the tenant, platform admin
//! ```
//!
//! Platform admins are the accounts listed in `platform_admins`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, Paginated, Pagination, QueryParams};
use crate::AppState;
use stockline_core::validation::validate_required_text;
use stockline_core::{PlanType, Tenant};
use stockline_db::repository::tenant::{TenantUpdate, TenantWithCounts};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tenants).post(create_tenant))
        .route("/settings", patch(update_settings))
        .route(
            "/{id}",
            get(get_tenant).patch(update_tenant).delete(delete_tenant),
        )
        .route("/{id}/stats", get(tenant_stats))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTenantRequest {
    pub name: String,
    #[serde(default)]
    pub plan_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTenantRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TenantStats {
    pub tenant: Tenant,
    pub users_count: i64,
    pub products_count: i64,
}

async fn ensure_name_free(state: &AppState, name: &str, exclude_id: Option<&str>) -> Result<(), ApiError> {
    if state.db.tenants().name_taken(name, exclude_id).await? {
        return Err(ApiError::Conflict(format!("Tenant name '{name}' already exists")));
    }
    Ok(())
}

async fn load_visible(state: &AppState, user: &AuthUser, id: &str) -> Result<TenantWithCounts, ApiError> {
    user.require_tenant(id)?;

    state
        .db
        .tenants()
        .get_with_counts(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant"))
}

/// PATCH /tenants/settings - Rename the caller's own tenant
async fn update_settings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<SettingsRequest>,
) -> Result<Json<Tenant>, ApiError> {
    user.require_admin()?;

    let name = validate_required_text("name", &req.name, 100)?;
    ensure_name_free(&state, &name, Some(&user.tenant_id)).await?;

    let tenant = state
        .db
        .tenants()
        .update(
            &user.tenant_id,
            TenantUpdate {
                name: Some(name),
                ..TenantUpdate::default()
            },
        )
        .await?;

    Ok(Json(tenant))
}

/// POST /tenants
async fn create_tenant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Tenant>), ApiError> {
    user.require_platform_admin()?;

    let name = validate_required_text("name", &req.name, 100)?;
    let plan_type = match req.plan_type.as_deref() {
        Some(plan) => plan.parse::<PlanType>()?,
        None => PlanType::default(),
    };
    ensure_name_free(&state, &name, None).await?;

    let tenant = state.db.tenants().create(&name, plan_type).await?;
    info!(tenant_id = %tenant.id, created_by = %user.id, "Tenant created by platform admin");

    Ok((StatusCode::CREATED, Json(tenant)))
}

/// GET /tenants
async fn list_tenants(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Paginated<TenantWithCounts>>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    if user.platform_admin {
        let (tenants, total) = state.db.tenants().list(pagination.request()).await?;
        return Ok(Json(Paginated::new(tenants, total, pagination)));
    }

    user.require_admin()?;
    let own = load_visible(&state, &user, &user.tenant_id).await?;
    let rows = if pagination.offset() == 0 {
        vec![own]
    } else {
        Vec::new()
    };
    Ok(Json(Paginated::new(rows, 1, pagination)))
}

/// GET /tenants/{id}
async fn get_tenant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TenantWithCounts>, ApiError> {
    Ok(Json(load_visible(&state, &user, &id).await?))
}

/// GET /tenants/{id}/stats
async fn tenant_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TenantStats>, ApiError> {
    let row = load_visible(&state, &user, &id).await?;

    Ok(Json(TenantStats {
        tenant: row.tenant,
        users_count: row.users_count,
        products_count: row.products_count,
    }))
}

/// PATCH /tenants/{id}
async fn update_tenant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateTenantRequest>,
) -> Result<Json<Tenant>, ApiError> {
    user.require_admin()?;
    user.require_tenant(&id)?;
    if req.plan_type.is_some() || req.is_active.is_some() {
        user.require_platform_admin()?;
    }

    if state.db.tenants().get(&id).await?.is_none() {
        return Err(ApiError::not_found("Tenant"));
    }

    let name = req
        .name
        .as_deref()
        .map(|n| validate_required_text("name", n, 100))
        .transpose()?;
    if let Some(name) = &name {
        ensure_name_free(&state, name, Some(&id)).await?;
    }
    let plan_type = req.plan_type.as_deref().map(str::parse::<PlanType>).transpose()?;

    let tenant = state
        .db
        .tenants()
        .update(
            &id,
            TenantUpdate {
                name,
                plan_type,
                is_active: req.is_active,
            },
        )
        .await?;

    Ok(Json(tenant))
}

/// DELETE /tenants/{id}
async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require_admin()?;
    user.require_tenant(&id)?;

    state.db.tenants().delete(&id).await?;
    info!(tenant_id = %id, deleted_by = %user.id, "Tenant deleted");

    Ok(StatusCode::NO_CONTENT)
}
