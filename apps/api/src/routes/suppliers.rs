//! Supplier routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, Paginated, Pagination, QueryParams};
use crate::routes::ensure_tenant;
use crate::AppState;
use stockline_core::validation::{
    parse_sort_order, validate_email, validate_optional_text, validate_required_text,
    validate_search_query, validate_website,
};
use stockline_core::{Product, Supplier, ValidationError};
use stockline_db::repository::supplier::{SupplierFields, SupplierQuery, SupplierSort, SupplierWithCount};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/{id}",
            get(get_supplier).patch(update_supplier).delete(delete_supplier),
        )
        .route("/{id}/products", get(supplier_products))
}

/// Body of both create and update. On update every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplierRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn parse_sort(value: Option<&str>) -> Result<SupplierSort, ValidationError> {
    match value.map(str::trim).unwrap_or_default() {
        "" | "created_at" => Ok(SupplierSort::CreatedAt),
        "name" => Ok(SupplierSort::Name),
        "updated_at" => Ok(SupplierSort::UpdatedAt),
        "email" => Ok(SupplierSort::Email),
        _ => Err(ValidationError::NotAllowed {
            field: "sort_by".to_string(),
            allowed: ["name", "created_at", "updated_at", "email"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }),
    }
}

/// Validates the optional fields of a request. `name` is handled by the
/// caller since it is required on create only.
fn optional_fields(req: &SupplierRequest, name: String) -> Result<SupplierFields, ApiError> {
    let email = match req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => Some(validate_email(e)?),
        None => None,
    };
    let website = validate_optional_text("website", req.website.as_deref(), 255)?;
    if let Some(w) = &website {
        validate_website(w)?;
    }

    Ok(SupplierFields {
        name,
        contact_person: validate_optional_text("contact_person", req.contact_person.as_deref(), 100)?,
        email,
        phone: validate_optional_text("phone", req.phone.as_deref(), 50)?,
        address: validate_optional_text("address", req.address.as_deref(), 255)?,
        website,
        notes: validate_optional_text("notes", req.notes.as_deref(), 2000)?,
    })
}

/// Loads a supplier: 404 when missing, 403 when in another tenant.
async fn load_in_tenant(state: &AppState, tenant_id: &str, id: &str) -> Result<Supplier, ApiError> {
    let supplier = state
        .db
        .suppliers()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Supplier"))?;
    ensure_tenant(&supplier.tenant_id, tenant_id)?;
    Ok(supplier)
}

/// 400 unless `supplier_id` names a supplier of the tenant. Used when a
/// supplier is referenced from a product or a stock movement.
pub(crate) async fn ensure_supplier_in_tenant(
    state: &AppState,
    tenant_id: &str,
    supplier_id: &str,
) -> Result<(), ApiError> {
    match state.db.suppliers().get(supplier_id).await? {
        Some(s) if s.tenant_id == tenant_id => Ok(()),
        _ => Err(ApiError::BadRequest(format!("Supplier '{supplier_id}' not found"))),
    }
}

/// POST /suppliers
async fn create_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<SupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    let name = validate_required_text("name", req.name.as_deref().unwrap_or_default(), 100)?;
    let fields = optional_fields(&req, name)?;

    let supplier = state.db.suppliers().create(&user.tenant_id, fields).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// GET /suppliers
async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<SupplierListQuery>,
) -> Result<Json<Paginated<SupplierWithCount>>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;

    let (suppliers, total) = state
        .db
        .suppliers()
        .list(
            &user.tenant_id,
            &SupplierQuery {
                search: validate_search_query(query.search.as_deref())?,
                sort: parse_sort(query.sort_by.as_deref())?,
                ascending: parse_sort_order(query.sort_order.as_deref())?,
                page: pagination.request(),
            },
        )
        .await?;

    Ok(Json(Paginated::new(suppliers, total, pagination)))
}

/// GET /suppliers/{id}
async fn get_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SupplierWithCount>, ApiError> {
    load_in_tenant(&state, &user.tenant_id, &id).await?;

    state
        .db
        .suppliers()
        .get_with_count(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Supplier"))
}

/// PATCH /suppliers/{id}
async fn update_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SupplierRequest>,
) -> Result<Json<Supplier>, ApiError> {
    let existing = load_in_tenant(&state, &user.tenant_id, &id).await?;

    let name = match req.name.as_deref() {
        Some(n) => validate_required_text("name", n, 100)?,
        None => existing.name,
    };
    let fields = optional_fields(&req, name)?;

    Ok(Json(state.db.suppliers().update(&id, fields).await?))
}

/// DELETE /suppliers/{id}
async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_in_tenant(&state, &user.tenant_id, &id).await?;
    state.db.suppliers().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /suppliers/{id}/products
async fn supplier_products(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    load_in_tenant(&state, &user.tenant_id, &id).await?;
    Ok(Json(state.db.suppliers().products(&id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort(None).unwrap(), SupplierSort::CreatedAt);
        assert_eq!(parse_sort(Some("email")).unwrap(), SupplierSort::Email);
        assert!(parse_sort(Some("phone")).is_err());
    }
}
