//! Product routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extractors::{present, AuthUser, JsonBody, Paginated, Pagination, QueryParams};
use crate::routes::suppliers::ensure_supplier_in_tenant;
use crate::AppState;
use stockline_core::validation::{
    validate_amount, validate_optional_text, validate_required_text, validate_search_query,
    validate_sku,
};
use stockline_core::{Product, StockStatus, MAX_PRICE_CENTS, MAX_QUANTITY};
use stockline_db::repository::product::{NewProduct, ProductQuery, ProductUpdate};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(low_stock))
        .route("/sku/{sku}", get(get_by_sku))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cost_cents: i64,
    pub price_sale_cents: i64,
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub current_stock: Option<i64>,
    #[serde(default)]
    pub supplier_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_cost_cents: Option<i64>,
    #[serde(default)]
    pub price_sale_cents: Option<i64>,
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub current_stock: Option<i64>,
    /// `null` detaches the supplier.
    #[serde(default, deserialize_with = "present")]
    pub supplier_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub stock_status: Option<String>,
}

/// Each entry is `(field, value, max)`; absent values are skipped.
fn validate_amounts(fields: &[(&str, Option<i64>, i64)]) -> Result<(), ApiError> {
    for (field, value, max) in fields {
        if let Some(v) = value {
            validate_amount(field, *v, *max)?;
        }
    }
    Ok(())
}

async fn ensure_sku_free(
    state: &AppState,
    tenant_id: &str,
    sku: &str,
    exclude_id: Option<&str>,
) -> Result<(), ApiError> {
    if state.db.products().sku_taken(tenant_id, sku, exclude_id).await? {
        return Err(ApiError::Conflict(format!("Product with SKU '{sku}' already exists")));
    }
    Ok(())
}

/// POST /products
async fn create_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate_sku(&req.sku)?;
    let sku = req.sku.trim().to_string();
    let name = validate_required_text("name", &req.name, 200)?;
    let description = validate_optional_text("description", req.description.as_deref(), 2000)?;
    validate_amounts(&[
        ("price_cost_cents", Some(req.price_cost_cents), MAX_PRICE_CENTS),
        ("price_sale_cents", Some(req.price_sale_cents), MAX_PRICE_CENTS),
        ("min_stock", req.min_stock, MAX_QUANTITY),
        ("current_stock", req.current_stock, MAX_QUANTITY),
    ])?;

    if let Some(supplier_id) = &req.supplier_id {
        ensure_supplier_in_tenant(&state, &user.tenant_id, supplier_id).await?;
    }
    ensure_sku_free(&state, &user.tenant_id, &sku, None).await?;

    let product = state
        .db
        .products()
        .create(NewProduct {
            tenant_id: user.tenant_id.clone(),
            supplier_id: req.supplier_id,
            sku,
            name,
            description,
            price_cost_cents: req.price_cost_cents,
            price_sale_cents: req.price_sale_cents,
            min_stock: req.min_stock.unwrap_or(0),
            current_stock: req.current_stock.unwrap_or(0),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products
async fn list_products(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<ProductListQuery>,
) -> Result<Json<Paginated<Product>>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    let stock_status = match query.stock_status.as_deref() {
        Some(s) => s.parse::<StockStatus>()?,
        None => StockStatus::All,
    };

    let (products, total) = state
        .db
        .products()
        .list(
            &user.tenant_id,
            &ProductQuery {
                search: validate_search_query(query.search.as_deref())?,
                stock_status,
                page: pagination.request(),
            },
        )
        .await?;

    Ok(Json(Paginated::new(products, total, pagination)))
}

/// GET /products/low-stock
async fn low_stock(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.db.products().low_stock(&user.tenant_id).await?))
}

/// GET /products/sku/{sku}
async fn get_by_sku(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(sku): Path<String>,
) -> Result<Json<Product>, ApiError> {
    state
        .db
        .products()
        .get_by_sku(&user.tenant_id, &sku)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product with SKU '{sku}' not found")))
}

/// GET /products/{id}
async fn get_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    state
        .db
        .products()
        .get(&user.tenant_id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product"))
}

/// PATCH /products/{id}
async fn update_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    if state.db.products().get(&user.tenant_id, &id).await?.is_none() {
        return Err(ApiError::not_found("Product"));
    }

    let sku = match req.sku.as_deref() {
        Some(sku) => {
            validate_sku(sku)?;
            let sku = sku.trim().to_string();
            ensure_sku_free(&state, &user.tenant_id, &sku, Some(&id)).await?;
            Some(sku)
        }
        None => None,
    };
    let name = req
        .name
        .as_deref()
        .map(|n| validate_required_text("name", n, 200))
        .transpose()?;
    let description = match req.description.as_deref() {
        Some(d) => Some(validate_optional_text("description", Some(d), 2000)?.unwrap_or_default()),
        None => None,
    };
    validate_amounts(&[
        ("price_cost_cents", req.price_cost_cents, MAX_PRICE_CENTS),
        ("price_sale_cents", req.price_sale_cents, MAX_PRICE_CENTS),
        ("min_stock", req.min_stock, MAX_QUANTITY),
        ("current_stock", req.current_stock, MAX_QUANTITY),
    ])?;
    if let Some(Some(supplier_id)) = &req.supplier_id {
        ensure_supplier_in_tenant(&state, &user.tenant_id, supplier_id).await?;
    }

    let product = state
        .db
        .products()
        .update(
            &user.tenant_id,
            &id,
            ProductUpdate {
                supplier_id: req.supplier_id,
                sku,
                name,
                description,
                price_cost_cents: req.price_cost_cents,
                price_sale_cents: req.price_sale_cents,
                min_stock: req.min_stock,
                current_stock: req.current_stock,
            },
        )
        .await?;

    Ok(Json(product))
}

/// DELETE /products/{id}
async fn delete_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.products().delete(&user.tenant_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
