//! Order routes.
//!
//! Creating an order only checks stock. Stock moves when the status does:
//!
//! ```text
//!   PATCH { status: "completed" }   pending   → completed   deduct every line
//!   PATCH { status: "cancelled" }   completed → cancelled   restore every line
//!   PATCH { status: "cancelled" }   pending   → cancelled   no stock change
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, PageMeta, Pagination, QueryParams};
use crate::AppState;
use stockline_core::validation::{validate_optional_text, validate_quantity, validate_search_query};
use stockline_core::{OrderStatus, ValidationError};
use stockline_db::repository::order::{
    NewOrder, NewOrderLine, OrderQuery, OrderRow, OrderSort, OrderWithItems,
};
use stockline_db::DbError;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats/pending-count", get(pending_count))
        .route("/{id}", get(get_order).patch(update_order).delete(delete_order))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

/// Page metadata for orders, which also carry `last_page`.
#[derive(Debug, Serialize)]
pub struct OrderPageMeta {
    #[serde(flatten)]
    pub page: PageMeta,
    pub last_page: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub data: Vec<OrderRow>,
    pub meta: OrderPageMeta,
}

fn parse_sort(value: Option<&str>) -> Result<OrderSort, ValidationError> {
    match value.map(str::trim).unwrap_or_default() {
        "" | "newest" => Ok(OrderSort::Newest),
        "oldest" => Ok(OrderSort::Oldest),
        "highest_total" => Ok(OrderSort::HighestTotal),
        "lowest_total" => Ok(OrderSort::LowestTotal),
        _ => Err(ValidationError::NotAllowed {
            field: "sort".to_string(),
            allowed: ["newest", "oldest", "highest_total", "lowest_total"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }),
    }
}

/// GET /orders/stats/pending-count
async fn pending_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.db.orders().pending_count(&user.tenant_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// POST /orders
async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::Validation("items must contain at least one item".to_string()));
    }

    let mut seen = HashSet::new();
    for item in &req.items {
        validate_quantity(item.quantity)?;
        if !seen.insert(item.product_id.as_str()) {
            return Err(ApiError::Validation(format!(
                "Product '{}' appears more than once",
                item.product_id
            )));
        }
    }
    let notes = validate_optional_text("notes", req.notes.as_deref(), 1000)?;

    let result = state
        .db
        .orders()
        .create(NewOrder {
            tenant_id: user.tenant_id.clone(),
            user_id: user.id.clone(),
            notes,
            lines: req
                .items
                .into_iter()
                .map(|i| NewOrderLine {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
        })
        .await;

    match result {
        Ok(order) => Ok((StatusCode::CREATED, Json(order))),
        Err(DbError::NotFound { .. }) => {
            Err(ApiError::BadRequest("One or more products not found".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<OrderListQuery>,
) -> Result<Json<OrderPage>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;

    let (rows, total) = state
        .db
        .orders()
        .list(
            &user.tenant_id,
            &OrderQuery {
                status,
                search: validate_search_query(query.search.as_deref())?,
                sort: parse_sort(query.sort.as_deref())?,
                page: pagination.request(),
            },
        )
        .await?;

    let page = PageMeta::new(total, pagination);
    let last_page = page.total_pages.max(1);

    Ok(Json(OrderPage {
        data: rows,
        meta: OrderPageMeta { page, last_page },
    }))
}

/// GET /orders/{id}
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderWithItems>, ApiError> {
    Ok(Json(state.db.orders().get_with_items(&user.tenant_id, &id).await?))
}

/// PATCH /orders/{id} - Status change reconciles stock atomically
async fn update_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateOrderRequest>,
) -> Result<Json<OrderWithItems>, ApiError> {
    let status = req.status.as_deref().map(str::parse::<OrderStatus>).transpose()?;
    let notes = match req.notes.as_deref() {
        Some(n) => Some(validate_optional_text("notes", Some(n), 1000)?.unwrap_or_default()),
        None => None,
    };

    let order = state
        .db
        .orders()
        .update(&user.tenant_id, &id, status, notes)
        .await?;

    Ok(Json(order))
}

/// DELETE /orders/{id} - Pending orders only
async fn delete_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.orders().delete_pending(&user.tenant_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
