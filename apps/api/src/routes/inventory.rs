//! Inventory routes: stock movements and their history.
//!
//! ```text
//!   POST /inventory/transaction   { product_id, type, quantity, reason?, supplier_id? }
//!   POST /inventory/in            { product_id, quantity, reason?, supplier_id? }
//!   POST /inventory/out           { product_id, quantity, reason? }
//!   POST /inventory/adjustment    { product_id, quantity, reason? }   quantity = new stock
//! ```

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody, Paginated, Pagination, QueryParams};
use crate::routes::suppliers::ensure_supplier_in_tenant;
use crate::AppState;
use stockline_core::validation::validate_optional_text;
use stockline_core::{Product, TransactionType, ValidationError, MAX_QUANTITY};
use stockline_db::repository::inventory::{
    InventorySummary, MovementOutcome, NewMovement, TransactionDetail, TransactionFilter,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transaction", post(create_transaction))
        .route("/in", post(stock_in))
        .route("/out", post(stock_out))
        .route("/adjustment", post(adjustment))
        .route("/transactions", get(list_transactions))
        .route("/transactions/product/{product_id}", get(product_transactions))
        .route("/summary", get(summary))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionRequest {
    pub product_id: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockInRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovementRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductTransactions {
    pub product: Product,
    #[serde(flatten)]
    pub page: Paginated<TransactionDetail>,
}

/// Validates and records one movement.
async fn record(
    state: &AppState,
    user: &AuthUser,
    product_id: String,
    kind: TransactionType,
    quantity: i64,
    reason: Option<String>,
    supplier_id: Option<String>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    if quantity < kind.min_quantity() {
        return Err(if kind.min_quantity() == 0 {
            ValidationError::Negative {
                field: "quantity".to_string(),
            }
        } else {
            ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
        }
        .into());
    }
    if quantity > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: kind.min_quantity(),
            max: MAX_QUANTITY,
        }
        .into());
    }
    let reason = validate_optional_text("reason", reason.as_deref(), 255)?;
    if let Some(supplier_id) = &supplier_id {
        ensure_supplier_in_tenant(state, &user.tenant_id, supplier_id).await?;
    }

    let outcome = state
        .db
        .inventory()
        .record(NewMovement {
            tenant_id: user.tenant_id.clone(),
            product_id,
            user_id: user.id.clone(),
            supplier_id,
            kind,
            quantity,
            reason,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /inventory/transaction
async fn create_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<TransactionRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    let kind = req.transaction_type.parse::<TransactionType>()?;
    record(&state, &user, req.product_id, kind, req.quantity, req.reason, req.supplier_id).await
}

/// POST /inventory/in
async fn stock_in(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<StockInRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    record(
        &state,
        &user,
        req.product_id,
        TransactionType::In,
        req.quantity,
        req.reason,
        req.supplier_id,
    )
    .await
}

/// POST /inventory/out
async fn stock_out(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<MovementRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    record(&state, &user, req.product_id, TransactionType::Out, req.quantity, req.reason, None).await
}

/// POST /inventory/adjustment - `quantity` is the counted stock level
async fn adjustment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<MovementRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), ApiError> {
    record(
        &state,
        &user,
        req.product_id,
        TransactionType::Adjustment,
        req.quantity,
        req.reason,
        None,
    )
    .await
}

/// GET /inventory/transactions
async fn list_transactions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<TransactionListQuery>,
) -> Result<Json<Paginated<TransactionDetail>>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    let kind = query
        .transaction_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::parse::<TransactionType>)
        .transpose()?;

    let (rows, total) = state
        .db
        .inventory()
        .list(
            &user.tenant_id,
            &TransactionFilter {
                kind,
                page: pagination.request(),
                ..TransactionFilter::default()
            },
        )
        .await?;

    Ok(Json(Paginated::new(rows, total, pagination)))
}

/// GET /inventory/transactions/product/{product_id}
async fn product_transactions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<String>,
    QueryParams(query): QueryParams<TransactionListQuery>,
) -> Result<Json<ProductTransactions>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;

    let product = state
        .db
        .products()
        .get(&user.tenant_id, &product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;

    let (rows, total) = state
        .db
        .inventory()
        .list(
            &user.tenant_id,
            &TransactionFilter {
                product_id: Some(product.id.clone()),
                page: pagination.request(),
                ..TransactionFilter::default()
            },
        )
        .await?;

    Ok(Json(ProductTransactions {
        product,
        page: Paginated::new(rows, total, pagination),
    }))
}

/// GET /inventory/summary
async fn summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<InventorySummary>, ApiError> {
    Ok(Json(state.db.inventory().summary(&user.tenant_id).await?))
}
