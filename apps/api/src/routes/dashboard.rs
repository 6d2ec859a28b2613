//! Dashboard routes: inventory overview widgets.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extractors::{AuthUser, Paginated, Pagination, QueryParams};
use crate::routes::DateQuery;
use crate::AppState;
use stockline_core::{Money, Product, TransactionType};
use stockline_db::repository::inventory::{ProductActivity, TransactionDetail, TransactionFilter, TypeTotals};
use stockline_db::repository::report::StockDeficit;
use stockline_db::PageRequest;

const RECENT_TRANSACTIONS: i64 = 5;
const MAX_TOP_PRODUCTS: u32 = 50;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/summary", get(summary))
        .route("/low-stock", get(low_stock))
        .route("/inventory-value", get(inventory_value))
        .route("/transactions-report", get(transactions_report))
        .route("/top-products", get(top_products))
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductCounts {
    pub total: i64,
    pub low_stock: i64,
}

#[derive(Debug, Serialize)]
pub struct TransactionCounts {
    pub total: i64,
}

/// Stock valued at cost and at sale price.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct InventoryTotals {
    pub total_units: i64,
    pub value_cost_cents: i64,
    pub value_sale_cents: i64,
    pub potential_profit_cents: i64,
}

impl InventoryTotals {
    fn from_products(products: &[Product]) -> Self {
        let cost: Money = products.iter().map(Product::value_at_cost).sum();
        let sale: Money = products.iter().map(Product::value_at_sale).sum();

        InventoryTotals {
            total_units: products.iter().map(|p| p.current_stock).sum(),
            value_cost_cents: cost.cents(),
            value_sale_cents: sale.cents(),
            potential_profit_cents: (sale - cost).cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub products: ProductCounts,
    pub transactions: TransactionCounts,
    pub inventory: InventoryTotals,
    pub recent_transactions: Vec<TransactionDetail>,
}

#[derive(Debug, Serialize)]
pub struct LowStockPage {
    #[serde(flatten)]
    pub page: Paginated<StockDeficit>,
    pub alert: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductValue {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub price_cost_cents: i64,
    pub price_sale_cents: i64,
    pub value_cost_cents: i64,
    pub value_sale_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct InventoryValue {
    pub breakdown: Vec<ProductValue>,
    pub totals: InventoryTotals,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct TypeSummary {
    pub count: i64,
    pub total_quantity: i64,
}

/// Movements per type, keyed by wire name.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct TransactionSummary {
    #[serde(rename = "in")]
    pub stock_in: TypeSummary,
    #[serde(rename = "out")]
    pub stock_out: TypeSummary,
    pub adjustment: TypeSummary,
}

impl From<Vec<TypeTotals>> for TransactionSummary {
    fn from(totals: Vec<TypeTotals>) -> Self {
        let mut summary = TransactionSummary::default();
        for row in totals {
            let slot = match row.transaction_type {
                TransactionType::In => &mut summary.stock_in,
                TransactionType::Out => &mut summary.stock_out,
                TransactionType::Adjustment => &mut summary.adjustment,
            };
            *slot = TypeSummary {
                count: row.count,
                total_quantity: row.total_quantity,
            };
        }
        summary
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionsReport {
    pub total_transactions: usize,
    pub summary: TransactionSummary,
    pub transactions: Vec<TransactionDetail>,
}

// =============================================================================
// Queries
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsReportQuery {
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(default, rename = "type")]
    pub transaction_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<u32>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /dashboard/summary
async fn summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<DashboardSummary>, ApiError> {
    let counts = state.db.inventory().summary(&user.tenant_id).await?;
    let products = state.db.products().list_all(&user.tenant_id).await?;
    let (recent, _) = state
        .db
        .inventory()
        .list(
            &user.tenant_id,
            &TransactionFilter {
                page: PageRequest::new(0, RECENT_TRANSACTIONS),
                ..TransactionFilter::default()
            },
        )
        .await?;

    Ok(Json(DashboardSummary {
        products: ProductCounts {
            total: counts.total_products,
            low_stock: counts.low_stock_count,
        },
        transactions: TransactionCounts {
            total: counts.total_transactions,
        },
        inventory: InventoryTotals::from_products(&products),
        recent_transactions: recent,
    }))
}

/// GET /dashboard/low-stock - Largest deficit first
async fn low_stock(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<LowStockPage>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit)?;
    let (rows, total) = state
        .db
        .reports()
        .stock_deficits(&user.tenant_id, pagination.request())
        .await?;

    let alert = (total > 0).then(|| format!("{total} product(s) below minimum stock"));

    Ok(Json(LowStockPage {
        page: Paginated::new(rows, total, pagination),
        alert,
    }))
}

/// GET /dashboard/inventory-value
async fn inventory_value(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<InventoryValue>, ApiError> {
    let products = state.db.products().list_all(&user.tenant_id).await?;
    let totals = InventoryTotals::from_products(&products);

    let breakdown = products
        .into_iter()
        .map(|p| ProductValue {
            value_cost_cents: p.value_at_cost().cents(),
            value_sale_cents: p.value_at_sale().cents(),
            id: p.id,
            sku: p.sku,
            name: p.name,
            current_stock: p.current_stock,
            price_cost_cents: p.price_cost_cents,
            price_sale_cents: p.price_sale_cents,
        })
        .collect();

    Ok(Json(InventoryValue { breakdown, totals }))
}

/// GET /dashboard/transactions-report - Each date bound applies on its own
async fn transactions_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<TransactionsReportQuery>,
) -> Result<Json<TransactionsReport>, ApiError> {
    let range = DateQuery {
        start_date: query.start_date,
        end_date: query.end_date,
    }
    .range()?;
    let kind = query
        .transaction_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::parse::<TransactionType>)
        .transpose()?;

    let filter = TransactionFilter {
        kind,
        range,
        ..TransactionFilter::default()
    };
    let inventory = state.db.inventory();
    let transactions = inventory.list_all(&user.tenant_id, &filter).await?;
    let totals = inventory.totals_by_type(&user.tenant_id, &filter).await?;

    Ok(Json(TransactionsReport {
        total_transactions: transactions.len(),
        summary: TransactionSummary::from(totals),
        transactions,
    }))
}

/// GET /dashboard/top-products - Most movements first
async fn top_products(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<TopProductsQuery>,
) -> Result<Json<Vec<ProductActivity>>, ApiError> {
    let limit = query.limit.unwrap_or(10);
    if limit < 1 || limit > MAX_TOP_PRODUCTS {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_TOP_PRODUCTS}"
        )));
    }

    let rows = state
        .db
        .inventory()
        .most_active_products(&user.tenant_id, i64::from(limit))
        .await?;
    Ok(Json(rows))
}
