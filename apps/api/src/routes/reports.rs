//! Report routes: sales analytics and downloadable PDF reports.
//!
//! Every endpoint takes an optional `start_date` / `end_date`. The range
//! filters only when both are given.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::extractors::{AuthUser, QueryParams};
use crate::routes::DateQuery;
use crate::services::report_service::{
    movements_report, publish, range_label, sales_report, top_products_report,
};
use crate::AppState;
use stockline_core::{Money, Report, ReportType, LOW_STOCK_REPORT_LIMIT};
use stockline_db::repository::inventory::{TransactionDetail, TransactionFilter};
use stockline_db::repository::report::{DailySales, LowStockLine, TopSeller};
use stockline_db::DateRange;

const DEFAULT_TOP_PRODUCTS: u32 = 10;
const MAX_TOP_PRODUCTS: u32 = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/kpis", get(kpis))
        .route("/sales", get(sales))
        .route("/top-products", get(top_products))
        .route("/low-stock", get(low_stock))
        .route("/generate/{kind}", get(generate))
        .route("/history", get(history))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
    pub limit: Option<u32>,
}

impl ReportQuery {
    fn range(&self) -> Result<DateRange, ApiError> {
        DateQuery {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
        }
        .closed_range()
    }

    fn limit(&self) -> Result<i64, ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_TOP_PRODUCTS);
        if limit < 1 || limit > MAX_TOP_PRODUCTS {
            return Err(ApiError::Validation(format!(
                "limit must be between 1 and {MAX_TOP_PRODUCTS}"
            )));
        }
        Ok(i64::from(limit))
    }
}

#[derive(Debug, Serialize)]
pub struct KpiResponse {
    pub total_sales_cents: i64,
    pub total_orders: i64,
    pub average_order_value_cents: i64,
    pub low_stock_count: i64,
    pub total_customers: i64,
}

/// GET /reports/kpis
async fn kpis(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<KpiResponse>, ApiError> {
    let k = state.db.reports().kpis(&user.tenant_id, query.range()?).await?;

    Ok(Json(KpiResponse {
        total_sales_cents: k.total_sales_cents,
        total_orders: k.total_orders,
        average_order_value_cents: Money::from_cents(k.total_sales_cents)
            .average(k.total_orders)
            .cents(),
        low_stock_count: k.low_stock_count,
        total_customers: k.total_customers,
    }))
}

/// GET /reports/sales
async fn sales(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<Vec<DailySales>>, ApiError> {
    let days = state
        .db
        .reports()
        .sales_by_day(&user.tenant_id, query.range()?)
        .await?;
    Ok(Json(days))
}

/// GET /reports/top-products
async fn top_products(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<Vec<TopSeller>>, ApiError> {
    let rows = state
        .db
        .reports()
        .top_sellers(&user.tenant_id, query.range()?, query.limit()?)
        .await?;
    Ok(Json(rows))
}

/// GET /reports/low-stock
async fn low_stock(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<LowStockLine>>, ApiError> {
    let rows = state
        .db
        .reports()
        .low_stock(&user.tenant_id, i64::from(LOW_STOCK_REPORT_LIMIT))
        .await?;
    Ok(Json(rows))
}

/// GET /reports/generate/{sales|top-products|movements}
async fn generate(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(kind): Path<String>,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = query.range()?;
    let label = range_label(&range);

    let (report_type, document) = match kind.as_str() {
        "sales" => {
            let days = state.db.reports().sales_by_day(&user.tenant_id, range).await?;
            let moves = movements(&state, &user, range).await?;
            (ReportType::Sales, sales_report(&days, &moves, &label))
        }
        "top-products" => {
            let rows = state
                .db
                .reports()
                .top_sellers(&user.tenant_id, range, query.limit()?)
                .await?;
            (ReportType::Inventory, top_products_report(&rows, &label))
        }
        "movements" => {
            let moves = movements(&state, &user, range).await?;
            (ReportType::Movements, movements_report(&moves, &label))
        }
        other => {
            return Err(ApiError::NotFound(format!("Unknown report '{other}'")));
        }
    };

    let report = publish(&state, &user.tenant_id, &user.id, report_type, &document).await?;
    Ok(Json(json!({ "url": report.url })))
}

async fn movements(
    state: &AppState,
    user: &AuthUser,
    range: DateRange,
) -> Result<Vec<TransactionDetail>, ApiError> {
    let filter = TransactionFilter {
        range,
        ..TransactionFilter::default()
    };
    Ok(state.db.inventory().list_all(&user.tenant_id, &filter).await?)
}

/// GET /reports/history
async fn history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Report>>, ApiError> {
    Ok(Json(state.db.reports().history(&user.tenant_id).await?))
}
