//! # Report Repository
//!
//! Sales analytics and the history of generated report files.
//!
//! Sales figures cover every order in the window regardless of status.
//! Profit is measured against each product's current cost price.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::{new_id, DateRange, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::{Report, ReportType, RoleName};

/// Headline sales figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SalesKpis {
    pub total_sales_cents: i64,
    pub total_orders: i64,
    /// Products at or below `min_stock`.
    pub low_stock_count: i64,
    /// Users with the EMPLOYEE role.
    pub total_customers: i64,
}

/// Orders of one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub order_count: i64,
    pub total_sales_cents: i64,
    pub profit_cents: i64,
}

/// A product ranked by order revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopSeller {
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub quantity_sold: i64,
    pub revenue_cents: i64,
}

/// A product at or below its minimum, as shown in reports.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockLine {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub min_stock: i64,
    pub price_sale_cents: i64,
}

/// A product below its minimum, with how many units it is short.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockDeficit {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub min_stock: i64,
    pub deficit: i64,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    pub async fn kpis(&self, tenant_id: &str, range: DateRange) -> DbResult<SalesKpis> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COALESCE(SUM(o.total_cents), 0), COUNT(*) FROM orders o WHERE o.tenant_id = ",
        );
        qb.push_bind(tenant_id);
        range.push_filter(&mut qb, "o.created_at");
        let (total_sales_cents, total_orders) = qb
            .build_query_as::<(i64, i64)>()
            .fetch_one(&self.pool)
            .await?;

        let low_stock_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND current_stock <= min_stock",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let total_customers: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.id = u.role_id
             WHERE u.tenant_id = ?1 AND r.name = ?2",
        )
        .bind(tenant_id)
        .bind(RoleName::Employee)
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesKpis {
            total_sales_cents,
            total_orders,
            low_stock_count,
            total_customers,
        })
    }

    /// Orders grouped by UTC day, oldest day first.
    pub async fn sales_by_day(&self, tenant_id: &str, range: DateRange) -> DbResult<Vec<DailySales>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT o.created_at, o.total_cents,
                    COALESCE((SELECT SUM(p.price_cost_cents * i.quantity)
                              FROM order_items i JOIN products p ON p.id = i.product_id
                              WHERE i.order_id = o.id), 0) AS cost_cents
             FROM orders o WHERE o.tenant_id = ",
        );
        qb.push_bind(tenant_id);
        range.push_filter(&mut qb, "o.created_at");
        qb.push(" ORDER BY o.created_at ASC");

        let orders = qb
            .build_query_as::<(DateTime<Utc>, i64, i64)>()
            .fetch_all(&self.pool)
            .await?;

        let mut days: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();
        for (created_at, total, cost) in orders {
            let date = created_at.date_naive();
            let day = days.entry(date).or_insert_with(|| DailySales {
                date,
                order_count: 0,
                total_sales_cents: 0,
                profit_cents: 0,
            });
            day.order_count += 1;
            day.total_sales_cents += total;
            day.profit_cents += total - cost;
        }

        debug!(days = days.len(), "Grouped sales by day");
        Ok(days.into_values().collect())
    }

    /// Products by order revenue, highest first.
    pub async fn top_sellers(&self, tenant_id: &str, range: DateRange, limit: i64) -> DbResult<Vec<TopSeller>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT p.id AS product_id, p.name AS product_name, p.sku,
                    SUM(i.quantity) AS quantity_sold, SUM(i.subtotal_cents) AS revenue_cents
             FROM order_items i
             JOIN orders o ON o.id = i.order_id
             JOIN products p ON p.id = i.product_id
             WHERE o.tenant_id = ",
        );
        qb.push_bind(tenant_id);
        range.push_filter(&mut qb, "o.created_at");
        qb.push(" GROUP BY p.id, p.name, p.sku ORDER BY revenue_cents DESC, p.name ASC LIMIT ")
            .push_bind(limit);

        let sellers = qb.build_query_as::<TopSeller>().fetch_all(&self.pool).await?;
        Ok(sellers)
    }

    /// Up to `limit` products at or below their minimum.
    pub async fn low_stock(&self, tenant_id: &str, limit: i64) -> DbResult<Vec<LowStockLine>> {
        let lines = sqlx::query_as::<_, LowStockLine>(
            "SELECT id, sku, name, current_stock, min_stock, price_sale_cents
             FROM products
             WHERE tenant_id = ?1 AND current_stock <= min_stock
             ORDER BY current_stock ASC, name ASC
             LIMIT ?2",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Products strictly below their minimum, largest deficit first.
    pub async fn stock_deficits(&self, tenant_id: &str, page: PageRequest) -> DbResult<(Vec<StockDeficit>, i64)> {
        let rows = sqlx::query_as::<_, StockDeficit>(
            "SELECT id, sku, name, current_stock, min_stock, (min_stock - current_stock) AS deficit
             FROM products
             WHERE tenant_id = ?1 AND current_stock < min_stock
             ORDER BY deficit DESC, name ASC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(tenant_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND current_stock < min_stock",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }

    // =========================================================================
    // Report History
    // =========================================================================

    /// Records a generated report file.
    pub async fn record(&self, tenant_id: &str, user_id: &str, report_type: ReportType, url: &str) -> DbResult<Report> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO reports (id, tenant_id, user_id, report_type, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(user_id)
        .bind(report_type)
        .bind(url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(report_id = %id, report_type = %report_type, url = %url, "Report recorded");

        sqlx::query_as::<_, Report>(
            "SELECT id, tenant_id, user_id, report_type, url, created_at FROM reports WHERE id = ?1",
        )
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Report", &id))
    }

    /// A tenant's reports, newest first.
    pub async fn history(&self, tenant_id: &str) -> DbResult<Vec<Report>> {
        let reports = sqlx::query_as::<_, Report>(
            "SELECT id, tenant_id, user_id, report_type, url, created_at
             FROM reports WHERE tenant_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
