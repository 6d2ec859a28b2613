//! # Inventory Repository
//!
//! Stock movements and their audit trail.
//!
//! ## Recording a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(OUT 3 of COKE-330)                                             │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    SELECT product (tenant-scoped)            → NotFound if missing      │
//! │    apply_transaction(current, OUT, 3)        → InsufficientStock?       │
//! │    UPDATE products                                                      │
//! │       SET current_stock = current_stock - 3                             │
//! │     WHERE id = ? AND current_stock >= 3      ← guard against races      │
//! │     RETURNING current_stock                                             │
//! │    INSERT inventory_transactions                                        │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use super::product::PRODUCT_COLUMNS;
use super::{new_id, DateRange, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::stock::apply_transaction;
use stockline_core::{CoreError, InventoryTransaction, Product, TransactionType};

/// A movement to record.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: String,
    pub product_id: String,
    pub user_id: String,
    pub supplier_id: Option<String>,
    pub kind: TransactionType,
    pub quantity: i64,
    /// Falls back to [`TransactionType::default_reason`] when `None`.
    pub reason: Option<String>,
}

/// Result of [`InventoryRepository::record`].
#[derive(Debug, Clone, Serialize)]
pub struct MovementOutcome {
    pub transaction: InventoryTransaction,
    pub product: Product,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// A movement joined with the names of its product, user and supplier.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TransactionDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub transaction: InventoryTransaction,
    pub product_name: String,
    pub product_sku: String,
    pub user_full_name: Option<String>,
    pub supplier_name: Option<String>,
}

/// Filter for [`InventoryRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionType>,
    pub product_id: Option<String>,
    pub range: DateRange,
    pub page: PageRequest,
}

/// Tenant-wide stock figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct InventorySummary {
    pub total_products: i64,
    pub total_transactions: i64,
    /// Products strictly below `min_stock`.
    pub low_stock_count: i64,
    pub total_units: i64,
}

/// Count and volume of movements of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TypeTotals {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub count: i64,
    pub total_quantity: i64,
}

/// A product ranked by how often it moves.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductActivity {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub transaction_count: i64,
    pub total_quantity: i64,
}

const DETAIL_SELECT: &str = "SELECT t.id, t.tenant_id, t.product_id, t.user_id, t.supplier_id, \
     t.transaction_type, t.quantity, t.reason, t.created_at, \
     p.name AS product_name, p.sku AS product_sku, \
     u.full_name AS user_full_name, s.name AS supplier_name \
     FROM inventory_transactions t \
     JOIN products p ON p.id = t.product_id \
     LEFT JOIN users u ON u.id = t.user_id \
     LEFT JOIN suppliers s ON s.id = t.supplier_id \
     WHERE t.tenant_id = ";

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Applies a movement to a product's stock and records it, atomically.
    ///
    /// ## Returns
    /// * `Err(NotFound)` - product missing or in another tenant
    /// * `Err(Domain(InsufficientStock))` - OUT larger than stock on hand
    /// * `Err(Domain(Validation))` - quantity below the minimum for the type
    pub async fn record(&self, movement: NewMovement) -> DbResult<MovementOutcome> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2"
        ))
        .bind(&movement.product_id)
        .bind(&movement.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Product", &movement.product_id))?;

        let expected = apply_transaction(
            &product.sku,
            product.current_stock,
            movement.kind,
            movement.quantity,
        )?;

        let updated: Option<i64> = match movement.kind {
            TransactionType::In => sqlx::query_scalar::<Sqlite, i64>(
                "UPDATE products SET current_stock = current_stock + ?2, updated_at = ?3
                 WHERE id = ?1 RETURNING current_stock",
            ),
            TransactionType::Out => sqlx::query_scalar::<Sqlite, i64>(
                "UPDATE products SET current_stock = current_stock - ?2, updated_at = ?3
                 WHERE id = ?1 AND current_stock >= ?2 RETURNING current_stock",
            ),
            TransactionType::Adjustment => sqlx::query_scalar::<Sqlite, i64>(
                "UPDATE products SET current_stock = ?2, updated_at = ?3
                 WHERE id = ?1 RETURNING current_stock",
            ),
        }
        .bind(&product.id)
        .bind(movement.quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_stock) = updated else {
            warn!(product_id = %product.id, "Stock changed underneath an OUT movement");
            return Err(CoreError::InsufficientStock {
                sku: product.sku,
                available: product.current_stock,
                requested: movement.quantity,
            }
            .into());
        };

        let previous_stock = match movement.kind {
            TransactionType::In => new_stock - movement.quantity,
            TransactionType::Out => new_stock + movement.quantity,
            TransactionType::Adjustment => product.current_stock,
        };
        if new_stock != expected {
            debug!(expected, new_stock, "Stock level moved concurrently");
        }

        let transaction_id = new_id();
        let reason = movement
            .reason
            .clone()
            .unwrap_or_else(|| movement.kind.default_reason().to_string());

        sqlx::query(
            "INSERT INTO inventory_transactions
                 (id, tenant_id, product_id, user_id, supplier_id, transaction_type, quantity, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&transaction_id)
        .bind(&movement.tenant_id)
        .bind(&product.id)
        .bind(&movement.user_id)
        .bind(&movement.supplier_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(&reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, InventoryTransaction>(
            "SELECT id, tenant_id, product_id, user_id, supplier_id, transaction_type, quantity, reason, created_at
             FROM inventory_transactions WHERE id = ?1",
        )
        .bind(&transaction_id)
        .fetch_one(&mut *tx)
        .await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(&product.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product.id,
            kind = %movement.kind,
            quantity = movement.quantity,
            previous_stock,
            new_stock,
            "Inventory movement recorded"
        );

        Ok(MovementOutcome {
            transaction,
            product,
            previous_stock,
            new_stock,
        })
    }

    /// Lists movements, newest first.
    pub async fn list(&self, tenant_id: &str, filter: &TransactionFilter) -> DbResult<(Vec<TransactionDetail>, i64)> {
        let mut qb = QueryBuilder::<Sqlite>::new(DETAIL_SELECT);
        qb.push_bind(tenant_id);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY t.created_at DESC, t.rowid DESC LIMIT ")
            .push_bind(filter.page.limit)
            .push(" OFFSET ")
            .push_bind(filter.page.offset);

        let rows = qb
            .build_query_as::<TransactionDetail>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM inventory_transactions t WHERE t.tenant_id = ",
        );
        count.push_bind(tenant_id);
        push_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((rows, total))
    }

    /// Every movement matching the filter (no pagination), newest first.
    pub async fn list_all(&self, tenant_id: &str, filter: &TransactionFilter) -> DbResult<Vec<TransactionDetail>> {
        let mut qb = QueryBuilder::<Sqlite>::new(DETAIL_SELECT);
        qb.push_bind(tenant_id);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY t.created_at DESC, t.rowid DESC");

        let rows = qb
            .build_query_as::<TransactionDetail>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn summary(&self, tenant_id: &str) -> DbResult<InventorySummary> {
        let summary = sqlx::query_as::<_, InventorySummary>(
            "SELECT
                (SELECT COUNT(*) FROM products WHERE tenant_id = ?1) AS total_products,
                (SELECT COUNT(*) FROM inventory_transactions WHERE tenant_id = ?1) AS total_transactions,
                (SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND current_stock < min_stock) AS low_stock_count,
                (SELECT COALESCE(SUM(current_stock), 0) FROM products WHERE tenant_id = ?1) AS total_units",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// Count and summed quantity per movement type, over the movements the
    /// filter selects. Pagination is ignored.
    pub async fn totals_by_type(&self, tenant_id: &str, filter: &TransactionFilter) -> DbResult<Vec<TypeTotals>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT t.transaction_type, COUNT(*) AS count, COALESCE(SUM(t.quantity), 0) AS total_quantity
             FROM inventory_transactions t WHERE t.tenant_id = ",
        );
        qb.push_bind(tenant_id);
        push_filters(&mut qb, filter);
        qb.push(" GROUP BY t.transaction_type ORDER BY t.transaction_type");

        let totals = qb.build_query_as::<TypeTotals>().fetch_all(&self.pool).await?;
        Ok(totals)
    }

    /// Products with the most movements.
    pub async fn most_active_products(&self, tenant_id: &str, limit: i64) -> DbResult<Vec<ProductActivity>> {
        let rows = sqlx::query_as::<_, ProductActivity>(
            "SELECT p.id AS product_id, p.sku, p.name, p.current_stock,
                    COUNT(t.id) AS transaction_count,
                    COALESCE(SUM(t.quantity), 0) AS total_quantity
             FROM inventory_transactions t
             JOIN products p ON p.id = t.product_id
             WHERE t.tenant_id = ?1
             GROUP BY p.id, p.sku, p.name, p.current_stock
             ORDER BY transaction_count DESC, p.name ASC
             LIMIT ?2",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TransactionFilter) {
    if let Some(kind) = filter.kind {
        qb.push(" AND t.transaction_type = ").push_bind(kind);
    }
    if let Some(product_id) = filter.product_id.clone() {
        qb.push(" AND t.product_id = ").push_bind(product_id);
    }
    filter.range.push_filter(qb, "t.created_at");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use chrono::NaiveDate;
    use stockline_core::validation::parse_date_bound;
    use stockline_core::{RoleName, Tenant, User};

    async fn setup() -> (crate::Database, Tenant, User, Product) {
        let db = test_support::db().await;
        let tenant = test_support::tenant(&db, "Acme").await;
        let user = test_support::user(&db, &tenant, "bo@acme.test", RoleName::Employee).await;
        let product = test_support::product(&db, &tenant, "COKE-330", 10, 5).await;
        (db, tenant, user, product)
    }

    fn movement(tenant: &Tenant, user: &User, product: &Product, kind: TransactionType, quantity: i64) -> NewMovement {
        NewMovement {
            tenant_id: tenant.id.clone(),
            product_id: product.id.clone(),
            user_id: user.id.clone(),
            supplier_id: None,
            kind,
            quantity,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_in_out_adjustment() {
        let (db, tenant, user, product) = setup().await;
        let repo = db.inventory();

        let outcome = repo
            .record(movement(&tenant, &user, &product, TransactionType::In, 5))
            .await
            .unwrap();
        assert_eq!(outcome.previous_stock, 10);
        assert_eq!(outcome.new_stock, 15);
        assert_eq!(outcome.product.current_stock, 15);
        assert_eq!(outcome.transaction.reason.as_deref(), Some("Stock entry"));

        let outcome = repo
            .record(movement(&tenant, &user, &product, TransactionType::Out, 15))
            .await
            .unwrap();
        assert_eq!(outcome.new_stock, 0);

        let outcome = repo
            .record(movement(&tenant, &user, &product, TransactionType::Adjustment, 7))
            .await
            .unwrap();
        assert_eq!(outcome.previous_stock, 0);
        assert_eq!(outcome.new_stock, 7);
    }

    #[tokio::test]
    async fn test_out_beyond_stock_leaves_no_trace() {
        let (db, tenant, user, product) = setup().await;

        let err = db
            .inventory()
            .record(movement(&tenant, &user, &product, TransactionType::Out, 11))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 10, requested: 11, .. })
        ));

        let product = db.products().get(&tenant.id, &product.id).await.unwrap().unwrap();
        assert_eq!(product.current_stock, 10);
        let (rows, total) = db
            .inventory()
            .list(&tenant.id, &TransactionFilter::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_other_tenant_product_not_found() {
        let (db, _tenant, user, product) = setup().await;
        let other = test_support::tenant(&db, "Other").await;

        let err = db
            .inventory()
            .record(movement(&other, &user, &product, TransactionType::In, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_summary_and_totals() {
        let (db, tenant, user, product) = setup().await;
        let repo = db.inventory();
        repo.record(movement(&tenant, &user, &product, TransactionType::In, 5)).await.unwrap();
        repo.record(movement(&tenant, &user, &product, TransactionType::In, 3)).await.unwrap();
        repo.record(movement(&tenant, &user, &product, TransactionType::Out, 2)).await.unwrap();

        let (rows, total) = repo
            .list(
                &tenant.id,
                &TransactionFilter {
                    kind: Some(TransactionType::In),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].transaction.quantity, 3);
        assert_eq!(rows[0].product_sku, "COKE-330");
        assert_eq!(rows[0].user_full_name.as_deref(), Some("User bo@acme.test"));

        let summary = repo.summary(&tenant.id).await.unwrap();
        assert_eq!(
            summary,
            InventorySummary {
                total_products: 1,
                total_transactions: 3,
                low_stock_count: 0,
                total_units: 16,
            }
        );

        let totals = repo.totals_by_type(&tenant.id, &TransactionFilter::default()).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].transaction_type, TransactionType::In);
        assert_eq!(totals[0].count, 2);
        assert_eq!(totals[0].total_quantity, 8);

        let outs = repo
            .totals_by_type(
                &tenant.id,
                &TransactionFilter {
                    kind: Some(TransactionType::Out),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].total_quantity, 2);

        let active = repo.most_active_products(&tenant.id, 5).await.unwrap();
        assert_eq!(active[0].transaction_count, 3);
    }

    #[tokio::test]
    async fn test_end_date_includes_last_instant_of_day() {
        let (db, tenant, user, product) = setup().await;
        let repo = db.inventory();
        let outcome = repo
            .record(movement(&tenant, &user, &product, TransactionType::In, 1))
            .await
            .unwrap();

        let late = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_nano_opt(23, 59, 59, 999_500_000))
            .unwrap()
            .and_utc();
        sqlx::query("UPDATE inventory_transactions SET created_at = ?1 WHERE id = ?2")
            .bind(late)
            .bind(&outcome.transaction.id)
            .execute(db.pool())
            .await
            .unwrap();

        let filter = TransactionFilter {
            range: DateRange::new(
                Some(parse_date_bound("start_date", "2024-03-01", false).unwrap()),
                Some(parse_date_bound("end_date", "2024-03-01", true).unwrap()),
            ),
            ..Default::default()
        };
        let (rows, total) = repo.list(&tenant.id, &filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].transaction.id, outcome.transaction.id);
    }
}
