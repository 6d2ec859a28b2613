//! # Order Repository
//!
//! Orders, their lines, and stock reconciliation on status changes.
//!
//! ## Status Change
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  change_status(order, Completed)                                       │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    SELECT order (tenant-scoped)                                         │
//! │    effect = StockEffect::for_transition(old, new)                       │
//! │    Deduct:  SELECT lines + current stock                                │
//! │             ensure_sufficient(lines)      → InsufficientStock? abort    │
//! │             UPDATE products SET current_stock = current_stock - q       │
//! │              WHERE current_stock >= q     (per line, guarded)           │
//! │    Restore: UPDATE products SET current_stock = current_stock + q       │
//! │    UPDATE orders SET status, notes                                      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Any failure rolls the whole change back: no line is deducted unless all
//! of them are.

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::product::PRODUCT_COLUMNS;
use super::{like_pattern, new_id, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::stock::{ensure_sufficient, order_number, StockRequirement};
use stockline_core::{
    CoreError, Money, Order, OrderItem, OrderStatus, Product, StockEffect, ValidationError,
};

/// Attempts at taking a fresh order number before giving up.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// 1-based position of the sequence in `ORD-YYYYMMDD-NNNN`.
const ORDER_SEQUENCE_OFFSET: i64 = 14;

const ORDER_COLUMNS: &str = "o.id, o.tenant_id, o.user_id, o.order_number, o.status, \
     o.total_cents, o.notes, o.created_at, o.updated_at";

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: String,
    pub quantity: i64,
}

/// An order to create.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tenant_id: String,
    pub user_id: String,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// An order line joined with its product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: OrderItem,
    pub product_sku: String,
    pub product_name: String,
}

/// An order joined with its author and line count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub user_full_name: Option<String>,
    pub user_email: Option<String>,
    pub items_count: i64,
}

/// An order with every line.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemDetail>,
}

/// Ordering of [`OrderRepository::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderSort {
    #[default]
    Newest,
    Oldest,
    HighestTotal,
    LowestTotal,
}

impl OrderSort {
    fn clause(&self) -> &'static str {
        match self {
            OrderSort::Newest => "o.created_at DESC, o.rowid DESC",
            OrderSort::Oldest => "o.created_at ASC, o.rowid ASC",
            OrderSort::HighestTotal => "o.total_cents DESC, o.created_at DESC",
            OrderSort::LowestTotal => "o.total_cents ASC, o.created_at DESC",
        }
    }
}

/// Filter for [`OrderRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    /// Matches the order number or the author's full name.
    pub search: Option<String>,
    pub sort: OrderSort,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates a pending order.
    ///
    /// Prices are snapshotted from each product's current sale price. Stock
    /// is checked but not reserved; it is only deducted on completion.
    ///
    /// The order number continues from the highest number issued today, so
    /// deleting a pending order never makes a number reusable. A concurrent
    /// writer taking the same number is retried with a fresh transaction.
    ///
    /// ## Returns
    /// * `Err(NotFound)` - a product is missing or belongs to another tenant
    /// * `Err(Domain(InsufficientStock))` - a line exceeds current stock
    /// * `Err(Domain(Validation))` - the total does not fit in a price
    pub async fn create(&self, order: NewOrder) -> DbResult<OrderWithItems> {
        if order.lines.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        let mut attempt = 1;
        loop {
            match self.insert_order(&order).await {
                Err(DbError::UniqueViolation { ref field, .. })
                    if field == "order_number" && attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    warn!(attempt, "Order number taken concurrently, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn insert_order(&self, order: &NewOrder) -> DbResult<OrderWithItems> {
        let mut tx = self.pool.begin().await?;

        let mut products = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let product = sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2"
            ))
            .bind(&line.product_id)
            .bind(&order.tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;
            products.push(product);
        }

        ensure_sufficient(order.lines.iter().zip(&products).map(|(line, product)| {
            StockRequirement {
                sku: &product.sku,
                available: product.current_stock,
                requested: line.quantity,
            }
        }))?;

        let mut subtotals = Vec::with_capacity(products.len());
        let mut total = Money::zero();
        for (line, product) in order.lines.iter().zip(&products) {
            let subtotal = product
                .price_sale()
                .checked_mul_quantity(line.quantity)
                .ok_or_else(total_out_of_range)?;
            total = total.checked_add(subtotal).ok_or_else(total_out_of_range)?;
            subtotals.push(subtotal);
        }
        let total_cents = total.cents();

        let now = Utc::now();
        let last: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(CAST(substr(order_number, ?2) AS INTEGER)), 0)
             FROM orders WHERE order_number LIKE ?1",
        )
        .bind(format!("ORD-{}-%", now.format("%Y%m%d")))
        .bind(ORDER_SEQUENCE_OFFSET)
        .fetch_one(&mut *tx)
        .await?;
        let sequence = u32::try_from(last + 1)
            .map_err(|_| DbError::Internal(format!("order sequence exhausted at {last}")))?;
        let number = order_number(now.date_naive(), sequence);
        let order_id = new_id();

        sqlx::query(
            "INSERT INTO orders (id, tenant_id, user_id, order_number, status, total_cents, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        )
        .bind(&order_id)
        .bind(&order.tenant_id)
        .bind(&order.user_id)
        .bind(&number)
        .bind(OrderStatus::Pending)
        .bind(total_cents)
        .bind(&order.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for ((line, product), subtotal) in order.lines.iter().zip(&products).zip(&subtotals) {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price_cents, subtotal_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(new_id())
            .bind(&order_id)
            .bind(&product.id)
            .bind(line.quantity)
            .bind(product.price_sale_cents)
            .bind(subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        let created = fetch_with_items(&mut tx, &order.tenant_id, &order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, order_number = %number, total_cents, "Order created");
        Ok(created)
    }

    /// Gets the order header only.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ?1 AND o.tenant_id = ?2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    /// Gets an order with its author and lines.
    pub async fn get_with_items(&self, tenant_id: &str, id: &str) -> DbResult<OrderWithItems> {
        let mut conn = self.pool.acquire().await?;
        fetch_with_items(&mut conn, tenant_id, id).await
    }

    /// Lists orders with filters and sorting.
    pub async fn list(&self, tenant_id: &str, query: &OrderQuery) -> DbResult<(Vec<OrderRow>, i64)> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ORDER_COLUMNS}, u.full_name AS user_full_name, u.email AS user_email,
                    (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS items_count
             FROM orders o LEFT JOIN users u ON u.id = o.user_id
             WHERE o.tenant_id = "
        ));
        qb.push_bind(tenant_id);
        push_filters(&mut qb, query);
        qb.push(" ORDER BY ")
            .push(query.sort.clause())
            .push(" LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset);

        let rows = qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM orders o LEFT JOIN users u ON u.id = o.user_id WHERE o.tenant_id = ",
        );
        count.push_bind(tenant_id);
        push_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn pending_count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE tenant_id = ?1 AND status = ?2",
        )
        .bind(tenant_id)
        .bind(OrderStatus::Pending)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Updates status and/or notes, reconciling stock for the transition.
    ///
    /// ## Returns
    /// * `Err(NotFound)` - order missing or in another tenant
    /// * `Err(Domain(InsufficientStock))` - completing needs more stock than
    ///   is on hand; nothing is changed
    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        status: Option<OrderStatus>,
        notes: Option<String>,
    ) -> DbResult<OrderWithItems> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ?1 AND o.tenant_id = ?2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))?;

        let new_status = status.unwrap_or(order.status);
        let effect = StockEffect::for_transition(order.status, new_status);

        if effect != StockEffect::None {
            let lines = sqlx::query_as::<_, (String, String, i64, i64)>(
                "SELECT p.id, p.sku, p.current_stock, i.quantity
                 FROM order_items i JOIN products p ON p.id = i.product_id
                 WHERE i.order_id = ?1",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

            if effect == StockEffect::Deduct {
                ensure_sufficient(lines.iter().map(|(_, sku, stock, qty)| StockRequirement {
                    sku: sku.as_str(),
                    available: *stock,
                    requested: *qty,
                }))?;
            }

            for (product_id, sku, stock, qty) in &lines {
                let delta = effect.sign() * qty;
                let result = sqlx::query(
                    "UPDATE products SET current_stock = current_stock + ?2, updated_at = ?3
                     WHERE id = ?1 AND current_stock + ?2 >= 0",
                )
                .bind(product_id)
                .bind(delta)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(CoreError::InsufficientStock {
                        sku: sku.clone(),
                        available: *stock,
                        requested: *qty,
                    }
                    .into());
                }
            }

            debug!(order_id = %id, ?effect, lines = lines.len(), "Stock reconciled");
        }

        sqlx::query(
            "UPDATE orders SET status = ?2, notes = COALESCE(?3, notes), updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(new_status)
        .bind(notes)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let updated = fetch_with_items(&mut tx, tenant_id, id).await?;
        tx.commit().await?;

        if new_status != order.status {
            info!(
                order_id = %id,
                from = %order.status,
                to = %new_status,
                "Order status changed"
            );
        }
        Ok(updated)
    }

    /// Deletes a pending order.
    ///
    /// ## Returns
    /// * `Err(Domain(InvalidOrderStatus))` - order is completed or cancelled
    pub async fn delete_pending(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ?1 AND o.tenant_id = ?2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))?;

        if order.status != OrderStatus::Pending {
            return Err(CoreError::InvalidOrderStatus {
                order_number: order.order_number,
                status: order.status,
                reason: "only pending orders can be deleted".to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(order_id = %id, "Order deleted");
        Ok(())
    }
}

fn total_out_of_range() -> DbError {
    CoreError::from(ValidationError::OutOfRange {
        field: "total_cents".to_string(),
        min: 0,
        max: i64::MAX,
    })
    .into()
}

async fn fetch_with_items(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<OrderWithItems> {
    let order = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS}, u.full_name AS user_full_name, u.email AS user_email,
                (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS items_count
         FROM orders o LEFT JOIN users u ON u.id = o.user_id
         WHERE o.id = ?1 AND o.tenant_id = ?2"
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Order", id))?;

    let items = sqlx::query_as::<_, OrderItemDetail>(
        "SELECT i.id, i.order_id, i.product_id, i.quantity, i.unit_price_cents, i.subtotal_cents,
                p.sku AS product_sku, p.name AS product_name
         FROM order_items i JOIN products p ON p.id = i.product_id
         WHERE i.order_id = ?1
         ORDER BY i.rowid ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(OrderWithItems { order, items })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &OrderQuery) {
    if let Some(status) = query.status {
        qb.push(" AND o.status = ").push_bind(status);
    }
    if let Some(term) = query.search.as_deref() {
        let pattern = like_pattern(term);
        qb.push(" AND (o.order_number LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR u.full_name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
