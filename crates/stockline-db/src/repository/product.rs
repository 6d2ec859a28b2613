//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Stock Levels
//! `current_stock` is never written directly by the product CRUD endpoints
//! after creation. It moves through:
//! - [`InventoryRepository::record`](super::inventory::InventoryRepository::record)
//! - [`OrderRepository::change_status`](super::order::OrderRepository::change_status)
//!
//! both of which also leave an audit trail.
//!
//! ## Listing Filters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  search        "coke"      → name LIKE %coke% OR sku LIKE %coke%        │
//! │  stock_status  low_stock   → 0 < current_stock < min_stock              │
//! │                out_of_stock→ current_stock = 0                          │
//! │                in_stock    → current_stock ≥ min_stock, > 0             │
//! │  page/limit                → LIMIT/OFFSET, plus a COUNT(*) for meta     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::{like_pattern, new_id, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::{Product, StockStatus};

pub(crate) const PRODUCT_COLUMNS: &str = "id, tenant_id, supplier_id, sku, name, description, \
     price_cost_cents, price_sale_cents, min_stock, current_stock, created_at, updated_at";

/// A product to insert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub tenant_id: String,
    pub supplier_id: Option<String>,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cost_cents: i64,
    pub price_sale_cents: i64,
    pub min_stock: i64,
    pub current_stock: i64,
}

/// Partial update of a product. `None` leaves the column unchanged;
/// `supplier_id: Some(None)` detaches the supplier.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub supplier_id: Option<Option<String>>,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cost_cents: Option<i64>,
    pub price_sale_cents: Option<i64>,
    pub min_stock: Option<i64>,
    pub current_stock: Option<i64>,
}

impl ProductUpdate {
    fn is_empty(&self) -> bool {
        self.supplier_id.is_none()
            && self.sku.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price_cost_cents.is_none()
            && self.price_sale_cents.is_none()
            && self.min_stock.is_none()
            && self.current_stock.is_none()
    }
}

/// Filter for [`ProductRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub stock_status: StockStatus,
    pub page: PageRequest,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_sku(&tenant_id, "COKE-330").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    ///
    /// ## Returns
    /// * `Err(UniqueViolation)` - SKU already used in this tenant
    pub async fn create(&self, product: NewProduct) -> DbResult<Product> {
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO products (id, tenant_id, supplier_id, sku, name, description,
                 price_cost_cents, price_sale_cents, min_stock, current_stock, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        )
        .bind(&id)
        .bind(&product.tenant_id)
        .bind(&product.supplier_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cost_cents)
        .bind(product.price_sale_cents)
        .bind(product.min_stock)
        .bind(product.current_stock)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
            other => other,
        })?;

        info!(product_id = %id, sku = %product.sku, "Product created");
        self.get(&product.tenant_id, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Gets a product of a tenant by id.
    ///
    /// ## Returns
    /// * `Ok(None)` - no such product, or it belongs to another tenant
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, tenant_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1 AND tenant_id = ?2"
        ))
        .bind(sku)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Whether another product of the tenant already uses `sku`.
    pub async fn sku_taken(&self, tenant_id: &str, sku: &str, exclude_id: Option<&str>) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products
             WHERE tenant_id = ?1 AND sku = ?2 AND (?3 IS NULL OR id <> ?3)",
        )
        .bind(tenant_id)
        .bind(sku)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Lists products with search, stock filter and pagination.
    ///
    /// ## Returns
    /// `(page_of_products, total_matching)`
    pub async fn list(&self, tenant_id: &str, query: &ProductQuery) -> DbResult<(Vec<Product>, i64)> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = "
        ));
        qb.push_bind(tenant_id);
        push_filters(&mut qb, query);
        qb.push(" ORDER BY created_at ASC, rowid ASC LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset);

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE tenant_id = ");
        count.push_bind(tenant_id);
        push_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        debug!(count = products.len(), total, "Listed products");
        Ok((products, total))
    }

    /// Products strictly below their reorder threshold, emptiest first.
    pub async fn low_stock(&self, tenant_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE tenant_id = ?1 AND current_stock < min_stock
             ORDER BY current_stock ASC, name ASC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// All products of a tenant, by name.
    pub async fn list_all(&self, tenant_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = ?1 ORDER BY name ASC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Applies a partial update.
    pub async fn update(&self, tenant_id: &str, id: &str, update: ProductUpdate) -> DbResult<Product> {
        if update.is_empty() {
            return self
                .get(tenant_id, id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", id));
        }

        let sku = update.sku.clone();
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        let mut set = qb.separated(", ");
        if let Some(supplier_id) = update.supplier_id {
            set.push("supplier_id = ").push_bind_unseparated(supplier_id);
        }
        if let Some(sku) = update.sku {
            set.push("sku = ").push_bind_unseparated(sku);
        }
        if let Some(name) = update.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(description) = update.description {
            set.push("description = ").push_bind_unseparated(description);
        }
        if let Some(cost) = update.price_cost_cents {
            set.push("price_cost_cents = ").push_bind_unseparated(cost);
        }
        if let Some(sale) = update.price_sale_cents {
            set.push("price_sale_cents = ").push_bind_unseparated(sale);
        }
        if let Some(min) = update.min_stock {
            set.push("min_stock = ").push_bind_unseparated(min);
        }
        if let Some(stock) = update.current_stock {
            set.push("current_stock = ").push_bind_unseparated(stock);
        }
        set.push("updated_at = ").push_bind_unseparated(Utc::now());

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND tenant_id = ")
            .push_bind(tenant_id);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => {
                    DbError::duplicate("sku", sku.unwrap_or_default())
                }
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(product_id = %id, "Product updated");
        self.get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product.
    ///
    /// ## Returns
    /// * `Err(InUse)` - the product has order lines or stock movements
    pub async fn delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).in_use_on_delete("Product", id))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ProductQuery) {
    if let Some(term) = query.search.as_deref() {
        let pattern = like_pattern(term);
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR sku LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(predicate) = query.stock_status.sql_predicate() {
        qb.push(" AND (").push(predicate).push(")");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
