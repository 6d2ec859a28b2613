//! # Supplier Repository

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::product::PRODUCT_COLUMNS;
use super::{like_pattern, new_id, PageRequest};
use crate::error::{DbError, DbResult};
use stockline_core::{Product, Supplier};

const SUPPLIER_COLUMNS: &str = "s.id, s.tenant_id, s.name, s.contact_person, s.email, s.phone, \
     s.address, s.website, s.notes, s.created_at, s.updated_at";

/// Editable supplier fields. Used for both insert and full update.
#[derive(Debug, Clone, Default)]
pub struct SupplierFields {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// Column a supplier list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupplierSort {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
    Email,
}

impl SupplierSort {
    fn column(&self) -> &'static str {
        match self {
            SupplierSort::Name => "s.name",
            SupplierSort::CreatedAt => "s.created_at",
            SupplierSort::UpdatedAt => "s.updated_at",
            SupplierSort::Email => "s.email",
        }
    }
}

/// Filter and ordering for [`SupplierRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct SupplierQuery {
    pub search: Option<String>,
    pub sort: SupplierSort,
    pub ascending: bool,
    pub page: PageRequest,
}

/// A supplier with the number of products linked to it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupplierWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub supplier: Supplier,
    pub products_count: i64,
}

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn create(&self, tenant_id: &str, fields: SupplierFields) -> DbResult<Supplier> {
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO suppliers (id, tenant_id, name, contact_person, email, phone, address, website, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(&fields.name)
        .bind(&fields.contact_person)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.address)
        .bind(&fields.website)
        .bind(&fields.notes)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(supplier_id = %id, tenant_id = %tenant_id, "Supplier created");
        self.get(&id).await?.ok_or_else(|| DbError::not_found("Supplier", &id))
    }

    /// Gets a supplier by id in any tenant. Callers check ownership so they
    /// can tell "missing" from "not yours".
    pub async fn get(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers s WHERE s.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    /// Gets a supplier with its product count.
    pub async fn get_with_count(&self, id: &str) -> DbResult<Option<SupplierWithCount>> {
        let supplier = sqlx::query_as::<_, SupplierWithCount>(&format!(
            "SELECT {SUPPLIER_COLUMNS},
                    (SELECT COUNT(*) FROM products p WHERE p.supplier_id = s.id) AS products_count
             FROM suppliers s WHERE s.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    /// Lists a tenant's suppliers.
    ///
    /// `search` matches name, email or contact person, case-insensitively.
    pub async fn list(&self, tenant_id: &str, query: &SupplierQuery) -> DbResult<(Vec<SupplierWithCount>, i64)> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SUPPLIER_COLUMNS},
                    (SELECT COUNT(*) FROM products p WHERE p.supplier_id = s.id) AS products_count
             FROM suppliers s WHERE s.tenant_id = "
        ));
        qb.push_bind(tenant_id);
        push_search(&mut qb, query.search.as_deref());
        qb.push(format!(
            " ORDER BY {} {}, s.rowid {}",
            query.sort.column(),
            if query.ascending { "ASC" } else { "DESC" },
            if query.ascending { "ASC" } else { "DESC" },
        ));
        qb.push(" LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset);

        let suppliers = qb
            .build_query_as::<SupplierWithCount>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM suppliers s WHERE s.tenant_id = ");
        count.push_bind(tenant_id);
        push_search(&mut count, query.search.as_deref());
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        debug!(count = suppliers.len(), total, "Listed suppliers");
        Ok((suppliers, total))
    }

    /// Replaces the editable fields. Unset optional fields are kept.
    pub async fn update(&self, id: &str, fields: SupplierFields) -> DbResult<Supplier> {
        let result = sqlx::query(
            "UPDATE suppliers SET
                name = ?2,
                contact_person = COALESCE(?3, contact_person),
                email = COALESCE(?4, email),
                phone = COALESCE(?5, phone),
                address = COALESCE(?6, address),
                website = COALESCE(?7, website),
                notes = COALESCE(?8, notes),
                updated_at = ?9
             WHERE id = ?1",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.contact_person)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.address)
        .bind(&fields.website)
        .bind(&fields.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }

        self.get(id).await?.ok_or_else(|| DbError::not_found("Supplier", id))
    }

    /// Deletes a supplier. Linked products keep existing with no supplier.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }

        info!(supplier_id = %id, "Supplier deleted");
        Ok(())
    }

    /// Products supplied by `supplier_id`, by name.
    pub async fn products(&self, supplier_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE supplier_id = ?1 ORDER BY name ASC"
        ))
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }
}

fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>) {
    if let Some(term) = search {
        let pattern = like_pattern(term);
        qb.push(" AND (s.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR s.email LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR s.contact_person LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
