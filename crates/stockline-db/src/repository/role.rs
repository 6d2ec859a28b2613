//! # Role Repository
//!
//! Roles are fixed rows created by the initial migration.

use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use stockline_core::{Role, RoleName};

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RoleRepository { pool }
    }

    /// Looks up a role by name.
    pub async fn get_by_name(&self, name: RoleName) -> DbResult<Role> {
        sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Role", name.as_str()))
    }

    pub async fn list(&self) -> DbResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }
}
