//! # Seed Data Generator
//!
//! Populates the database with demo tenants, products and users.
//!
//! ## Usage
//! ```bash
//! cargo run -p stockline-db --bin seed
//!
//! # Specify database path and the password given to every user
//! cargo run -p stockline-db --bin seed -- --db ./stockline.db --password secret123
//! ```
//!
//! ## Generated Data
//! - 3 tenants: `Tenant 1` (free), `Tenant 2` (basic), `Tenant 3` (premium)
//! - 2 products per tenant, created only when the tenant has none
//! - 20 users spread round-robin over the tenants, roles cycling
//!   ADMIN, MANAGER, EMPLOYEE: `user{i}@tenant{n}.com`
//!
//! Running it twice changes nothing.

use std::env;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use stockline_core::{PlanType, RoleName, Tenant};
use stockline_db::repository::product::{NewProduct, ProductQuery};
use stockline_db::repository::user::NewUser;
use stockline_db::{Database, DbConfig, DbError};
use tracing::{info, warn};

const TENANTS: &[(&str, PlanType)] = &[
    ("Tenant 1", PlanType::Free),
    ("Tenant 2", PlanType::Basic),
    ("Tenant 3", PlanType::Premium),
];

/// (sku suffix, name, cost cents, sale cents, min stock)
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("01", "Product A", 1000, 1500, 5),
    ("02", "Product B", 2000, 3000, 3),
];

const USER_COUNT: usize = 20;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./stockline.db");
    let mut password = String::from("password123");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./stockline.db)");
                println!("  -p, --password <PASS>    Password for every seeded user (default: password123)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(database = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let mut tenants = Vec::with_capacity(TENANTS.len());
    for (name, plan) in TENANTS {
        let tenant = match db.tenants().get_by_name(name).await? {
            Some(existing) => existing,
            None => db.tenants().create(name, *plan).await?,
        };
        seed_products(&db, &tenant, tenants.len() + 1).await?;
        tenants.push(tenant);
    }

    let hash = hash_password(&password)?;
    let mut created = 0;
    for i in 1..=USER_COUNT {
        let tenant_number = (i - 1) % tenants.len() + 1;
        let tenant = &tenants[tenant_number - 1];
        let role = match i % 3 {
            2 => RoleName::Manager,
            0 => RoleName::Employee,
            _ => RoleName::Admin,
        };
        let email = format!("user{i}@tenant{tenant_number}.com");

        match db
            .users()
            .create(NewUser {
                tenant_id: tenant.id.clone(),
                role,
                email: email.clone(),
                password_hash: hash.clone(),
                full_name: format!("User {i} Tenant {tenant_number}"),
            })
            .await
        {
            Ok(_) => created += 1,
            Err(DbError::UniqueViolation { .. }) => {}
            Err(e) => warn!(email = %email, error = %e, "Failed to create user"),
        }
    }

    info!(tenants = tenants.len(), users_created = created, "Seed complete");
    db.close().await;
    Ok(())
}

async fn seed_products(db: &Database, tenant: &Tenant, number: usize) -> Result<(), DbError> {
    let (_, existing) = db.products().list(&tenant.id, &ProductQuery::default()).await?;
    if existing > 0 {
        return Ok(());
    }

    for (suffix, name, cost, sale, min) in PRODUCTS {
        db.products()
            .create(NewProduct {
                tenant_id: tenant.id.clone(),
                supplier_id: None,
                sku: format!("SKU{number}{suffix}"),
                name: format!("{name} T{number}"),
                description: None,
                price_cost_cents: *cost,
                price_sale_cents: *sale,
                min_stock: *min,
                current_stock: 0,
            })
            .await?;
    }

    info!(tenant = %tenant.name, count = PRODUCTS.len(), "Seeded products");
    Ok(())
}

fn hash_password(password: &str) -> Result<String, Box<dyn std::error::Error>> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| format!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}
