//! End-to-end tests against the full router and an in-memory database.

use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use stockline_api::{build_router, ApiConfig, AppState};
use stockline_core::MAX_AVATAR_BYTES;
use stockline_db::{Database, DbConfig};

// =============================================================================
// Helpers
// =============================================================================

async fn app() -> Router {
    app_with(ApiConfig::default()).await
}

async fn app_with(config: ApiConfig) -> Router {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let config = ApiConfig {
        upload_dir: std::env::temp_dir().join(format!("stockline-api-{}", uuid::Uuid::new_v4())),
        ..config
    };
    build_router(Arc::new(AppState::new(db, config)))
}

async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, to_bytes(response.into_body(), usize::MAX).await.unwrap())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let (status, bytes) = send_raw(app, request).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Registers a business and returns its admin access token.
async fn register(app: &Router, business: &str, email: &str) -> String {
    let body = register_account(app, business, email).await;
    body["access_token"].as_str().unwrap().to_string()
}

/// Registers a business and returns the whole response: tokens, user, tenant.
async fn register_account(app: &Router, business: &str, email: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "business_name": business,
            "full_name": "Owner",
            "email": email,
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn login(app: &Router, email: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

/// Creates an EMPLOYEE in the admin's tenant and returns `(user id, access token)`.
async fn create_employee(app: &Router, admin: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users",
        Some(admin),
        Some(json!({
            "email": email,
            "password": "password123",
            "full_name": "Clerk",
            "role": "EMPLOYEE",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = login(app, email).await["access_token"].as_str().unwrap().to_string();
    (body["id"].as_str().unwrap().to_string(), token)
}

async fn create_order(app: &Router, token: &str, product_id: &str, quantity: i64) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/orders",
        Some(token),
        Some(json!({ "items": [{ "product_id": product_id, "quantity": quantity }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

fn avatar_request(token: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "stockline-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"avatar\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/users/profile/avatar")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

async fn create_product(app: &Router, token: &str, sku: &str, stock: i64) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/products",
        Some(token),
        Some(json!({
            "sku": sku,
            "name": format!("Product {sku}"),
            "price_cost_cents": 100,
            "price_sale_cents": 250,
            "min_stock": 2,
            "current_stock": stock,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn stock_of(app: &Router, token: &str, product_id: &str) -> i64 {
    let (status, body) =
        send(app, Method::GET, &format!("/api/products/{product_id}"), Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    body["current_stock"].as_i64().unwrap()
}

// =============================================================================
// Health & auth
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_register_creates_admin_and_rejects_duplicates() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "business_name": "Acme",
            "full_name": "Ada Owner",
            "email": "Ada@Acme.test",
            "password": "password123",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "ADMIN");
    assert_eq!(body["user"]["email"], "ada@acme.test");
    assert_eq!(body["tenant"]["name"], "Acme");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "business_name": "Other",
            "full_name": "Someone",
            "email": "ada@acme.test",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_and_refresh_rotation() {
    let app = app().await;
    register(&app, "Acme", "owner@acme.test").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "owner@acme.test", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "owner@acme.test", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = login["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": first })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = rotated["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    // Replaying a rotated token revokes the whole family
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": first })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": second })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/products", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_admins_create_users() {
    let app = app().await;
    let admin = register(&app, "Acme", "owner@acme.test").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(&admin),
        Some(json!({
            "email": "clerk@acme.test",
            "password": "password123",
            "full_name": "Clerk",
            "role": "EMPLOYEE",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "EMPLOYEE");

    let (_, login) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "clerk@acme.test", "password": "password123" })),
    )
    .await;
    let employee = login["access_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(&employee),
        Some(json!({
            "email": "another@acme.test",
            "password": "password123",
            "full_name": "Another",
            "role": "ADMIN",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, profile) = send(&app, Method::GET, "/api/users/profile", Some(&employee), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["tenant"]["name"], "Acme");
}

#[tokio::test]
async fn test_user_permissions_within_tenant() {
    let app = app().await;
    let owner = register_account(&app, "Acme", "owner@acme.test").await;
    let admin = owner["access_token"].as_str().unwrap();
    let admin_id = owner["user"]["id"].as_str().unwrap();
    let (clerk_id, clerk) = create_employee(&app, admin, "clerk@acme.test").await;

    // Employees may edit themselves but not their role
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/users/{clerk_id}"),
        Some(&clerk),
        Some(json!({ "role": "ADMIN" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/users/{clerk_id}"),
        Some(&clerk),
        Some(json!({ "full_name": "Clerk Kent" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["full_name"], "Clerk Kent");
    assert_eq!(body["role"], "EMPLOYEE");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/users/{admin_id}"),
        Some(&clerk),
        Some(json!({ "full_name": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{admin_id}"), Some(admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_revokes_one_or_all_refresh_tokens() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    let first = login(&app, "owner@acme.test").await["refresh_token"].as_str().unwrap().to_string();
    let second = login(&app, "owner@acme.test").await["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/logout",
        Some(&token),
        Some(json!({ "refresh_token": first })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked_tokens"], 1);

    // The other session keeps working
    let (status, rotated) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": second })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let third = rotated["refresh_token"].as_str().unwrap().to_string();

    // No body: every session ends
    let (status, body) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["revoked_tokens"].as_u64().unwrap() >= 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": third })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_avatar_upload_checks_type_and_size() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;

    let (status, _) = send_raw(&app, avatar_request(&token, "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = vec![0u8; MAX_AVATAR_BYTES + 1];
    let (status, _) = send_raw(&app, avatar_request(&token, "image/png", &oversized)).await;
    assert!(
        status == StatusCode::BAD_REQUEST || status == StatusCode::PAYLOAD_TOO_LARGE,
        "unexpected status {status}"
    );

    let (status, body) = send_raw(&app, avatar_request(&token, "image/png", &[0x89, b'P', b'N', b'G'])).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let url = body["avatar_url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/avatars/") && url.ends_with(".png"), "{url}");

    let (_, profile) = send(&app, Method::GET, "/api/users/profile", Some(&token), None).await;
    assert_eq!(profile["avatar_url"], url);
}

// =============================================================================
// Tenant isolation
// =============================================================================

#[tokio::test]
async fn test_tenant_admins_stay_in_their_tenant() {
    let app = app().await;
    let acme = register_account(&app, "Acme", "owner@acme.test").await;
    let globex = register_account(&app, "Globex", "owner@globex.test").await;
    let token = acme["access_token"].as_str().unwrap();
    let acme_id = acme["tenant"]["id"].as_str().unwrap();
    let globex_uri = format!("/api/tenants/{}", globex["tenant"]["id"].as_str().unwrap());

    let (status, list) = send(&app, Method::GET, "/api/tenants", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["id"], acme_id);

    let (status, _) = send(&app, Method::GET, &globex_uri, Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, &format!("{globex_uri}/stats"), Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        Method::PATCH,
        &globex_uri,
        Some(token),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &globex_uri, Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::POST, "/api/tenants", Some(token), Some(json!({ "name": "Initech" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Own tenant: rename yes, plan change no
    let acme_uri = format!("/api/tenants/{acme_id}");
    let (status, _) = send(
        &app,
        Method::PATCH,
        &acme_uri,
        Some(token),
        Some(json!({ "plan_type": "premium" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, Method::PATCH, &acme_uri, Some(token), Some(json!({ "name": "Acme Ltd" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Acme Ltd");

    // Globex is untouched
    let globex_token = globex["access_token"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, &globex_uri, Some(globex_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn test_platform_admin_manages_every_tenant() {
    let app = app_with(ApiConfig {
        platform_admins: vec!["ops@stockline.test".to_string()],
        ..ApiConfig::default()
    })
    .await;
    let ops = register(&app, "Stockline Ops", "ops@stockline.test").await;
    let acme = register_account(&app, "Acme", "owner@acme.test").await;
    let acme_uri = format!("/api/tenants/{}", acme["tenant"]["id"].as_str().unwrap());

    let (status, list) = send(&app, Method::GET, "/api/tenants", Some(&ops), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 2);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &acme_uri,
        Some(&ops),
        Some(json!({ "plan_type": "premium", "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["plan_type"], "premium");

    let (status, _) = send(&app, Method::POST, "/api/tenants", Some(&ops), Some(json!({ "name": "Initech" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::DELETE, &acme_uri, Some(&ops), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_other_tenants_users_and_suppliers_are_forbidden() {
    let app = app().await;
    let acme = register_account(&app, "Acme", "owner@acme.test").await;
    let acme_token = acme["access_token"].as_str().unwrap();
    let globex = register(&app, "Globex", "owner@globex.test").await;

    let (status, supplier) = send(
        &app,
        Method::POST,
        "/api/suppliers",
        Some(acme_token),
        Some(json!({ "name": "Bottlers Inc" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{supplier}");
    let supplier_uri = format!("/api/suppliers/{}", supplier["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &supplier_uri, Some(&globex), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &supplier_uri, Some(&globex), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user_uri = format!("/api/users/{}", acme["user"]["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::GET, &user_uri, Some(&globex), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &user_uri, Some(&globex), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, &supplier_uri, Some(acme_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Products & inventory
// =============================================================================

#[tokio::test]
async fn test_product_crud_and_sku_conflict() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    let product = create_product(&app, &token, "COKE-330", 10).await;
    let id = product["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&token),
        Some(json!({
            "sku": "COKE-330",
            "name": "Duplicate",
            "price_cost_cents": 1,
            "price_sale_cents": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = send(&app, Method::GET, "/api/products/sku/COKE-330", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/products/{id}"),
        Some(&token),
        Some(json!({ "name": "Coca-Cola 330ml" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Coca-Cola 330ml");
    assert_eq!(body["sku"], "COKE-330");

    let (status, list) = send(&app, Method::GET, "/api/products?search=coca", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/products/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/products/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_products_are_tenant_scoped() {
    let app = app().await;
    let acme = register(&app, "Acme", "owner@acme.test").await;
    let globex = register(&app, "Globex", "owner@globex.test").await;
    let product = create_product(&app, &acme, "SKU-1", 5).await;
    let id = product["id"].as_str().unwrap();

    let (status, _) = send(&app, Method::GET, &format!("/api/products/{id}"), Some(&globex), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/api/products", Some(&globex), None).await;
    assert_eq!(list["meta"]["total"], 0);

    // Same SKU is fine in another tenant
    create_product(&app, &globex, "SKU-1", 0).await;
}

#[tokio::test]
async fn test_stock_movements() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    let product = create_product(&app, &token, "SKU-1", 5).await;
    let id = product["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/inventory/out",
        Some(&token),
        Some(json!({ "product_id": id, "quantity": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(stock_of(&app, &token, id).await, 5);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/inventory/out",
        Some(&token),
        Some(json!({ "product_id": id, "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["previous_stock"], 5);
    assert_eq!(body["new_stock"], 2);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/inventory/adjustment",
        Some(&token),
        Some(json!({ "product_id": id, "quantity": 7, "reason": "Stock count" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["new_stock"], 7);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/inventory/in",
        Some(&token),
        Some(json!({ "product_id": id, "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, history) = send(
        &app,
        Method::GET,
        &format!("/api/inventory/transactions/product/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["meta"]["total"], 2);
    assert_eq!(history["product"]["current_stock"], 7);
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    let product = create_product(&app, &token, "SKU-1", 5).await;
    let id = product["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/inventory/in",
        Some(&token),
        Some(json!({ "product_id": id, "quantity": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // Each movement fits, the resulting level does not
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/inventory/in",
        Some(&token),
        Some(json!({ "product_id": id, "quantity": 1_000_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&app, &token, id).await, 5);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&token),
        Some(json!({
            "sku": "GOLD",
            "name": "Gold bar",
            "price_cost_cents": 1,
            "price_sale_cents": i64::MAX,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/products/{id}"),
        Some(&token),
        Some(json!({ "current_stock": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "product_id": id, "quantity": i64::MAX }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_order_lifecycle_reconciles_stock() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    let product = create_product(&app, &token, "SKU-1", 10).await;
    let id = product["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "product_id": id, "quantity": 50 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "product_id": id, "quantity": 4 }], "notes": "Counter sale" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_cents"], 1000);
    assert_eq!(stock_of(&app, &token, id).await, 10);

    let order_id = order["id"].as_str().unwrap();
    let uri = format!("/api/orders/{order_id}");

    let (_, count) = send(&app, Method::GET, "/api/orders/stats/pending-count", Some(&token), None).await;
    assert_eq!(count["count"], 1);

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock_of(&app, &token, id).await, 6);

    let (status, body) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(stock_of(&app, &token, id).await, 10);

    // Only pending orders can be deleted
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_with_unknown_product_is_rejected() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "product_id": uuid::Uuid::new_v4().to_string(), "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "One or more products not found");
}

#[tokio::test]
async fn test_order_list_reports_last_page() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;

    let (status, empty) = send(&app, Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["meta"]["total"], 0);
    assert_eq!(empty["meta"]["last_page"], 1);

    let product = create_product(&app, &token, "SKU-1", 50).await;
    let id = product["id"].as_str().unwrap();
    let mut numbers = Vec::new();
    for _ in 0..3 {
        let order = create_order(&app, &token, id, 1).await;
        numbers.push(order["order_number"].as_str().unwrap().to_string());
    }
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 3);

    let (status, page) = send(&app, Method::GET, "/api/orders?limit=2&page=2", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["meta"]["total"], 3);
    assert_eq!(page["meta"]["last_page"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_blocks_deleting_users_and_products() {
    let app = app().await;
    let admin = register(&app, "Acme", "owner@acme.test").await;
    let (clerk_id, clerk) = create_employee(&app, &admin, "clerk@acme.test").await;
    let product = create_product(&app, &admin, "SKU-1", 10).await;
    let product_id = product["id"].as_str().unwrap();

    let order = create_order(&app, &clerk, product_id, 2).await;
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/orders/{}", order["id"].as_str().unwrap()),
        Some(&admin),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, before) = send(&app, Method::GET, "/api/reports/kpis", Some(&admin), None).await;
    assert_eq!(before["total_orders"], 1);
    assert_eq!(before["total_sales_cents"], 500);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/users/{clerk_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    let (status, _) = send(&app, Method::DELETE, &format!("/api/products/{product_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, after) = send(&app, Method::GET, "/api/reports/kpis", Some(&admin), None).await;
    assert_eq!(after, before);
    assert_eq!(stock_of(&app, &admin, product_id).await, 8);
}

// =============================================================================
// Dashboard & reports
// =============================================================================

#[tokio::test]
async fn test_dashboard_summary_values_stock() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    create_product(&app, &token, "SKU-1", 10).await;
    create_product(&app, &token, "SKU-2", 1).await;

    let (status, body) = send(&app, Method::GET, "/api/dashboard/summary", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"]["total"], 2);
    assert_eq!(body["products"]["low_stock"], 1);
    assert_eq!(body["inventory"]["total_units"], 11);
    assert_eq!(body["inventory"]["value_cost_cents"], 1100);
    assert_eq!(body["inventory"]["value_sale_cents"], 2750);
    assert_eq!(body["inventory"]["potential_profit_cents"], 1650);

    let (status, low) = send(&app, Method::GET, "/api/dashboard/low-stock", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(low["meta"]["total"], 1);
    assert!(low["alert"].is_string());
}

#[tokio::test]
async fn test_page_size_is_capped() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;

    let (status, _) = send(&app, Method::GET, "/api/products?limit=101", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_report_kind_is_404() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;

    let (status, _) = send(&app, Method::GET, "/api/reports/generate/payroll", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generated_report_is_a_pdf_in_history() {
    let app = app().await;
    let token = register(&app, "Acme", "owner@acme.test").await;
    let product = create_product(&app, &token, "SKU-1", 10).await;
    create_order(&app, &token, product["id"].as_str().unwrap(), 2).await;

    let (status, body) = send(&app, Method::GET, "/api/reports/generate/sales", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/reports/report-SALES-") && url.ends_with(".pdf"), "{url}");

    let (status, bytes) = send_raw(&app, Request::get(url.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(b"%PDF"));

    let (status, history) = send(&app, Method::GET, "/api/reports/history", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["url"], url.as_str());
    assert_eq!(history[0]["type"], "sales");
}
