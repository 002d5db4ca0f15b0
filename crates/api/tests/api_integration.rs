//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

use common::{Money, UserId};
use store::{InMemoryStore, Product, ProductId, ProductStore};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_default_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

fn request(
    method: &str,
    uri: &str,
    identity: Option<(UserId, &str)>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some((user_id, role)) = identity {
        builder = builder
            .header("x-user-id", user_id.to_string())
            .header("x-user-role", role);
    }

    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn seed_product(store: &InMemoryStore, sku: &str, price_cents: i64, stock: u32) {
    store
        .insert_product(Product::new(sku, "Widget", Money::from_cents(price_cents), stock))
        .await
        .unwrap();
}

async fn stock_of(store: &InMemoryStore, sku: &str) -> u32 {
    store
        .get_product(&ProductId::new(sku))
        .await
        .unwrap()
        .unwrap()
        .stock
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(request("GET", "/metrics", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_identity_is_unauthenticated() {
    let (app, _) = setup();

    let response = app
        .clone()
        .oneshot(request("GET", "/cart", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A malformed role is rejected too
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cart")
                .header("x-user-id", UserId::new().to_string())
                .header("x-user-role", "superuser")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_cart_and_duplicate() {
    let (app, _) = setup();
    let user = UserId::new();

    let response = app
        .clone()
        .oneshot(request("POST", "/cart", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["cart"]["total"], 0);

    let response = app
        .oneshot(request("POST", "/cart", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_add_to_cart_resolves_products() {
    let (app, store) = setup();
    seed_product(&store, "SKU-001", 1000, 5).await;
    let user = UserId::new();

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/cart/add",
            Some((user, "user")),
            Some(serde_json::json!({"product_id": "SKU-001", "quantity": 3})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["cart"]["total"], 3000);
    assert_eq!(json["cart"]["lines"][0]["name"], "Widget");
    assert_eq!(json["cart"]["lines"][0]["quantity"], 3);

    assert_eq!(stock_of(&store, "SKU-001").await, 2);

    // GET /cart returns the same resolved view
    let response = app
        .oneshot(request("GET", "/cart", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["cart"]["total"], 3000);
}

#[tokio::test]
async fn test_add_to_cart_failures() {
    let (app, store) = setup();
    seed_product(&store, "SKU-001", 1000, 2).await;
    let user = UserId::new();

    // Unknown product
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/cart/add",
            Some((user, "user")),
            Some(serde_json::json!({"product_id": "SKU-404", "quantity": 1})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // More than the ledger holds
    let response = app
        .oneshot(request(
            "PUT",
            "/cart/add",
            Some((user, "user")),
            Some(serde_json::json!({"product_id": "SKU-001", "quantity": 3})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&store, "SKU-001").await, 2);
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let (app, store) = setup();
    seed_product(&store, "SKU-001", 1000, 5).await;
    let user = UserId::new();

    app.clone()
        .oneshot(request(
            "PUT",
            "/cart/add",
            Some((user, "user")),
            Some(serde_json::json!({"product_id": "SKU-001", "quantity": 2})),
        ))
        .await
        .unwrap();
    assert_eq!(stock_of(&store, "SKU-001").await, 3);

    let response = app
        .clone()
        .oneshot(request("DELETE", "/cart", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stock_of(&store, "SKU-001").await, 5);

    // Cart is gone now
    let response = app
        .oneshot(request("GET", "/cart", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_commit_empty_or_missing_cart_fails() {
    let (app, _) = setup();
    let user = UserId::new();

    let response = app
        .clone()
        .oneshot(request("POST", "/invoices", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(request("POST", "/cart", Some((user, "user")), None))
        .await
        .unwrap();

    let response = app
        .oneshot(request("POST", "/invoices", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_checkout_and_amend_flow() {
    let (app, store) = setup();
    let admin = UserId::new();
    let user = UserId::new();

    // Admin seeds the catalog over HTTP
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/products",
            Some((admin, "admin")),
            Some(serde_json::json!({
                "id": "SKU-A",
                "name": "Almond Mill",
                "price_cents": 1000,
                "stock": 5
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // User reserves 3 units
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/cart/add",
            Some((user, "user")),
            Some(serde_json::json!({"product_id": "SKU-A", "quantity": 3})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stock_of(&store, "SKU-A").await, 2);

    // Commit the cart
    let response = app
        .clone()
        .oneshot(request("POST", "/invoices", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["invoice"]["total"], 3000);
    let invoice_id = json["invoice"]["id"].as_str().unwrap().to_string();

    // Cart is gone, stock still reserved by the invoice
    let response = app
        .clone()
        .oneshot(request("GET", "/cart", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(stock_of(&store, "SKU-A").await, 2);

    // The invoice shows up in the user's listing
    let response = app
        .clone()
        .oneshot(request("GET", "/invoices", Some((user, "user")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["invoices"][0]["total"], 3000);

    // A regular user may not amend
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/invoices/{invoice_id}"),
            Some((user, "user")),
            Some(serde_json::json!({"products": [{"product_id": "SKU-A", "quantity": 1}]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin amends down to one unit: stock 2 + 3 - 1 = 4, total $10
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/invoices/{invoice_id}"),
            Some((admin, "admin")),
            Some(serde_json::json!({"products": [{"product_id": "SKU-A", "quantity": 1}]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["invoice"]["total"], 1000);
    assert_eq!(stock_of(&store, "SKU-A").await, 4);
}

#[tokio::test]
async fn test_amend_unknown_invoice_is_not_found() {
    let (app, _) = setup();
    let admin = UserId::new();

    let response = app
        .oneshot(request(
            "PUT",
            &format!("/invoices/{}", uuid::Uuid::new_v4()),
            Some((admin, "admin")),
            Some(serde_json::json!({"products": []})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_management_requires_admin() {
    let (app, store) = setup();
    let user = UserId::new();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/products",
            Some((user, "user")),
            Some(serde_json::json!({
                "id": "SKU-X",
                "name": "Forbidden Fruit",
                "price_cents": 100,
                "stock": 1
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    seed_product(&store, "SKU-001", 1000, 5).await;
    let response = app
        .oneshot(request(
            "PUT",
            "/products/SKU-001",
            Some((user, "user")),
            Some(serde_json::json!({"status": false})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_can_retire_a_product() {
    let (app, store) = setup();
    let admin = UserId::new();
    let user = UserId::new();
    seed_product(&store, "SKU-001", 1000, 5).await;

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/products/SKU-001",
            Some((admin, "admin")),
            Some(serde_json::json!({"status": false})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Retired products reject reservations
    let response = app
        .oneshot(request(
            "PUT",
            "/cart/add",
            Some((user, "user")),
            Some(serde_json::json!({"product_id": "SKU-001", "quantity": 1})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
