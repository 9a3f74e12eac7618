//! CRUD routes against a live PostgreSQL database.
//!
//! These tests need a reachable server; the database is created if missing.
//! Run with: `DATABASE_URL=postgres://localhost/crud_sdk_test cargo test --test postgres_api -- --ignored`

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use crud_sdk::{ensure_database_exists, view, Gateway, Model};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

static DATABASE_READY: OnceCell<()> = OnceCell::const_new();

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Product {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Price")]
    price: i64,
}

impl Model for Product {
    const NAME: &'static str = "Product";
    const TABLE: &'static str = "crud_test_products";

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Event {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Ref")]
    reference: Uuid,
    #[serde(rename = "At")]
    at: Option<DateTime<Utc>>,
    #[serde(rename = "Note")]
    note: String,
}

impl Model for Event {
    const NAME: &'static str = "Event";
    const TABLE: &'static str = "crud_test_events";

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }
}

async fn create_products(pool: PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS crud_test_products")
        .execute(&pool)
        .await?;
    sqlx::query(
        r#"CREATE TABLE crud_test_products (
            "ID" BIGSERIAL PRIMARY KEY,
            "Code" TEXT NOT NULL DEFAULT '',
            "Price" BIGINT NOT NULL DEFAULT 0
        )"#,
    )
    .execute(&pool)
    .await?;
    Ok(())
}

async fn create_events(pool: PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS crud_test_events")
        .execute(&pool)
        .await?;
    sqlx::query(
        r#"CREATE TABLE crud_test_events (
            "ID" BIGSERIAL PRIMARY KEY,
            "Ref" UUID NOT NULL,
            "At" TIMESTAMPTZ,
            "Note" VARCHAR(64) NOT NULL DEFAULT ''
        )"#,
    )
    .execute(&pool)
    .await?;
    Ok(())
}

/// `DATABASE_URL`, with the database created once per test binary.
async fn database_url() -> String {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a PostgreSQL server");
    DATABASE_READY
        .get_or_init(|| async {
            ensure_database_exists(&url).await.expect("create database");
        })
        .await;
    url
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    let req = builder.body(body).expect("build request");
    let resp = app.clone().oneshot(req).await.expect("router is infallible");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes).expect("JSON response body");
    (status, value)
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server at DATABASE_URL"]
async fn product_lifecycle_on_postgres() {
    let url = database_url().await;
    let gw = Gateway::connect_postgres(&url, create_products)
        .await
        .expect("connect and migrate");
    let app = view::<Product>(Router::new(), "/products", &gw, None);

    let (status, created) =
        send_json(&app, Method::POST, "/products/", Some(r#"{"Code":"A1","Price":100}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created, json!({"ID": 1, "Code": "A1", "Price": 100}));

    let (status, fetched) = send_json(&app, Method::GET, "/products/1/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, body) = send_json(
        &app,
        Method::PUT,
        "/products/1/",
        Some(r#"{"ID":2,"Code":"A1","Price":150}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unable to change ID of Product from 1 to 2");
    let (_, unchanged) = send_json(&app, Method::GET, "/products/1/", None).await;
    assert_eq!(unchanged, created);

    let (status, updated) =
        send_json(&app, Method::PUT, "/products/1/", Some(r#"{"Code":"A1","Price":150}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["Price"], 150);

    let (status, patched) =
        send_json(&app, Method::PATCH, "/products/1/", Some(r#"{"Price":175}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched, json!({"ID": 1, "Code": "A1", "Price": 175}));

    let (status, removed) = send_json(&app, Method::DELETE, "/products/1/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed, patched);

    let (status, body) = send_json(&app, Method::GET, "/products/1/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
    let (status, _) = send_json(&app, Method::DELETE, "/products/1/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    gw.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server at DATABASE_URL"]
async fn uuid_and_timestamp_columns_are_writable() {
    let url = database_url().await;
    let gw = Gateway::connect_postgres(&url, create_events)
        .await
        .expect("connect and migrate");
    let app = view::<Event>(Router::new(), "/events", &gw, None);

    let (status, created) = send_json(
        &app,
        Method::POST,
        "/events/",
        Some(r#"{"Ref":"67e55044-10b1-426f-9247-bb680e5fe0c8","At":"2024-01-02T03:04:05Z","Note":"boot"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {created}");
    assert_eq!(
        created,
        json!({
            "ID": 1,
            "Ref": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "At": "2024-01-02T03:04:05Z",
            "Note": "boot"
        })
    );

    let (status, patched) =
        send_json(&app, Method::PATCH, "/events/1/", Some(r#"{"At":"2025-06-30T12:00:00Z"}"#)).await;
    assert_eq!(status, StatusCode::OK, "patch failed: {patched}");
    assert_eq!(patched["At"], "2025-06-30T12:00:00Z");
    assert_eq!(patched["Note"], "boot");

    let (status, replaced) = send_json(
        &app,
        Method::PUT,
        "/events/1/",
        Some(r#"{"Ref":"a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "replace failed: {replaced}");
    assert_eq!(
        replaced,
        json!({
            "ID": 1,
            "Ref": "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8",
            "At": null,
            "Note": ""
        })
    );

    let (status, list) = send_json(&app, Method::GET, "/events/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([replaced]));

    gw.close().await;
}
