//! Demo server: CRUD endpoints for products under `/products/`.
//!
//! Run from repo root: `cargo run -p crud-demo -- --graceful-timeout 5s`
//! `STORE=postgres` with `DATABASE_URL` switches from the in-memory store to PostgreSQL.

use clap::Parser;
use crud_sdk::{
    ensure_database_exists, start_http_listener, view, CorsPolicy, Gateway, ListenerArgs, Model,
    ServerConfig, StoreKind,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

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
    const TABLE: &'static str = "products";

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }
}

#[derive(Parser)]
#[command(name = "crud-demo", about = "Serve Product CRUD endpoints")]
struct Cli {
    #[command(flatten)]
    listener: ListenerArgs,

    /// Backing store: memory or postgres
    #[arg(long, env = "STORE", default_value = "memory")]
    store: String,
}

async fn migrate(pool: PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS products (
            "ID" BIGSERIAL PRIMARY KEY,
            "Code" TEXT NOT NULL DEFAULT '',
            "Price" BIGINT NOT NULL DEFAULT 0
        )"#,
    )
    .execute(&pool)
    .await?;
    Ok(())
}

async fn open_store(kind: StoreKind) -> Result<Gateway, Box<dyn std::error::Error>> {
    match kind {
        StoreKind::Memory => Ok(Gateway::in_memory()),
        StoreKind::Postgres => {
            let database_url = std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/crud_demo".into());
            ensure_database_exists(&database_url).await?;
            Ok(Gateway::connect_postgres(&database_url, migrate).await?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("crud_sdk=info,crud_demo=info,tower_http=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    let kind: StoreKind = cli.store.parse()?;
    let gateway = open_store(kind).await?;
    tracing::info!(store = ?kind, "store ready");

    let mut config = ServerConfig::from_env()?;
    cli.listener.apply(&mut config);
    config.cors = CorsPolicy::Permissive;

    let routes = gateway.clone();
    let served = start_http_listener(config, move |router| {
        view::<Product>(router, "/products", &routes, None)
    })
    .await;

    gateway.close().await;
    tracing::info!("shutting down");
    served?;
    Ok(())
}
