//! PostgreSQL backend: parameterized statements over a shared pool, rows returned as JSON.

use super::{Backend, UpdateMode};
use crate::error::StoreError;
use crate::model::Row;
use crate::sql::{self, ColumnTypes, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{ConnectOptions, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

const COLUMN_TYPES_SQL: &str = "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod) \
     FROM pg_attribute a \
     WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped";

pub struct PgBackend {
    pool: PgPool,
    /// Column types per table, loaded on first write.
    column_types: RwLock<HashMap<String, Arc<ColumnTypes>>>,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        PgBackend {
            pool,
            column_types: RwLock::new(HashMap::new()),
        }
    }

    /// Catalog types of `table`'s columns. Writes cast their parameters to these so string
    /// values reach `uuid`, `date` or `timestamptz` columns. An unknown table yields an empty
    /// map, which is not cached.
    async fn column_types(&self, table: &str) -> Result<Arc<ColumnTypes>, StoreError> {
        let cached = self
            .column_types
            .read()
            .map_err(|_| StoreError::Backend("column type cache poisoned".into()))?
            .get(table)
            .cloned();
        if let Some(types) = cached {
            return Ok(types);
        }

        let rows: Vec<(String, String)> = sqlx::query_as(COLUMN_TYPES_SQL)
            .bind(sql::qualified_table(table))
            .fetch_all(&self.pool)
            .await?;
        let types: Arc<ColumnTypes> = Arc::new(rows.into_iter().collect());
        tracing::debug!(table, columns = types.len(), "loaded column types");
        if !types.is_empty() {
            self.column_types
                .write()
                .map_err(|_| StoreError::Backend("column type cache poisoned".into()))?
                .insert(table.to_string(), types.clone());
        }
        Ok(types)
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    async fn fetch_one(&self, q: &QueryBuf) -> Result<Row, StoreError> {
        self.fetch_optional(q).await?.ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn find_all(&self, table: &str, id_field: &str) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_all(table, id_field);
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query(&q.sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn find(&self, table: &str, id_field: &str, id: i64) -> Result<Row, StoreError> {
        self.fetch_one(&sql::select_by_id(table, id_field, id)).await
    }

    async fn insert(&self, table: &str, id_field: &str, row: Row) -> Result<Row, StoreError> {
        let types = self.column_types(table).await?;
        let row = self
            .fetch_optional(&sql::insert(table, id_field, &row, &types))
            .await?
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", table)))?;
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        id_field: &str,
        id: i64,
        changes: Row,
        _mode: UpdateMode,
    ) -> Result<Row, StoreError> {
        // Replace callers already send every model column, so both modes are a column-wise SET.
        let types = self.column_types(table).await?;
        self.fetch_one(&sql::update(table, id_field, id, &changes, &types))
            .await
    }

    async fn delete(&self, table: &str, id_field: &str, id: i64) -> Result<Row, StoreError> {
        self.fetch_one(&sql::delete(table, id_field, id)).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before connecting the gateway.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name.replace('"', "\"\"")))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}
