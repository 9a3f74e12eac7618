//! Persistence gateway: one explicitly constructed handle to the active store, shared by all
//! handler sets. Backends work on JSON rows; the gateway converts rows to and from models.

mod memory;
mod postgres;

pub use memory::MemoryBackend;
pub use postgres::{ensure_database_exists, PgBackend};

use crate::error::StoreError;
use crate::model::{from_row, to_row, Model, Row};
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;

/// How an update applies the supplied fields to the stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// The record becomes its identity plus the supplied fields.
    Replace,
    /// The supplied fields overlay the stored record.
    Merge,
}

/// Find/create/update/delete by integer identity. `StoreError::NotFound` is the only
/// "absent" signal; every other error is a store failure.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn find_all(&self, table: &str, id_field: &str) -> Result<Vec<Row>, StoreError>;

    async fn find(&self, table: &str, id_field: &str, id: i64) -> Result<Row, StoreError>;

    /// Store a new row and return it as stored, identity included.
    async fn insert(&self, table: &str, id_field: &str, row: Row) -> Result<Row, StoreError>;

    async fn update(
        &self,
        table: &str,
        id_field: &str,
        id: i64,
        changes: Row,
        mode: UpdateMode,
    ) -> Result<Row, StoreError>;

    /// Remove a row and return it as it was just before removal.
    async fn delete(&self, table: &str, id_field: &str, id: i64) -> Result<Row, StoreError>;

    async fn close(&self) {}
}

#[derive(Clone, Default)]
pub struct Gateway {
    backend: Option<Arc<dyn Backend>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Gateway {
    /// A gateway with no store behind it; every `run` is a no-op.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Gateway {
            backend: Some(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Connect to PostgreSQL, then hand the pool to `migrate` once before serving.
    /// Connection or migration failure is returned to the caller, which is expected to exit.
    pub async fn connect_postgres<F, Fut>(database_url: &str, migrate: F) -> Result<Self, StoreError>
    where
        F: FnOnce(PgPool) -> Fut,
        Fut: Future<Output = Result<(), sqlx::Error>>,
    {
        tracing::info!("opening database connection");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        migrate(pool.clone()).await?;
        Ok(Self::new(Arc::new(PgBackend::new(pool))))
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Run `op` against the store. Returns `None` without calling `op` when no store was set up.
    pub async fn run<'a, F, Fut, T>(&'a self, op: F) -> Option<T>
    where
        F: FnOnce(&'a dyn Backend) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        match &self.backend {
            Some(backend) => Some(op(backend.as_ref()).await),
            None => {
                tracing::warn!("store not initialized, skipping operation");
                None
            }
        }
    }

    pub async fn list<M: Model>(&self) -> Option<Result<Vec<M>, StoreError>> {
        self.run(|b| async move {
            let rows = b.find_all(M::TABLE, M::ID_FIELD).await?;
            rows.into_iter()
                .map(|r| from_row::<M>(r).map_err(StoreError::from))
                .collect::<Result<Vec<M>, StoreError>>()
        })
        .await
    }

    pub async fn find<M: Model>(&self, id: i64) -> Option<Result<M, StoreError>> {
        self.run(|b| async move {
            let row = b.find(M::TABLE, M::ID_FIELD, id).await?;
            Ok::<M, StoreError>(from_row::<M>(row)?)
        })
        .await
    }

    pub async fn create<M: Model>(&self, instance: &M) -> Option<Result<M, StoreError>> {
        self.run(|b| async move {
            let row = to_row(instance)?;
            let stored = b.insert(M::TABLE, M::ID_FIELD, row).await?;
            Ok::<M, StoreError>(from_row::<M>(stored)?)
        })
        .await
    }

    pub async fn update<M: Model>(
        &self,
        id: i64,
        changes: Row,
        mode: UpdateMode,
    ) -> Option<Result<M, StoreError>> {
        self.run(|b| async move {
            let row = b.update(M::TABLE, M::ID_FIELD, id, changes, mode).await?;
            Ok::<M, StoreError>(from_row::<M>(row)?)
        })
        .await
    }

    pub async fn delete<M: Model>(&self, id: i64) -> Option<Result<M, StoreError>> {
        self.run(|b| async move {
            let row = b.delete(M::TABLE, M::ID_FIELD, id).await?;
            Ok::<M, StoreError>(from_row::<M>(row)?)
        })
        .await
    }

    pub async fn close(&self) {
        if let Some(backend) = &self.backend {
            backend.close().await;
            tracing::info!("closed database connection");
        }
    }
}
