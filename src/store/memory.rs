use super::{Backend, UpdateMode};
use crate::error::StoreError;
use crate::model::Row;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Row>,
}

/// In-process store with auto-increment identities. Backs tests and the `memory` store
/// setting of the demo server; contents are lost on exit.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    simulate_write_error: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with a backend error, for exercising error paths.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Table>>, StoreError> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated write error".into()));
        }
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

/// An identity the caller chose: present, non-null, non-zero.
fn explicit_id(row: &Row, id_field: &str) -> Result<Option<i64>, StoreError> {
    match row.get(id_field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_i64() {
            Some(0) => Ok(None),
            Some(id) => Ok(Some(id)),
            None => Err(StoreError::Constraint(format!(
                "{} must be an integer, got {}",
                id_field, v
            ))),
        },
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn find_all(&self, table: &str, _id_field: &str) -> Result<Vec<Row>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find(&self, table: &str, _id_field: &str, id: i64) -> Result<Row, StoreError> {
        let tables = self.read()?;
        tables
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, table: &str, id_field: &str, mut row: Row) -> Result<Row, StoreError> {
        let mut tables = self.write()?;
        let t = tables.entry(table.to_string()).or_default();
        let id = match explicit_id(&row, id_field)? {
            Some(id) if t.rows.contains_key(&id) => {
                return Err(StoreError::Constraint(format!(
                    "duplicate key: {} {} already exists in {}",
                    id_field, id, table
                )));
            }
            Some(id) => id,
            None => t.last_id + 1,
        };
        t.last_id = t.last_id.max(id);
        row.insert(id_field.to_string(), Value::from(id));
        t.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        id_field: &str,
        id: i64,
        changes: Row,
        mode: UpdateMode,
    ) -> Result<Row, StoreError> {
        let mut tables = self.write()?;
        let stored = tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&id))
            .ok_or(StoreError::NotFound)?;
        if mode == UpdateMode::Replace {
            stored.retain(|k, _| k == id_field);
        }
        for (k, v) in changes {
            if k != id_field {
                stored.insert(k, v);
            }
        }
        Ok(stored.clone())
    }

    async fn delete(&self, table: &str, _id_field: &str, id: i64) -> Result<Row, StoreError> {
        let mut tables = self.write()?;
        tables
            .get_mut(table)
            .and_then(|t| t.rows.remove(&id))
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryBackend::new();
        let a = store.insert("t", "ID", row(json!({"ID": 0, "Code": "A"}))).await;
        let b = store.insert("t", "ID", row(json!({"Code": "B"}))).await;
        assert_eq!(a.ok().and_then(|r| r["ID"].as_i64()), Some(1));
        assert_eq!(b.ok().and_then(|r| r["ID"].as_i64()), Some(2));
    }

    #[tokio::test]
    async fn explicit_ids_are_kept_and_must_be_unique() {
        let store = MemoryBackend::new();
        assert!(store.insert("t", "ID", row(json!({"ID": 10}))).await.is_ok());
        let dup = store.insert("t", "ID", row(json!({"ID": 10}))).await;
        assert!(matches!(dup, Err(StoreError::Constraint(_))));
        let next = store.insert("t", "ID", Row::new()).await;
        assert_eq!(next.ok().and_then(|r| r["ID"].as_i64()), Some(11));
    }

    #[tokio::test]
    async fn merge_overlays_and_replace_resets() {
        let store = MemoryBackend::new();
        let _ = store.insert("t", "ID", row(json!({"A": 1, "B": 2}))).await;

        let merged = store
            .update("t", "ID", 1, row(json!({"B": 3})), UpdateMode::Merge)
            .await;
        assert_eq!(merged.ok().map(Value::Object), Some(json!({"ID": 1, "A": 1, "B": 3})));

        let replaced = store
            .update("t", "ID", 1, row(json!({"B": 4})), UpdateMode::Replace)
            .await;
        assert_eq!(replaced.ok().map(Value::Object), Some(json!({"ID": 1, "B": 4})));
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let store = MemoryBackend::new();
        assert!(matches!(store.find("t", "ID", 1).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete("t", "ID", 1).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.update("t", "ID", 1, Row::new(), UpdateMode::Merge).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.find_all("t", "ID").await.map(|r| r.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn simulated_write_errors_leave_reads_working() {
        let store = MemoryBackend::new();
        let _ = store.insert("t", "ID", Row::new()).await;
        store.set_simulate_write_error(true);
        assert!(matches!(
            store.insert("t", "ID", Row::new()).await,
            Err(StoreError::Backend(_))
        ));
        assert!(store.find("t", "ID", 1).await.is_ok());
    }
}
