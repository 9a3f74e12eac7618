//! Capability contract a type implements to get the generated CRUD endpoints.

use crate::error::AppError;
use crate::store::UpdateMode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One stored record as the backends see it: field name to JSON value.
pub type Row = Map<String, Value>;

/// A record shape served by the handler set.
///
/// `Default` is the fresh-instance factory: every request body is decoded on top of a new
/// `Self::default()`, so fields the caller omits take their default values.
///
/// ```ignore
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Product {
///     #[serde(rename = "ID")]
///     id: i64,
///     #[serde(rename = "Code")]
///     code: String,
///     #[serde(rename = "Price")]
///     price: u64,
/// }
///
/// impl Model for Product {
///     const NAME: &'static str = "Product";
///     const TABLE: &'static str = "products";
///     fn id(&self) -> Option<i64> {
///         Some(self.id)
///     }
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Name used in error messages.
    const NAME: &'static str;
    /// Table (or collection) holding the records.
    const TABLE: &'static str;
    /// Serialized name of the identity field.
    const ID_FIELD: &'static str = "ID";

    /// Integer identity of this instance; `None` disables identity protection for the model.
    fn id(&self) -> Option<i64>;
}

/// A request body decoded onto a fresh instance, plus the keys the caller actually sent.
#[derive(Debug)]
pub struct Decoded<M> {
    pub instance: M,
    supplied: HashSet<String>,
}

impl<M: Model> Decoded<M> {
    /// Identity carried by the payload, only if the caller wrote the identity field.
    pub fn candidate_id(&self) -> Option<i64> {
        if self.supplied.contains(M::ID_FIELD) {
            self.instance.id()
        } else {
            None
        }
    }

    /// Field values to write onto an existing record, identity excluded. `Replace` writes every
    /// model field; `Merge` only the ones present in the request.
    pub fn changes(&self, mode: UpdateMode) -> Result<Row, serde_json::Error> {
        let mut row = to_row(&self.instance)?;
        row.remove(M::ID_FIELD);
        if mode == UpdateMode::Merge {
            row.retain(|k, _| self.supplied.contains(k));
        }
        Ok(row)
    }
}

/// Decode a JSON object body onto `M::default()`. Anything that is not an object, or that does
/// not fit the model's field types, is a decode failure. A `null` identity is treated as absent.
pub fn decode_fresh<M: Model>(bytes: &[u8]) -> Result<Decoded<M>, AppError> {
    let body: Value = serde_json::from_slice(bytes).map_err(|_| AppError::Decode)?;
    let Value::Object(body) = body else {
        return Err(AppError::Decode);
    };
    let mut merged = to_row(&M::default()).map_err(|_| AppError::Decode)?;
    let mut supplied = HashSet::with_capacity(body.len());
    for (key, value) in body {
        if key == M::ID_FIELD && value.is_null() {
            continue;
        }
        supplied.insert(key.clone());
        merged.insert(key, value);
    }
    let instance = serde_json::from_value(Value::Object(merged)).map_err(|e| {
        tracing::debug!(model = M::NAME, error = %e, "request body does not fit model");
        AppError::Decode
    })?;
    Ok(Decoded { instance, supplied })
}

pub fn to_row<M: Serialize>(instance: &M) -> Result<Row, serde_json::Error> {
    match serde_json::to_value(instance)? {
        Value::Object(row) => Ok(row),
        other => Err(serde::ser::Error::custom(format!(
            "model must serialize to a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn from_row<M: DeserializeOwned>(row: Row) -> Result<M, serde_json::Error> {
    serde_json::from_value(Value::Object(row))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
