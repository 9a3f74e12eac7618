//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::response::json_respond_with_status;

/// Message returned for every body that cannot be decoded into the model.
pub const DECODE_ERROR_MESSAGE: &str = "Unable to parse JSON body.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid duration '{0}' (expected e.g. 15s, 1m, 500ms)")]
    InvalidDuration(String),
    #[error("unsupported store '{0}' (expected memory or postgres)")]
    UnsupportedStore(String),
    #[error("invalid CORS setting: {0}")]
    InvalidCors(String),
}

/// Failures that stop the listener itself.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a persistence backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("store: {0}")]
    Backend(String),
    #[error("database: {0}")]
    Database(sqlx::Error),
    #[error("row does not match model: {0}")]
    Row(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unable to parse JSON body.")]
    Decode,
    #[error("{type_name} with ID {id} not found")]
    NotFound { type_name: &'static str, id: String },
    #[error("Unable to change ID of {type_name} from {existing} to {candidate}")]
    IdentityChange {
        type_name: &'static str,
        existing: i64,
        candidate: i64,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl AppError {
    /// Lift a store failure into a request error. `NotFound` keeps the model name and the
    /// identifier as the caller wrote it.
    pub fn from_store(e: StoreError, type_name: &'static str, id: &str) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound {
                type_name,
                id: id.to_string(),
            },
            other => AppError::Store(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            // Every other failure, store faults included, is reported as a client error.
            AppError::Decode | AppError::IdentityChange { .. } | AppError::Store(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Decode => json!({
                "Severity": "error",
                "Message": DECODE_ERROR_MESSAGE,
            }),
            AppError::NotFound { .. } | AppError::IdentityChange { .. } | AppError::Store(_) => {
                json!({
                    "error": true,
                    "message": self.to_string(),
                })
            }
        };
        if let AppError::Store(e) = &self {
            tracing::warn!(error = %e, "store operation failed");
        }
        json_respond_with_status(Some(&body), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404_with_type_and_id() {
        let err = AppError::from_store(StoreError::NotFound, "Product", "42");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Product with ID 42 not found");
    }

    #[test]
    fn store_failures_are_client_errors() {
        let err = AppError::from_store(StoreError::Backend("disk full".into()), "Product", "1");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("disk full"));

        let err = AppError::from_store(StoreError::Database(sqlx::Error::PoolTimedOut), "Product", "1");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound));
    }

    #[test]
    fn identity_change_names_both_ids() {
        let err = AppError::IdentityChange {
            type_name: "Product",
            existing: 1,
            candidate: 2,
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Unable to change ID of Product from 1 to 2");
    }
}
