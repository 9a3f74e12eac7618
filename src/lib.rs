//! CRUD SDK: generic REST endpoints for any serde model.
//!
//! A type implementing [`Model`] gets list, get, create, replace, patch and delete routes
//! under a prefix, backed by whatever store the [`Gateway`] holds.

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod response;
pub mod routes;
pub mod server;
pub mod sql;
pub mod store;

pub use config::{CorsPolicy, ListenerArgs, ServerConfig, StoreKind};
pub use error::{AppError, ConfigError, ServerError, StoreError};
pub use handlers::{operation, HandlerSet, OperationHandler};
pub use identity::{check_identity, IdentityCheck};
pub use model::{decode_fresh, Model, Row};
pub use response::{json_respond, json_respond_with_status, respond, respond_with_status};
pub use routes::{bind, normalize_prefix, view};
pub use server::{build_app, serve, serve_on, start_http_listener};
pub use store::{ensure_database_exists, Backend, Gateway, MemoryBackend, PgBackend, UpdateMode};
