//! Model routes: mounts a handler set under a path prefix.
//!
//! | Method | Path       | Operation |
//! |--------|------------|-----------|
//! | GET    | `P/`       | list      |
//! | POST   | `P/`       | create    |
//! | GET    | `P/:id/`   | get       |
//! | PUT    | `P/:id/`   | replace   |
//! | PATCH  | `P/:id/`   | patch     |
//! | DELETE | `P/:id/`   | delete    |
//!
//! `:id` only matches digits; any other segment answers 404 as if unrouted, whatever the method.

use crate::handlers::HandlerSet;
use crate::model::Model;
use crate::store::Gateway;
use axum::{
    extract::{Path, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get_service,
    Router,
};

/// Leading `/` added, trailing `/` removed. The root prefix stays `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn route_paths(prefix: &str) -> (String, String) {
    let base = if prefix == "/" { "" } else { prefix };
    (format!("{}/", base), format!("{}/:id/", base))
}

async fn require_numeric_id(Path(id): Path<String>, request: Request, next: Next) -> Response {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

/// Mount the CRUD routes of `M` under `prefix`. `handlers` overrides the generated set.
pub fn view<M: Model>(
    router: Router,
    prefix: &str,
    gateway: &Gateway,
    handlers: Option<HandlerSet>,
) -> Router {
    let handlers = handlers.unwrap_or_else(|| HandlerSet::for_model::<M>(gateway.clone()));
    bind(router, prefix, handlers)
}

/// Mount a prepared handler set under `prefix`.
pub fn bind(router: Router, prefix: &str, handlers: HandlerSet) -> Router {
    let prefix = normalize_prefix(prefix);
    let (collection_path, item_path) = route_paths(&prefix);
    let HandlerSet {
        list,
        get,
        create,
        replace,
        patch,
        delete,
    } = handlers;

    let collection = get_service(list).post_service(create);
    let item = get_service(get)
        .put_service(replace)
        .patch_service(patch)
        .delete_service(delete)
        .layer(middleware::from_fn(require_numeric_id));

    tracing::debug!(prefix = %prefix, "mounted model routes");
    router
        .route(&collection_path, collection)
        .route(&item_path, item)
}
