//! HTTP handlers for model CRUD and the handler set that bundles them per model.

pub mod entity;
pub use entity::*;

use crate::model::Model;
use crate::store::Gateway;
use axum::{
    extract::Request,
    handler::Handler,
    response::Response,
};
use std::convert::Infallible;
use tower::util::BoxCloneService;

/// One type-erased request handler with its state already attached.
pub type OperationHandler = BoxCloneService<Request, Response, Infallible>;

/// Erase any axum handler (async fn with extractors) into an [`OperationHandler`].
pub fn operation<H, T, S>(handler: H, state: S) -> OperationHandler
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    BoxCloneService::new(handler.with_state(state))
}

/// The six operations for one model. Built once at registration and shared by every request;
/// any field can be swapped for a custom handler before binding.
#[derive(Clone)]
pub struct HandlerSet {
    pub list: OperationHandler,
    pub get: OperationHandler,
    pub create: OperationHandler,
    pub replace: OperationHandler,
    pub patch: OperationHandler,
    pub delete: OperationHandler,
}

impl HandlerSet {
    pub fn for_model<M: Model>(gateway: Gateway) -> Self {
        HandlerSet {
            list: operation(entity::list::<M>, gateway.clone()),
            get: operation(entity::read::<M>, gateway.clone()),
            create: operation(entity::create::<M>, gateway.clone()),
            replace: operation(entity::replace::<M>, gateway.clone()),
            patch: operation(entity::patch::<M>, gateway.clone()),
            delete: operation(entity::delete::<M>, gateway),
        }
    }
}
