//! Model CRUD handlers: list, read, create, replace, patch, delete. Generic over the model,
//! all state comes from the gateway.

use crate::error::{AppError, StoreError};
use crate::identity::{check_identity, IdentityCheck};
use crate::model::{decode_fresh, Model};
use crate::response::{json_respond, json_respond_with_status};
use crate::store::{Gateway, UpdateMode};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};

/// Path identifiers are digits by route; one too large for `i64` cannot exist in the store.
fn parse_id<M: Model>(id_str: &str) -> Result<i64, AppError> {
    id_str.parse().map_err(|_| AppError::NotFound {
        type_name: M::NAME,
        id: id_str.to_string(),
    })
}

/// Response for a request that reached an uninitialized gateway: nothing was done.
fn skipped() -> Response {
    json_respond_with_status::<()>(None, StatusCode::OK)
}

fn lookup_failed<M: Model>(id_str: &str) -> impl FnOnce(StoreError) -> AppError + '_ {
    move |e| AppError::from_store(e, M::NAME, id_str)
}

pub async fn list<M: Model>(State(gateway): State<Gateway>) -> Result<Response, AppError> {
    let Some(items) = gateway.list::<M>().await else {
        return Ok(skipped());
    };
    let items = items.map_err(AppError::Store)?;
    Ok(json_respond(Some(&items)))
}

pub async fn read<M: Model>(
    State(gateway): State<Gateway>,
    Path(id_str): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id::<M>(&id_str)?;
    let Some(found) = gateway.find::<M>(id).await else {
        return Ok(skipped());
    };
    let instance = found.map_err(lookup_failed::<M>(&id_str))?;
    Ok(json_respond(Some(&instance)))
}

pub async fn create<M: Model>(
    State(gateway): State<Gateway>,
    body: Bytes,
) -> Result<Response, AppError> {
    let decoded = decode_fresh::<M>(&body)?;
    let Some(created) = gateway.create(&decoded.instance).await else {
        return Ok(skipped());
    };
    let created = created.map_err(AppError::Store)?;
    tracing::debug!(model = M::NAME, id = ?created.id(), "created");
    Ok(json_respond(Some(&created)))
}

pub async fn replace<M: Model>(
    State(gateway): State<Gateway>,
    Path(id_str): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    apply_update::<M>(&gateway, &id_str, &body, UpdateMode::Replace).await
}

pub async fn patch<M: Model>(
    State(gateway): State<Gateway>,
    Path(id_str): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    apply_update::<M>(&gateway, &id_str, &body, UpdateMode::Merge).await
}

/// Decode, load the existing record, refuse identity changes, then write.
async fn apply_update<M: Model>(
    gateway: &Gateway,
    id_str: &str,
    body: &[u8],
    mode: UpdateMode,
) -> Result<Response, AppError> {
    let decoded = decode_fresh::<M>(body)?;
    let id = parse_id::<M>(id_str)?;
    let Some(existing) = gateway.find::<M>(id).await else {
        return Ok(skipped());
    };
    let existing = existing.map_err(lookup_failed::<M>(id_str))?;

    if let IdentityCheck::Reject { existing, candidate } =
        check_identity(existing.id(), decoded.candidate_id())
    {
        tracing::debug!(model = M::NAME, existing, candidate, "identity change refused");
        return Err(AppError::IdentityChange {
            type_name: M::NAME,
            existing,
            candidate,
        });
    }

    let changes = decoded
        .changes(mode)
        .map_err(|e| AppError::Store(StoreError::from(e)))?;
    let Some(updated) = gateway.update::<M>(id, changes, mode).await else {
        return Ok(skipped());
    };
    let updated = updated.map_err(lookup_failed::<M>(id_str))?;
    Ok(json_respond(Some(&updated)))
}

pub async fn delete<M: Model>(
    State(gateway): State<Gateway>,
    Path(id_str): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id::<M>(&id_str)?;
    let Some(existing) = gateway.find::<M>(id).await else {
        return Ok(skipped());
    };
    existing.map_err(lookup_failed::<M>(&id_str))?;
    let Some(removed) = gateway.delete::<M>(id).await else {
        return Ok(skipped());
    };
    let removed = removed.map_err(lookup_failed::<M>(&id_str))?;
    Ok(json_respond(Some(&removed)))
}
