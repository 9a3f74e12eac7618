//! JSON response helpers shared by every handler.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// 200 with `data` encoded as JSON.
pub fn json_respond<T: Serialize>(data: Option<&T>) -> Response {
    json_respond_with_status(data, StatusCode::OK)
}

/// `data` encoded as JSON with the given status. `None` writes the headers and an empty body.
pub fn json_respond_with_status<T: Serialize>(data: Option<&T>, status: StatusCode) -> Response {
    let body = match data.map(serde_json::to_vec) {
        None => Body::empty(),
        Some(Ok(bytes)) => Body::from(bytes),
        Some(Err(e)) => {
            tracing::error!(error = %e, "failed to encode response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    resp
}

/// Like [`json_respond`], but only when the client accepts JSON; otherwise 415.
pub fn respond<T: Serialize>(headers: &HeaderMap, data: Option<&T>) -> Response {
    respond_with_status(headers, data, StatusCode::OK)
}

pub fn respond_with_status<T: Serialize>(
    headers: &HeaderMap,
    data: Option<&T>,
    status: StatusCode,
) -> Response {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == JSON_CONTENT_TYPE)
        .unwrap_or(false);
    if !accepts_json {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    json_respond_with_status(data, status)
}
