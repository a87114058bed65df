//! Maps [`LightQError`] (and the handful of HTTP-adapter-only failures —
//! a missing header, a malformed query parameter) to the unified error
//! body every non-2xx response carries.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use lightq_core::LightQError;
use serde::Serialize;

use crate::context::RequestContext;

#[derive(Debug, Serialize)]
struct ErrorBody {
    timestamp: chrono::DateTime<Utc>,
    status: u16,
    error: String,
    message: String,
    path: String,
    request_id: String,
}

/// An error already carrying everything the unified error body needs.
/// Built through [`RequestContext::error`]/[`RequestContext::bad_request`]/
/// [`RequestContext::not_found`] so every handler produces a consistent
/// body without repeating the request's path and id at each call site.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
    path: String,
    request_id: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, error: &'static str, message: impl Into<String>, ctx: &RequestContext) -> Self {
        Self {
            status,
            error,
            message: message.into(),
            path: ctx.path.clone(),
            request_id: ctx.request_id.clone(),
        }
    }

    pub(crate) fn from_core(err: LightQError, ctx: &RequestContext) -> Self {
        let (status, label) = match &err {
            LightQError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            LightQError::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
            LightQError::StoreUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            LightQError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };
        Self::new(status, label, err.to_string(), ctx)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            timestamp: Utc::now(),
            status: self.status.as_u16(),
            error: self.error.to_owned(),
            message: self.message,
            path: self.path,
            request_id: self.request_id,
        };
        (self.status, Json(body)).into_response()
    }
}
