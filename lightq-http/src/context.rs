//! Per-request path and correlation id, threaded through every handler so
//! the unified error body in [`crate::error`] never has to be assembled
//! twice. The id itself is generated and propagated by [`request_id_layer`].

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::ApiError;

/// Header every request is tagged with, generating one if the caller didn't
/// supply it, and propagated onto the response by [`crate::routes::router`].
pub(crate) fn request_id_header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

#[derive(Clone, Default)]
pub(crate) struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Extracted once per handler: the request's path (for the error body's
/// `path` field) and its correlation id (for `requestId`).
pub struct RequestContext {
    pub(crate) path: String,
    pub(crate) request_id: String,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| "unknown".to_owned());
        Ok(Self {
            path: parts.uri.path().to_owned(),
            request_id,
        })
    }
}

impl RequestContext {
    pub(crate) fn error(&self, err: lightq_core::LightQError) -> ApiError {
        ApiError::from_core(err, self)
    }

    pub(crate) fn bad_request(&self, message: impl Into<String>) -> ApiError {
        ApiError::new(axum::http::StatusCode::BAD_REQUEST, "Bad Request", message, self)
    }

    pub(crate) fn not_found(&self, message: impl Into<String>) -> ApiError {
        ApiError::new(axum::http::StatusCode::NOT_FOUND, "Not Found", message, self)
    }
}
