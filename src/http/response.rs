//! Response handling and transformation.
//!
//! # Responsibilities
//! - Build the pass-through response from the upstream response
//! - Attach the fixed CORS header set
//! - Map relay errors to HTTP status codes and plain-text bodies
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the upstream body
//! - Upstream headers are replaced, not merged; only content type survives
//! - Error responses carry no CORS headers

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::upstream::{FetchError, UpstreamResponse};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET,HEAD,OPTIONS";
const ALLOW_HEADERS: &str = "*";

/// Fixed header set attached to every pass-through response.
pub fn cors_headers(content_type: HeaderValue) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(CONTENT_TYPE, content_type);
    headers
}

/// Relay the upstream status and body stream under the CORS header set.
///
/// A missing upstream content type becomes an empty `Content-Type`.
pub fn relay_response(upstream: UpstreamResponse) -> Response {
    let content_type = upstream
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static(""));

    let mut response = Response::new(upstream.body);
    *response.status_mut() = upstream.status;
    *response.headers_mut() = cors_headers(content_type);
    response
}

/// Terminal outcome of a request that is not a pass-through.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No usable `url` query parameter.
    #[error("Missing `url` query parameter.")]
    MissingUrl,

    /// Allow-list enforced and the target's extension is not on it.
    #[error("Unsupported file type.")]
    UnsupportedFileType { extension: String },

    /// The outbound fetch failed.
    #[error("Error fetching URL: {0}")]
    Fetch(#[from] FetchError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl => StatusCode::BAD_REQUEST,
            RelayError::UnsupportedFileType { .. } => StatusCode::FORBIDDEN,
            RelayError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
