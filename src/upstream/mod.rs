//! Outbound fetch subsystem.
//!
//! # Data Flow
//! ```text
//! target URL (from the `url` query parameter)
//!     → Fetch::fetch (exactly one call per inbound request)
//!     → UpstreamResponse { status, content_type, streaming body }
//!     → http::response shapes it for the client
//! ```
//!
//! # Design Decisions
//! - The handler only sees the `Fetch` trait; `HttpFetcher` is the real client
//! - Failures are values (`FetchError`), never panics
//! - Bodies stay streams; nothing here buffers

pub mod client;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode};
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use client::HttpFetcher;

/// Boxed error raised while sending the outbound request.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response obtained from the single outbound fetch.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Body,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, value: HeaderValue) -> Self {
        self.content_type = Some(value);
        self
    }
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Failure of the outbound fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Target could not be parsed as an absolute URL.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Anything raised while sending the request or awaiting its headers.
    #[error("{0}")]
    Transport(BoxError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(Box::new(err))
    }
}

/// Outbound fetch abstraction.
pub trait Fetch: Send + Sync {
    /// Issue one GET to `url` and resolve once response headers arrive.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<UpstreamResponse, FetchError>>;
}
