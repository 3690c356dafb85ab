//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, `url` query parameter)
//!     → upstream (single outbound fetch)
//!     → security (extension allow-list, when enforced)
//!     → response.rs (CORS headers, status/body mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{target_url, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::{cors_headers, relay_response, RelayError};
pub use server::{AppState, HttpServer};
