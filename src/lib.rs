//! CORS relay library.
//!
//! Fetches the URL named by the `url` query parameter and relays the upstream
//! status and body back with permissive CORS headers, optionally restricted
//! to an allow-list of file extensions.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upstream;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
