//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay handler on every path
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Relay each request through a single upstream fetch
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::http::request::{target_url, RequestIdExt, RequestIdLayer};
use crate::http::response::{relay_response, RelayError};
use crate::observability::metrics;
use crate::security::{extension_of, ExtensionFilter};
use crate::upstream::{Fetch, FetchError, HttpFetcher};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn Fetch>,
    pub filter: Option<Arc<ExtensionFilter>>,
}

impl AppState {
    pub fn new(fetcher: Arc<dyn Fetch>, filter: Option<ExtensionFilter>) -> Self {
        Self {
            fetcher,
            filter: filter.map(Arc::new),
        }
    }
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server fetching upstream over HTTP.
    pub fn new(config: RelayConfig) -> Result<Self, FetchError> {
        let fetcher = Arc::new(HttpFetcher::new(&config.upstream)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a new HTTP server around an arbitrary fetcher.
    pub fn with_fetcher(config: RelayConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let filter = ExtensionFilter::from_config(&config.relay);
        if let Some(filter) = &filter {
            let mut allowed: Vec<_> = filter.allowed().collect();
            allowed.sort_unstable();
            tracing::info!(allowed = ?allowed, "Extension allow-list enforced");
        }

        let router = Self::build_router(AppState::new(fetcher, filter));
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(RequestIdLayer)
                    .layer(TraceLayer::new_for_http().make_span_with(
                        |request: &Request<Body>| {
                            tracing::info_span!(
                                "relay",
                                request_id = %request.request_id(),
                                method = %request.method(),
                            )
                        },
                    )),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Router with state and middleware applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay handler, mounted for every method on every path.
async fn relay_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers.request_id();

    let response = match relay(&state, &uri).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                status = %response.status(),
                "Relaying upstream response"
            );
            response
        }
        Err(err) => {
            match &err {
                RelayError::Fetch(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Upstream fetch failed");
                }
                RelayError::UnsupportedFileType { extension } => {
                    tracing::warn!(request_id = %request_id, extension = %extension, "Extension not allowed");
                }
                RelayError::MissingUrl => {
                    tracing::warn!(request_id = %request_id, "Missing url parameter");
                }
            }
            err.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}

/// Extract the target, fetch it once, filter, and shape the response.
pub async fn relay(state: &AppState, uri: &Uri) -> Result<Response, RelayError> {
    let target = target_url(uri).ok_or(RelayError::MissingUrl)?;
    tracing::debug!(target_url = %target, "Fetching upstream");

    let upstream = state.fetcher.fetch(&target).await?;

    if let Some(filter) = &state.filter {
        if !filter.permits(&target) {
            return Err(RelayError::UnsupportedFileType {
                extension: extension_of(&target),
            });
        }
    }

    Ok(relay_response(upstream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{header, HeaderValue, StatusCode};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::upstream::UpstreamResponse;

    /// Scripted fetcher recording every target it is asked for.
    struct ScriptedFetch {
        calls: AtomicUsize,
        targets: Mutex<Vec<String>>,
        reply: fn() -> Result<UpstreamResponse, FetchError>,
    }

    impl ScriptedFetch {
        fn new(reply: fn() -> Result<UpstreamResponse, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                targets: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Fetch for ScriptedFetch {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
        ) -> BoxFuture<'a, Result<UpstreamResponse, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.targets.lock().unwrap().push(url.to_string());
            let reply = (self.reply)();
            async move { reply }.boxed()
        }
    }

    fn playlist() -> Result<UpstreamResponse, FetchError> {
        Ok(UpstreamResponse::new(StatusCode::OK, "#EXTM3U\n")
            .with_content_type(HeaderValue::from_static("application/vnd.apple.mpegurl")))
    }

    fn partial() -> Result<UpstreamResponse, FetchError> {
        Ok(UpstreamResponse::new(StatusCode::PARTIAL_CONTENT, "chunk"))
    }

    fn network_error() -> Result<UpstreamResponse, FetchError> {
        Err(FetchError::Transport("TypeError: network error".into()))
    }

    fn app(fetcher: Arc<ScriptedFetch>, enforce: bool) -> Router {
        let filter = enforce.then(|| ExtensionFilter::new(["m3u8", "ts", "mp4", "mp3"]));
        HttpServer::build_router(AppState::new(fetcher, filter))
    }

    async fn call(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_400_without_fetch() {
        let fetcher = ScriptedFetch::new(playlist);
        let res = call(app(fetcher.clone(), false), "/?foo=bar").await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(res).await, "Missing `url` query parameter.");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_pass_through_sets_cors_headers() {
        let fetcher = ScriptedFetch::new(playlist);
        let res = call(
            app(fetcher.clone(), false),
            "/?url=https%3A%2F%2Fcdn.example.com%2Fmaster.m3u8",
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let headers = res.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET,HEAD,OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert_eq!(headers[header::CONTENT_TYPE], "application/vnd.apple.mpegurl");
        assert!(headers.contains_key("x-request-id"));
        assert_eq!(body_text(res).await, "#EXTM3U\n");

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            fetcher.targets.lock().unwrap().as_slice(),
            ["https://cdn.example.com/master.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_upstream_status_propagates() {
        let res = call(app(ScriptedFetch::new(partial), false), "/?url=http://a/b.bin").await;
        assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "");
    }

    #[tokio::test]
    async fn test_method_and_path_agnostic() {
        let fetcher = ScriptedFetch::new(playlist);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/some/deep/path?url=http://a/live.m3u8")
            .body(Body::from("ignored"))
            .unwrap();
        let res = app(fetcher.clone(), false).oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_allow_list_passes_listed_extension() {
        let fetcher = ScriptedFetch::new(partial);
        let res = call(app(fetcher, true), "/?url=http://a/video.mp4").await;
        assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[tokio::test]
    async fn test_allow_list_rejects_other_extension() {
        let fetcher = ScriptedFetch::new(playlist);
        let res = call(app(fetcher.clone(), true), "/?url=http://a/file.exe").await;

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(body_text(res).await, "Unsupported file type.");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unenforced_relays_any_extension() {
        let res = call(app(ScriptedFetch::new(playlist), false), "/?url=http://a/file.exe").await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fetch_error_is_500_with_message() {
        let res = call(app(ScriptedFetch::new(network_error), true), "/?url=http://a/x.ts").await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_text(res).await,
            "Error fetching URL: TypeError: network error"
        );
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let fetcher = ScriptedFetch::new(playlist);
        let router = app(fetcher.clone(), false);

        let first = call(router.clone(), "/?url=http://a/live.m3u8").await;
        let second = call(router, "/?url=http://a/live.m3u8").await;

        assert_eq!(first.status(), second.status());
        let strip = |res: &Response| {
            let mut headers = res.headers().clone();
            headers.remove("x-request-id");
            headers
        };
        assert_eq!(strip(&first), strip(&second));
        assert_eq!(body_text(first).await, body_text(second).await);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_server_router_serves_relay_handler() {
        let server = HttpServer::new(RelayConfig::default()).unwrap();
        assert_eq!(server.config().listener.bind_address, "0.0.0.0:8080");

        let res = call(server.router(), "/?url=").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().contains_key("x-request-id"));
    }
}
