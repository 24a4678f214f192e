//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, ServerConfig};
use crate::error::{Result, ServerError};
use crate::metrics::SharedRegistry;

/// Content type of the exposition body.
pub const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Delay before announcing that the endpoint is up.
const LISTENING_DELAY: Duration = Duration::from_secs(1);

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    registry: SharedRegistry,
    metrics_path: Arc<str>,
}

/// Normalize a metrics path to a leading `/` and no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}

/// Create the HTTP router.
pub fn create_router(registry: SharedRegistry, config: &ServerConfig) -> Router {
    let metrics_path = normalize_path(&config.path);
    let state = AppState {
        registry,
        metrics_path: Arc::from(metrics_path.as_str()),
    };

    let mut router = Router::new().route(&metrics_path, get(metrics_handler));
    if metrics_path != "/" {
        router = router.route(&format!("{metrics_path}/"), get(metrics_handler));
    }

    if config.auth.enabled {
        let auth = Arc::new(config.auth.clone());
        router = router.route_layer(middleware::from_fn_with_state(auth, require_secret));
    }

    let router = router.fallback(redirect_handler).with_state(state);

    if config.log_requests {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Handler for the metrics path.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.registry.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Every other path goes to the metrics path.
async fn redirect_handler(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.metrics_path)
}

/// Reject requests that do not present the shared secret.
async fn require_secret(
    State(auth): State<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(auth.header.as_str())
        .and_then(|v| v.to_str().ok())
        .and_then(|v| presented_key(v, &auth.scheme))
        .is_some_and(|key| constant_time_eq(key.as_bytes(), auth.secret_key.as_bytes()));

    if authorized {
        next.run(request).await
    } else {
        debug!(uri = %request.uri(), "Rejected unauthenticated metrics request");
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Strip `"<scheme> "` (case-insensitive) from a header value.
fn presented_key<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    if scheme.is_empty() {
        return Some(value.trim());
    }
    let prefix = value.get(..scheme.len())?;
    if !prefix.eq_ignore_ascii_case(scheme) {
        return None;
    }
    value[scheme.len()..].strip_prefix(' ').map(str::trim)
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// HTTP server configuration.
pub struct HttpServer {
    config: ServerConfig,
    registry: SharedRegistry,
}

impl HttpServer {
    pub fn new(config: ServerConfig, registry: SharedRegistry) -> Self {
        Self { config, registry }
    }

    /// Bind the listening socket.
    pub async fn bind(self) -> Result<BoundHttpServer> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServerError::Http)?;

        debug!(addr = %local_addr, "HTTP listener bound");

        Ok(BoundHttpServer {
            listener,
            local_addr,
            router: create_router(self.registry, &self.config),
            metrics_path: normalize_path(&self.config.path),
        })
    }

    /// Bind, then serve until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        self.bind().await?.serve(token).await
    }
}

/// An HTTP server with its socket bound.
pub struct BoundHttpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    metrics_path: String,
}

impl BoundHttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until `token` is cancelled, then drain in-flight
    /// requests and return.
    pub async fn serve(self, token: CancellationToken) -> Result<()> {
        let BoundHttpServer {
            listener,
            local_addr,
            router,
            metrics_path,
        } = self;

        let announce = async {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(LISTENING_DELAY) => {
                    info!(addr = %local_addr, path = %metrics_path, "knxmetrics listening");
                }
            }
        };

        let shutdown = token.clone();
        let serve = async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown.cancelled().await;
                    debug!("HTTP server shutting down");
                })
                .await
        };

        let (result, ()) = tokio::join!(serve, announce);
        result.map_err(ServerError::Http)?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_registry() -> SharedRegistry {
        let mut registry = MetricRegistry::new();
        let gauge = registry.gauge("room_temp", "Room temperature");
        gauge.record(21.5, &vec![("room".to_string(), "kitchen".to_string())]);
        Arc::new(registry)
    }

    fn auth_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.auth.enabled = true;
        config.auth.secret_key = "s3cret".to_string();
        config
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/metrics"), "/metrics");
        assert_eq!(normalize_path("metrics/"), "/metrics");
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_presented_key() {
        assert_eq!(presented_key("Bearer s3cret", "Bearer"), Some("s3cret"));
        assert_eq!(presented_key("bearer  s3cret ", "Bearer"), Some("s3cret"));
        assert_eq!(presented_key("Basic s3cret", "Bearer"), None);
        assert_eq!(presented_key("Bearers3cret", "Bearer"), None);
        assert_eq!(presented_key("s3cret", ""), Some("s3cret"));
        assert_eq!(presented_key("Bear", "Bearer"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(constant_time_eq(b"", b""));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let router = create_router(make_registry(), &ServerConfig::default());

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert_eq!(content_type.to_str().unwrap(), OPENMETRICS_CONTENT_TYPE);

        let body = body_string(response).await;
        assert!(body.contains("room_temp{room=\"kitchen\"} 21.5"), "{body}");
    }

    #[tokio::test]
    async fn test_trailing_slash_serves_metrics() {
        let router = create_router(make_registry(), &ServerConfig::default());

        let response = router
            .oneshot(Request::get("/metrics/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_other_paths_redirect() {
        let router = create_router(make_registry(), &ServerConfig::default());

        for path in ["/", "/health", "/metrics/extra"] {
            let response = router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
            assert_eq!(response.headers().get("location").unwrap(), "/metrics");
        }
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let config = ServerConfig {
            path: "prometheus/metrics/".to_string(),
            ..ServerConfig::default()
        };
        let router = create_router(make_registry(), &config);

        let response = router
            .clone()
            .oneshot(
                Request::get("/prometheus/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Default path redirects to the custom one
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/prometheus/metrics"
        );
    }

    #[tokio::test]
    async fn test_auth_rejects_missing_or_wrong_secret() {
        let router = create_router(make_registry(), &auth_config());

        let response = router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::get("/metrics")
                    .header("Authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_accepts_secret() {
        let router = create_router(make_registry(), &auth_config());

        let response = router
            .oneshot(
                Request::get("/metrics")
                    .header("Authorization", "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_custom_header_without_scheme() {
        let mut config = auth_config();
        config.auth.header = "X-Api-Key".to_string();
        config.auth.scheme = String::new();
        let router = create_router(make_registry(), &config);

        let response = router
            .oneshot(
                Request::get("/metrics")
                    .header("x-api-key", " s3cret ")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            port: taken.local_addr().unwrap().port(),
            ..ServerConfig::default()
        };

        let result = HttpServer::new(config, make_registry()).bind().await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let config = ServerConfig::default();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound = BoundHttpServer {
            local_addr: listener.local_addr().unwrap(),
            listener,
            router: create_router(make_registry(), &config),
            metrics_path: normalize_path(&config.path),
        };

        let token = CancellationToken::new();
        let handle = tokio::spawn(bound.serve(token.clone()));
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
