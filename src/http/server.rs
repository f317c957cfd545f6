//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with one route per configured endpoint
//! - Wire up middleware (origin check, security headers, timeout, request ID, tracing)
//! - Run every endpoint request through the validation pipeline
//! - Bind server to a plain or TLS listener
//! - Sweep idle rate-limit keys in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, on, MethodFilter},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GuardConfig;
use crate::http::handlers::{self, SanitizedPayload};
use crate::http::request::{InboundRequest, X_REQUEST_ID};
use crate::http::response::{forbidden_origin, rejection_response};
use crate::lifecycle::shutdown::{recv_shutdown, Shutdown};
use crate::observability::metrics;
use crate::security::manager::SecurityManager;
use crate::security::rules::EndpointPolicy;
use crate::security::validator::{Rejection, RequestValidator};

/// Bounds for the limiter sweep interval.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Time allowed for in-flight TLS connections after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// State of one mounted endpoint.
#[derive(Clone)]
struct EndpointState {
    name: Arc<str>,
    policy: Arc<EndpointPolicy>,
    validator: Arc<RequestValidator>,
}

/// HTTP server for the request guard.
pub struct GuardServer {
    router: Router,
    validator: Arc<RequestValidator>,
    sweep_interval: Duration,
    config: GuardConfig,
}

impl GuardServer {
    /// Create a new server; endpoint policies come from `config`, security
    /// settings from the resolved `manager`.
    pub fn new(config: GuardConfig, manager: Arc<SecurityManager>) -> Self {
        let validator = Arc::new(RequestValidator::new(manager.config()));

        let sweep_interval = config
            .endpoints
            .values()
            .filter_map(|policy| validator.effective_rate_limit(policy))
            .map(|limit| limit.window())
            .min()
            .unwrap_or(MAX_SWEEP_INTERVAL)
            .clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);

        let router = Self::build_router(&config, manager, validator.clone());
        Self {
            router,
            validator,
            sweep_interval,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, manager: Arc<SecurityManager>, validator: Arc<RequestValidator>) -> Router {
        let mut router = Router::new().route("/health", get(handlers::health));

        for (name, policy) in &config.endpoints {
            let Some(filter) = method_filter(&policy.methods) else {
                tracing::warn!(endpoint = %name, methods = ?policy.methods, "Endpoint has no usable methods, skipping");
                continue;
            };
            let state = EndpointState {
                name: Arc::from(name.as_str()),
                policy: Arc::new(policy.clone()),
                validator: validator.clone(),
            };
            let path = format!("/api/{}", name);
            tracing::debug!(path = %path, methods = ?policy.methods, "Mounting endpoint");
            router = router.route(
                &path,
                on(filter, handlers::accept).route_layer(middleware::from_fn_with_state(state, validate_endpoint)),
            );
        }

        router = router.layer(middleware::from_fn_with_state(manager.clone(), enforce_origin));
        router = router.layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)));

        for (name, value) in manager.security_headers() {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    router = router.layer(SetResponseHeaderLayer::overriding(name, value));
                }
                _ => tracing::warn!(header = %name, "Invalid security header, not attached"),
            }
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn validator(&self) -> &Arc<RequestValidator> {
        &self.validator
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.config.endpoints.len(),
            "HTTP server starting"
        );

        let sweeper = spawn_sweeper(self.validator.clone(), self.sweep_interval, shutdown.subscribe());
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(recv_shutdown(shutdown.subscribe()))
            .await?;

        let _ = sweeper.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(self, addr: SocketAddr, tls: RustlsConfig, shutdown: Shutdown) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let sweeper = spawn_sweeper(self.validator.clone(), self.sweep_interval, shutdown.subscribe());

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = rx.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        let _ = sweeper.await;
        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

fn method_filter(methods: &[String]) -> Option<MethodFilter> {
    methods
        .iter()
        .filter_map(|m| m.parse::<Method>().ok())
        .filter_map(|m| MethodFilter::try_from(m).ok())
        .reduce(MethodFilter::or)
}

/// Reject requests whose `Origin` is not allow-listed.
async fn enforce_origin(State(manager): State<Arc<SecurityManager>>, request: Request, next: Next) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|origin| manager.validate_origin(origin))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(
                origin = ?origin,
                path = %request.uri().path(),
                "Rejected request from disallowed origin"
            );
            return forbidden_origin();
        }
    }
    next.run(request).await
}

/// Collect the body, validate the request, and hand the sanitized payload on.
async fn validate_endpoint(State(endpoint): State<EndpointState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let (mut parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    // Collection only fails on the size limit or a broken connection; the
    // latter never sees the response anyway.
    let (bytes, too_large) = match axum::body::to_bytes(body, endpoint.validator.max_request_size()).await {
        Ok(bytes) => (bytes, false),
        Err(_) => (Bytes::new(), true),
    };

    let mut inbound = InboundRequest::from_parts(
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers.clone(),
        bytes.clone(),
        peer,
    );
    inbound.body_too_large = too_large;

    let outcome = endpoint.validator.validate_request(&inbound, &endpoint.policy);

    match outcome.rejection {
        Some(rejection) => {
            if rejection == Rejection::RateLimited {
                metrics::record_rate_limited(&endpoint.name);
            }
            metrics::record_request(&endpoint.name, rejection.as_str(), start);
            rejection_response(&outcome)
        }
        None => {
            parts.extensions.insert(SanitizedPayload {
                endpoint: endpoint.name.clone(),
                data: outcome.sanitized_data.unwrap_or_default(),
            });
            let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
            metrics::record_request(&endpoint.name, "accepted", start);
            response
        }
    }
}

/// Periodically drop idle limiter keys until shutdown.
fn spawn_sweeper(
    validator: Arc<RequestValidator>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = validator.limiter().sweep();
                    let remaining = validator.limiter().len();
                    metrics::set_rate_limit_keys(remaining);
                    if removed > 0 {
                        tracing::debug!(removed, remaining, "Swept idle rate-limit keys");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SecurityConfig;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server() -> GuardServer {
        let manager = SecurityManager::from_config(SecurityConfig::default(), |_| None).unwrap();
        GuardServer::new(GuardConfig::default(), Arc::new(manager))
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_has_security_headers() {
        let response = server()
            .router()
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(response.headers().contains_key("content-security-policy"));
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_calculator_accepts_sanitized_payload() {
        let response = server()
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/calculator",
                json!({"amount": "100.123456789", "currency": "USD"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["endpoint"], "calculator");
        assert_eq!(body["data"]["amount"], json!(100.12345679));
    }

    #[tokio::test]
    async fn test_invalid_fields_are_rejected() {
        let response = server()
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/calculator",
                json!({"amount": "100.123456789", "currency": "usd"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        assert!(response.headers().contains_key("strict-transport-security"));
        let body = body_json(response).await;
        assert_eq!(body["error"], "Request validation failed");
        assert_eq!(body["details"], json!(["currency format is invalid"]));
    }

    #[tokio::test]
    async fn test_method_not_mounted() {
        let response = server()
            .router()
            .oneshot(axum::http::Request::builder().uri("/api/contact").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
    }

    #[tokio::test]
    async fn test_disallowed_origin() {
        let mut request = json_request(Method::POST, "/api/calculator", json!({"amount": 1, "currency": "BTC"}));
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://evil.example"));

        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 403);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_allowed_origin() {
        let mut request = json_request(Method::POST, "/api/calculator", json!({"amount": 1, "currency": "BTC"}));
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://timevault.app"));

        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let mut config = SecurityConfig::default();
        config.max_request_size = 64;
        let manager = Arc::new(SecurityManager::from_config(config, |_| None).unwrap());
        let server = GuardServer::new(GuardConfig::default(), manager);

        let response = server
            .router()
            .oneshot(json_request(
                Method::POST,
                "/api/contact",
                json!({"message": "x".repeat(256)}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), 413);
        let body = body_json(response).await;
        assert_eq!(body["details"], json!(["Request body too large"]));
    }

    #[tokio::test]
    async fn test_rate_limit_over_router() {
        let server = server();
        // contact allows 3 requests per 15 minutes
        for _ in 0..3 {
            let response = server
                .router()
                .oneshot(json_request(Method::POST, "/api/contact", json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), 400);
        }

        let response = server
            .router()
            .oneshot(json_request(Method::POST, "/api/contact", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), 429);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(server.validator().limiter().len(), 1);
    }

    #[test]
    fn test_method_filter() {
        assert!(method_filter(&["GET".to_string(), "POST".to_string()]).is_some());
        assert!(method_filter(&["BAD METHOD".to_string()]).is_none());
        assert!(method_filter(&[]).is_none());
    }
}
