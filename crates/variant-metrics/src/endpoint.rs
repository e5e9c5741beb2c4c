//! The /metrics HTTP endpoint
//!
//! Serves the controller's own Prometheus registry over axum, optionally
//! guarded by basic auth. Credentials are compared as SHA-256 digests so the
//! comparison does not leak length or prefix information.

use crate::Result;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use base64::Engine;
use prometheus::{Encoder, Registry, TextEncoder};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Expected credentials for the metrics endpoint, stored as digests.
#[derive(Debug, Clone)]
pub struct BasicAuthGuard {
    username_hash: [u8; 32],
    password_hash: [u8; 32],
}

impl BasicAuthGuard {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username_hash: Sha256::digest(username.as_bytes()).into(),
            password_hash: Sha256::digest(password.as_bytes()).into(),
        }
    }

    /// Check an `Authorization` header value against the expected
    /// credentials.
    fn authorizes(&self, header_value: &str) -> bool {
        let encoded = match header_value.strip_prefix("Basic ") {
            Some(rest) => rest,
            None => return false,
        };
        let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let decoded = match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(_) => return false,
        };
        let (username, password) = match decoded.split_once(':') {
            Some(pair) => pair,
            None => return false,
        };
        let username_hash: [u8; 32] = Sha256::digest(username.as_bytes()).into();
        let password_hash: [u8; 32] = Sha256::digest(password.as_bytes()).into();
        username_hash == self.username_hash && password_hash == self.password_hash
    }
}

/// Build the metrics router for the given registry.
pub fn metrics_router(registry: Arc<Registry>, auth: Option<BasicAuthGuard>) -> Router {
    let router = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(registry);

    match auth {
        Some(guard) => router.layer(middleware::from_fn_with_state(
            Arc::new(guard),
            basic_auth_middleware,
        )),
        None => router,
    }
}

/// Bind and serve the metrics endpoint until the task is dropped.
pub async fn serve_metrics(
    bind_addr: SocketAddr,
    registry: Arc<Registry>,
    auth: Option<BasicAuthGuard>,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = metrics_router(registry, auth);
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Serving controller metrics on {}", bind_addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("metrics server error: {}", e);
        }
    });
    Ok(handle)
}

async fn basic_auth_middleware(
    State(guard): State<Arc<BasicAuthGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| guard.authorizes(value))
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            [(
                header::WWW_AUTHENTICATE,
                "Basic realm=\"restricted\", charset=\"UTF-8\"",
            )],
            "Unauthorized",
        )
            .into_response();
    }
    next.run(request).await
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => match String::from_utf8(buffer) {
            Ok(text) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                text,
            )
                .into_response(),
            Err(e) => {
                warn!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
            }
        },
        Err(e) => {
            warn!("Failed to encode Prometheus metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
