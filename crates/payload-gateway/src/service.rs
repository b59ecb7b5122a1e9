//! Gateway service: wires the encryption layer into an axum router.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::{EncryptionLayer, EncryptionMetrics, PolicyEngine, ResolvedSession};
use axum::{
    extract::{Extension, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Encryption gateway service
pub struct GatewayService {
    config: GatewayConfig,
    engine: Arc<PolicyEngine>,
    metrics: Arc<EncryptionMetrics>,
}

impl GatewayService {
    /// Create a new service; fails if the configuration is invalid.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let engine = Arc::new(PolicyEngine::from_config(&config.encryption)?);
        Ok(Self::with_engine(config, engine))
    }

    /// Create a service around an existing engine
    pub fn with_engine(config: GatewayConfig, engine: Arc<PolicyEngine>) -> Self {
        Self {
            config,
            engine,
            metrics: Arc::new(EncryptionMetrics::new()),
        }
    }

    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<EncryptionMetrics> {
        &self.metrics
    }

    /// Encryption layer sharing this service's engine and metrics
    pub fn layer(&self) -> EncryptionLayer {
        EncryptionLayer::new(Arc::clone(&self.engine), Arc::clone(&self.metrics))
    }

    /// Wrap an application router with the encryption layer
    pub fn wrap(&self, app: Router) -> Router {
        app.layer(self.layer())
    }

    /// Demo application: health, metrics and an echo endpoint
    pub fn build_router(&self) -> Router {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/echo", post(echo_handler))
            .with_state(Arc::clone(&self.metrics));
        self.wrap(app)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.server.addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;

        info!(addr = %addr, "Payload gateway listening");

        axum::serve(
            listener,
            self.build_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("Payload gateway stopped");
        Ok(())
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(metrics): State<Arc<EncryptionMetrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.to_prometheus(),
    )
}

async fn echo_handler(
    session: Option<Extension<ResolvedSession>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let source = session.map(|Extension(s)| s.source.as_str()).unwrap_or("none");
    Json(json!({
        "echo": body,
        "session": source,
    }))
}
