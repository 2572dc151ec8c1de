//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::controller::TemplateStore;
use crate::providers::{SecurityGroupProvider, SelectorCache, SubnetProvider};
use crate::{Error, Result};

use super::handlers;

/// Shared state for the REST handlers
pub struct ApiState {
    pub store: Arc<dyn TemplateStore>,
    pub subnets: Arc<SubnetProvider>,
    pub security_groups: Arc<SecurityGroupProvider>,
    /// Cache shared with the providers and the controller
    pub cache: Arc<SelectorCache>,
}

/// Metrics endpoint handler
async fn metrics_handler() -> std::result::Result<String, StatusCode> {
    use prometheus_client::encoding::text::encode;
    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(buffer)
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/nodetemplates/{name}/subnets",
            get(handlers::list_subnet_ids),
        )
        .route(
            "/api/v1/nodetemplates/{name}/securitygroups",
            get(handlers::list_security_group_ids),
        )
        .route("/api/v1/cache/invalidate", post(handlers::invalidate_cache))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Run the REST API server
pub async fn run_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<()> {
    let app = router(state);

    info!("REST API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
