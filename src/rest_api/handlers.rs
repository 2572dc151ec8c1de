//! HTTP handlers for the REST API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, instrument, warn};

use crate::error::Error;
use crate::providers::Provider;

use super::dto::{CacheInvalidatedResponse, ErrorResponse, HealthResponse, ResolvedIdsResponse};
use super::server::ApiState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Resolved subnet IDs for a NodeTemplate
#[instrument(skip(state), fields(name = %name))]
pub async fn list_subnet_ids(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> ApiResult<ResolvedIdsResponse> {
    resolved_ids(&state, state.subnets.as_ref(), name).await
}

/// Resolved security group IDs for a NodeTemplate
#[instrument(skip(state), fields(name = %name))]
pub async fn list_security_group_ids(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> ApiResult<ResolvedIdsResponse> {
    resolved_ids(&state, state.security_groups.as_ref(), name).await
}

/// Drop every cached selector resolution so the next lookups hit the inventory API
#[instrument(skip(state))]
pub async fn invalidate_cache(
    State(state): State<Arc<ApiState>>,
) -> Json<CacheInvalidatedResponse> {
    let evicted = state.cache.entry_count();
    state.cache.invalidate_all();
    info!("Selector cache invalidated, {} entries dropped", evicted);
    Json(CacheInvalidatedResponse { evicted })
}

async fn resolved_ids(
    state: &ApiState,
    provider: &dyn Provider,
    name: String,
) -> ApiResult<ResolvedIdsResponse> {
    let template = match state.store.get(&name).await {
        Ok(Some(template)) => template,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    "not_found",
                    &format!("NodeTemplate {} not found", name),
                )),
            ))
        }
        Err(e) => return Err(error_response(e)),
    };

    let ids = provider.list_ids(&template).await.map_err(error_response)?;
    Ok(Json(ResolvedIdsResponse {
        total: ids.len(),
        name,
        resource: provider.kind().to_string(),
        ids,
    }))
}

fn error_response(e: Error) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &e {
        Error::Selector(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_selector"),
        Error::Cloud(_) => (StatusCode::SERVICE_UNAVAILABLE, "cloud_unavailable"),
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    if status.is_server_error() {
        error!("Failed to resolve IDs: {}", e);
    } else {
        warn!("Rejected request: {}", e);
    }
    (status, Json(ErrorResponse::new(code, &e.to_string())))
}
