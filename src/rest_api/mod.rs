//! REST API module for external integrations
//!
//! Provides a read-only HTTP API exposing health, metrics and the resolved
//! IDs of NodeTemplates.

mod dto;
mod handlers;
mod server;

pub use dto::{CacheInvalidatedResponse, ErrorResponse, HealthResponse, ResolvedIdsResponse};
pub use server::{router, run_server, ApiState};
