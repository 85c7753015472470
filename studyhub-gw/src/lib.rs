//! studyhub-gw library - external task orchestration gateway
//!
//! Delegates document ingestion, search and plan/task generation to the
//! external processing service and correlates its asynchronous results with
//! the sessions that requested them.

use axum::Router;
use chrono::{DateTime, Utc};
use studyhub_common::config::GatewayConfig;
use studyhub_common::events::EventBus;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod sessions;
pub mod upstream;

pub use error::{ApiError, ApiResult};

use sessions::SessionStore;
use upstream::{RetryPolicy, UpstreamClient, UpstreamError};

/// Event bus capacity; slow SSE subscribers past this lag and skip events
const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Client on the fallback-chain base (search, generation, revision)
    pub upstream: UpstreamClient,
    /// Client on the strict `EXTERNAL_API_URL` base (document upload)
    pub document_upstream: UpstreamClient,
    /// Session correlator and plan/task state
    pub sessions: SessionStore,
    /// Event bus feeding the SSE endpoint
    pub event_bus: EventBus,
    /// Retry policy for task generation
    pub retry: RetryPolicy,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build state from configuration; upstream bases are resolved once here
    pub fn new(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let timeout = config.upstream.timeout();
        let upstream = UpstreamClient::new(config.upstream.resolved_base(), timeout)?;
        let document_upstream =
            UpstreamClient::new(config.upstream.strict_base(), timeout)?;

        Ok(Self::with_clients(
            upstream,
            document_upstream,
            RetryPolicy::from(&config.retry),
        ))
    }

    /// Build state around existing clients
    pub fn with_clients(
        upstream: UpstreamClient,
        document_upstream: UpstreamClient,
        retry: RetryPolicy,
    ) -> Self {
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        Self {
            upstream,
            document_upstream,
            sessions: SessionStore::new(event_bus.clone()),
            event_bus,
            retry,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::document_routes())
        .merge(api::search_routes())
        .merge(api::task_routes())
        .merge(api::chat_routes())
        .merge(api::plan_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
