//! Conference ticket ordering service.
//!
//! Wires the order and seat inventory aggregates to the order process manager
//! through an explicit [`Application`] context, consumes integration events,
//! and exposes the whole over HTTP with structured logging (tracing) and
//! Prometheus metrics.

pub mod application;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::CommandScheduler;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use application::{AppError, Application};
pub use config::Config;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(app: Arc<Application<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + Clone + 'static,
    C: CommandScheduler + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/orders", post(routes::orders::place::<S, C>))
        .route("/orders/{id}", get(routes::orders::get::<S, C>))
        .route("/orders/{id}/expire", post(routes::orders::expire::<S, C>))
        .route("/orders/{id}/events", get(routes::orders::events::<S, C>))
        .route(
            "/conferences/{id}/seats",
            get(routes::conferences::seats::<S, C>),
        )
        .route(
            "/integration/conference-created",
            post(routes::integration::conference_created::<S, C>),
        )
        .route(
            "/integration/payment-received",
            post(routes::integration::payment_received::<S, C>),
        )
        .with_state(app)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
