//! HTTP API server for the outpatient registration system.
//!
//! Provides REST endpoints for schedule publication and review, slot
//! booking and cancellation, the queue-call workflow, and phone
//! verification, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod verify;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use domain::{BookingService, QueueService, ScheduleService};
use metrics_exporter_prometheus::PrometheusHandle;
use registry::RegistryStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use verify::{CodeSender, TracingCodeSender, VerificationCache};

/// Shared application state accessible from all handlers.
///
/// The verification cache and code sender are injected here as
/// capabilities rather than reached through process-wide globals.
pub struct AppState<S: RegistryStore> {
    pub bookings: BookingService<S>,
    pub schedules: ScheduleService<S>,
    pub queue: QueueService<S>,
    pub store: S,
    pub verification: VerificationCache,
    pub code_sender: Arc<dyn CodeSender>,
}

/// Creates the application state with services over the given store.
pub fn create_default_state<S: RegistryStore + Clone + 'static>(
    store: S,
    verify_ttl: Duration,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        bookings: BookingService::new(store.clone()),
        schedules: ScheduleService::new(store.clone()),
        queue: QueueService::new(store.clone()),
        store,
        verification: VerificationCache::new(verify_ttl),
        code_sender: Arc::new(TracingCodeSender),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: RegistryStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/departments", post(routes::directory::create_department::<S>))
        .route("/doctors", post(routes::directory::create_doctor::<S>))
        .route("/patients", post(routes::directory::create_patient::<S>))
        .route("/schedules", post(routes::schedules::publish::<S>))
        .route("/schedules/available", get(routes::schedules::available::<S>))
        .route("/schedules/{id}", get(routes::schedules::get::<S>))
        .route("/schedules/{id}/review", post(routes::schedules::review::<S>))
        .route("/schedules/{id}/reviews", get(routes::schedules::reviews::<S>))
        .route("/schedules/{id}/call-next", post(routes::queue::call_next::<S>))
        .route("/schedules/{id}/queue", get(routes::queue::snapshot::<S>))
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings", get(routes::bookings::list::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route("/bookings/{id}/cancel", post(routes::bookings::cancel::<S>))
        .route("/bookings/{id}/complete", post(routes::queue::complete::<S>))
        .route("/bookings/{id}/missed", post(routes::queue::missed::<S>))
        .route("/bookings/{id}/events", get(routes::queue::events::<S>))
        .route("/verification", post(routes::verification::request_code::<S>))
        .route(
            "/verification/confirm",
            post(routes::verification::confirm_code::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
