//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/gateway wiring (in-memory or Postgres) and the
//!   background expiry worker
//! - `routes/`: HTTP routes + handlers, one file per surface
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: ApiConfig) -> Router {
    let services = Arc::new(services::build_services(&config).await);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
