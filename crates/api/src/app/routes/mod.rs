use axum::{
    routing::{get, post},
    Router,
};

pub mod common;
pub mod events;
pub mod payments;
pub mod purchase;
pub mod reservations;
pub mod system;
pub mod tickets;

/// Router for all service endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/purchase", post(purchase::purchase))
        .nest("/events", events::router())
        .nest("/reservations", reservations::router())
        .nest("/tickets", tickets::router())
        .nest("/payments", payments::router())
        .route("/users/:id/tickets", get(tickets::tickets_for_user))
}
