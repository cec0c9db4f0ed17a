use std::sync::Arc;

use axum::{Router, routing::get};

use crate::state::State;

pub mod auth;
pub mod beds;
pub mod forecast;
pub mod records;
pub mod users;

pub async fn health_handler() -> &'static str {
    "API is running..."
}

/// Every route, without middleware. The auth routes answer both under `/api/auth`
/// and directly under `/api`, the frontend uses both.
pub fn api_routes() -> Router<Arc<State>> {
    Router::new()
        .route("/", get(health_handler))
        .nest("/api/HospitalUsers", users::routes())
        .nest("/api/auth", auth::routes())
        .route("/predict", get(forecast::predict_handler))
        .nest(
            "/api",
            auth::routes()
                .merge(records::routes())
                .merge(beds::routes())
                .route("/optimization", get(forecast::predict_handler)),
        )
}
