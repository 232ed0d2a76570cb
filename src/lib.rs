pub mod api;
pub mod collector;
pub mod columns;
pub mod config;
pub mod domain;
pub mod error;
pub mod geo;
pub mod hits;
pub mod query;
pub mod request;
pub mod state;
pub mod store;
pub mod tracker;
pub mod ua;
pub mod visit;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        // Write side; GET routes answer HEAD too
        .route(
            "/collect",
            get(collector::collect).fallback(collector::method_not_allowed),
        )
        .route("/cache", get(collector::cache))
        // Read side
        .route("/api/stats", get(api::stats))
        .route("/api/breakdown/{column}", get(api::breakdown))
        .route("/api/timeseries", get(api::timeseries))
        .route("/api/sites", get(api::sites))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
