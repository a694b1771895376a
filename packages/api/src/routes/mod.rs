use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod challenges;
pub mod games;
pub mod health;
pub mod interactions;
pub mod players;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(challenges::routes())
        .merge(games::routes())
        .merge(players::routes())
        .merge(interactions::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
