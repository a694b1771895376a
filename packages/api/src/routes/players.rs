use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{error::ApiError, state::AppState};
use shared::models::game::GameSummary;
use shared::models::player::{LeaderboardEntry, PlayerIdentity, PlayerStats};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/players/{id}", get(player_stats))
        .route("/players/{id}/history", get(player_history))
        .route("/leaderboard", get(leaderboard))
        .route("/ai/models", get(ai_models))
}

async fn player_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerStats>, ApiError> {
    let stats = state
        .game_session_service
        .player_stats(&PlayerIdentity::human(id))
        .await?;
    Ok(Json(stats))
}

async fn player_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GameSummary>>, ApiError> {
    let history = state
        .game_session_service
        .history(&PlayerIdentity::human(id))
        .await?;
    Ok(Json(history))
}

async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(state.player_service.leaderboard().await?))
}

async fn ai_models(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.ai_move_service.models().to_vec())
}
