use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{error::ApiError, middleware::identity::Caller, state::AppState};
use shared::models::game::Game;
use shared::models::moves::{group_by_piece, LegalMove, MoveRequest, PieceKind};
use shared::services::game_session_service::{DrawOffer, GameView, MoveOutcome};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/games/ai", post(start_ai_game))
        .route("/games/current", get(current_game))
        .route(
            "/games/current/moves",
            get(legal_moves).post(submit_move),
        )
        .route("/games/current/resign", post(resign))
        .route("/games/current/draw", post(offer_draw))
}

#[derive(Debug, Deserialize)]
pub struct AiGameRequest {
    pub model: String,
    pub channel: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovesQuery {
    pub from: Option<String>,
    #[serde(default)]
    pub grouped: bool,
}

/// Moves of one piece on one square, for the pick-a-piece-then-a-move flow.
#[derive(Debug, Serialize)]
pub struct PieceMoves {
    pub piece: PieceKind,
    pub from: String,
    pub moves: Vec<LegalMove>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MovesResponse {
    Flat(Vec<LegalMove>),
    Grouped(Vec<PieceMoves>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawOffered {
    pub prompt_id: String,
}

async fn start_ai_game(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<AiGameRequest>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    let game = state
        .game_session_service
        .start_ai_game(&caller.identity, &payload.model, &payload.channel)
        .await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn current_game(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<GameView>, ApiError> {
    Ok(Json(
        state.game_session_service.show_game(&caller.identity).await?,
    ))
}

async fn legal_moves(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<MovesQuery>,
) -> Result<Json<MovesResponse>, ApiError> {
    let moves = state
        .game_session_service
        .legal_moves_for(&caller.identity, query.from.as_deref())
        .await?;

    if !query.grouped {
        return Ok(Json(MovesResponse::Flat(moves)));
    }
    let grouped = group_by_piece(&moves)
        .into_iter()
        .map(|((piece, from), moves)| PieceMoves { piece, from, moves })
        .collect();
    Ok(Json(MovesResponse::Grouped(grouped)))
}

async fn submit_move(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<MoveRequest>,
) -> Result<Json<MoveOutcome>, ApiError> {
    Ok(Json(
        state
            .game_session_service
            .submit_move(&caller.identity, &payload)
            .await?,
    ))
}

async fn resign(State(state): State<AppState>, caller: Caller) -> Result<Json<Game>, ApiError> {
    Ok(Json(state.game_session_service.resign(&caller.identity).await?))
}

/// Settles at once against an AI, otherwise waits for the opponent in the background.
async fn offer_draw(State(state): State<AppState>, caller: Caller) -> Result<Response, ApiError> {
    match state.game_session_service.offer_draw(&caller.identity).await? {
        DrawOffer::Settled(game) => Ok((StatusCode::OK, Json(game)).into_response()),
        DrawOffer::Pending(offer) => {
            let offered = DrawOffered {
                prompt_id: offer.prompt.message_id.clone(),
            };
            let service = state.game_session_service.clone();
            tokio::spawn(async move {
                let game_id = offer.game.game_id.clone();
                match service.resolve_draw_offer(offer).await {
                    Ok(outcome) => info!(game_id, ?outcome, "Draw offer resolved"),
                    Err(e) => error!(game_id, error = %e, "Draw offer resolution failed"),
                }
            });
            Ok((StatusCode::ACCEPTED, Json(offered)).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{app, test_support::*};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_ai_game_over_http() {
        let app = app(test_state());

        let (status, body) = send(
            &app,
            "POST",
            "/games/ai",
            Some("1"),
            Some(json!({ "model": "Phi-4", "channel": "general" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["player2"], "ai:Phi-4");

        let (status, body) = send(
            &app,
            "GET",
            "/games/current/moves?grouped=true",
            Some("1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 10);

        let (status, body) = send(
            &app,
            "GET",
            "/games/current/moves?from=e2",
            Some("1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            "POST",
            "/games/current/moves",
            Some("1"),
            Some(json!({ "from": "e2", "to": "e5" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Illegal move"));

        let (status, body) = send(
            &app,
            "POST",
            "/games/current/moves",
            Some("1"),
            Some(json!({ "from": "e2", "to": "e4" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["played"]["to"], "e4");
        assert_eq!(body["reply"]["color"], "black");

        let (status, body) = send(&app, "POST", "/games/current/draw", Some("1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "draw");
    }

    #[tokio::test]
    async fn test_resign_without_game() {
        let app = app(test_state());
        let (status, body) = send(&app, "POST", "/games/current/resign", Some("1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "You are not in a game");
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let app = app(test_state());
        let (status, _) = send(
            &app,
            "POST",
            "/games/ai",
            Some("1"),
            Some(json!({ "model": "gpt-9", "channel": "general" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
