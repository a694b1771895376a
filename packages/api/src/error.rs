use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use shared::services::errors::{
    game_session_service_errors::GameSessionServiceError,
    match_request_service_errors::MatchRequestServiceError,
    player_service_errors::PlayerServiceError,
};

const GENERIC_FAILURE: &str = "Something went wrong, please try again";

#[derive(Debug)]
pub enum ApiError {
    GameSession(GameSessionServiceError),
    MatchRequest(MatchRequestServiceError),
    Player(PlayerServiceError),
    BadRequest(String),
    Unauthorized,
}

impl From<GameSessionServiceError> for ApiError {
    fn from(error: GameSessionServiceError) -> Self {
        ApiError::GameSession(error)
    }
}

impl From<MatchRequestServiceError> for ApiError {
    fn from(error: MatchRequestServiceError) -> Self {
        ApiError::MatchRequest(error)
    }
}

impl From<PlayerServiceError> for ApiError {
    fn from(error: PlayerServiceError) -> Self {
        ApiError::Player(error)
    }
}

fn player_status(error: &PlayerServiceError) -> StatusCode {
    match error {
        PlayerServiceError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
        PlayerServiceError::RepositoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn game_session_status(error: &GameSessionServiceError) -> StatusCode {
    match error {
        GameSessionServiceError::NoActiveGame => StatusCode::NOT_FOUND,
        GameSessionServiceError::IllegalMove(_) | GameSessionServiceError::UnknownModel(_) => {
            StatusCode::BAD_REQUEST
        }
        GameSessionServiceError::NotYourTurn
        | GameSessionServiceError::GameOver(_)
        | GameSessionServiceError::AlreadyInGame(_)
        | GameSessionServiceError::ConcurrentUpdate => StatusCode::CONFLICT,
        GameSessionServiceError::PlayerError(e) => player_status(e),
        GameSessionServiceError::InconsistentState(_)
        | GameSessionServiceError::RepositoryError(_)
        | GameSessionServiceError::PresentationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn match_request_status(error: &MatchRequestServiceError) -> StatusCode {
    match error {
        MatchRequestServiceError::AlreadyInGame(_) | MatchRequestServiceError::DuplicatePending => {
            StatusCode::CONFLICT
        }
        MatchRequestServiceError::UnknownRecipient(_) => StatusCode::NOT_FOUND,
        MatchRequestServiceError::InvalidOpponent(_) => StatusCode::BAD_REQUEST,
        MatchRequestServiceError::PlayerError(e) => player_status(e),
        MatchRequestServiceError::GameSessionError(e) => game_session_status(e),
        MatchRequestServiceError::RepositoryError(_)
        | MatchRequestServiceError::PresentationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::GameSession(e) => game_session_status(e),
            ApiError::MatchRequest(e) => match_request_status(e),
            ApiError::Player(e) => player_status(e),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::GameSession(e) => e.to_string(),
            ApiError::MatchRequest(e) => e.to_string(),
            ApiError::Player(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Unauthorized => "Missing or invalid x-user-id header".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self.message(), "Request failed");
            GENERIC_FAILURE.to_string()
        } else {
            self.message()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::player::PlayerIdentity;

    #[test]
    fn test_user_errors_are_client_errors() {
        let cases = [
            (ApiError::from(GameSessionServiceError::NoActiveGame), StatusCode::NOT_FOUND),
            (ApiError::from(GameSessionServiceError::NotYourTurn), StatusCode::CONFLICT),
            (
                ApiError::from(GameSessionServiceError::IllegalMove("e2e5".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(MatchRequestServiceError::DuplicatePending),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(MatchRequestServiceError::UnknownRecipient(
                    PlayerIdentity::human("9"),
                )),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(MatchRequestServiceError::GameSessionError(
                    GameSessionServiceError::GameOver(shared::models::game::GameStatus::Draw),
                )),
                StatusCode::CONFLICT,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_inconsistent_state_is_hidden() {
        let error = ApiError::from(GameSessionServiceError::InconsistentState(
            "human:1 has 2 active games".to_string(),
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
