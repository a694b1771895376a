use crate::models::player::PlayerIdentity;
use crate::repositories::errors::match_request_repository_errors::MatchRequestRepositoryError;
use crate::services::errors::game_session_service_errors::GameSessionServiceError;
use crate::services::errors::player_service_errors::PlayerServiceError;
use crate::services::errors::presentation_errors::PresentationError;

#[derive(Debug)]
pub enum MatchRequestServiceError {
    AlreadyInGame(PlayerIdentity),
    /// One of the players already appears in an outstanding request.
    DuplicatePending,
    UnknownRecipient(PlayerIdentity),
    InvalidOpponent(String),
    PlayerError(PlayerServiceError),
    RepositoryError(MatchRequestRepositoryError),
    PresentationError(PresentationError),
    GameSessionError(GameSessionServiceError),
}

impl std::fmt::Display for MatchRequestServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRequestServiceError::AlreadyInGame(player) => {
                write!(f, "{} is already in a game", player.mention())
            }
            MatchRequestServiceError::DuplicatePending => {
                write!(f, "There is already a pending match request")
            }
            MatchRequestServiceError::UnknownRecipient(player) => {
                write!(f, "{} has not played yet", player.mention())
            }
            MatchRequestServiceError::InvalidOpponent(msg) => write!(f, "Invalid opponent: {}", msg),
            MatchRequestServiceError::PlayerError(err) => write!(f, "Player error: {}", err),
            MatchRequestServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            MatchRequestServiceError::PresentationError(err) => {
                write!(f, "Presentation error: {}", err)
            }
            MatchRequestServiceError::GameSessionError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for MatchRequestServiceError {}

impl From<MatchRequestRepositoryError> for MatchRequestServiceError {
    fn from(err: MatchRequestRepositoryError) -> Self {
        MatchRequestServiceError::RepositoryError(err)
    }
}

impl From<PlayerServiceError> for MatchRequestServiceError {
    fn from(err: PlayerServiceError) -> Self {
        MatchRequestServiceError::PlayerError(err)
    }
}

impl From<PresentationError> for MatchRequestServiceError {
    fn from(err: PresentationError) -> Self {
        MatchRequestServiceError::PresentationError(err)
    }
}

impl From<GameSessionServiceError> for MatchRequestServiceError {
    fn from(err: GameSessionServiceError) -> Self {
        match err {
            GameSessionServiceError::AlreadyInGame(player) => {
                MatchRequestServiceError::AlreadyInGame(player)
            }
            other => MatchRequestServiceError::GameSessionError(other),
        }
    }
}
