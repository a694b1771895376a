use crate::models::game::GameStatus;
use crate::models::player::PlayerIdentity;
use crate::repositories::errors::game_repository_errors::GameRepositoryError;
use crate::services::errors::chess_service_errors::ChessServiceError;
use crate::services::errors::player_service_errors::PlayerServiceError;
use crate::services::errors::presentation_errors::PresentationError;

#[derive(Debug)]
pub enum GameSessionServiceError {
    NoActiveGame,
    NotYourTurn,
    IllegalMove(String),
    /// The game had already reached this terminal status; it has now been settled.
    GameOver(GameStatus),
    AlreadyInGame(PlayerIdentity),
    UnknownModel(String),
    /// Stored state breaks an invariant, e.g. two active games for one player.
    InconsistentState(String),
    /// The position changed underneath this move.
    ConcurrentUpdate,
    PlayerError(PlayerServiceError),
    RepositoryError(GameRepositoryError),
    PresentationError(PresentationError),
}

impl std::fmt::Display for GameSessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionServiceError::NoActiveGame => write!(f, "You are not in a game"),
            GameSessionServiceError::NotYourTurn => write!(f, "It is not your turn"),
            GameSessionServiceError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
            GameSessionServiceError::GameOver(status) => {
                write!(f, "The game is already over: {}", status)
            }
            GameSessionServiceError::AlreadyInGame(player) => {
                write!(f, "{} is already in a game", player.mention())
            }
            GameSessionServiceError::UnknownModel(model) => write!(f, "Unknown AI model: {}", model),
            GameSessionServiceError::InconsistentState(msg) => {
                write!(f, "Inconsistent game state: {}", msg)
            }
            GameSessionServiceError::ConcurrentUpdate => {
                write!(f, "The game changed while the move was being applied")
            }
            GameSessionServiceError::PlayerError(err) => write!(f, "Player error: {}", err),
            GameSessionServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            GameSessionServiceError::PresentationError(err) => {
                write!(f, "Presentation error: {}", err)
            }
        }
    }
}

impl std::error::Error for GameSessionServiceError {}

impl From<GameRepositoryError> for GameSessionServiceError {
    fn from(err: GameRepositoryError) -> Self {
        GameSessionServiceError::RepositoryError(err)
    }
}

impl From<PlayerServiceError> for GameSessionServiceError {
    fn from(err: PlayerServiceError) -> Self {
        GameSessionServiceError::PlayerError(err)
    }
}

impl From<PresentationError> for GameSessionServiceError {
    fn from(err: PresentationError) -> Self {
        GameSessionServiceError::PresentationError(err)
    }
}

impl From<ChessServiceError> for GameSessionServiceError {
    fn from(err: ChessServiceError) -> Self {
        match err {
            ChessServiceError::InvalidPosition(msg) => {
                GameSessionServiceError::InconsistentState(msg)
            }
            ChessServiceError::IllegalMove(mv) => GameSessionServiceError::IllegalMove(mv),
            ChessServiceError::InvalidSquare(square) => {
                GameSessionServiceError::IllegalMove(format!("invalid square '{}'", square))
            }
            ChessServiceError::InvalidPromotion(piece) => {
                GameSessionServiceError::IllegalMove(format!("invalid promotion piece '{}'", piece))
            }
        }
    }
}
