use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;

#[derive(Debug)]
pub enum PlayerServiceError {
    PlayerNotFound(String),
    RepositoryError(String),
}

impl std::fmt::Display for PlayerServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerServiceError::PlayerNotFound(player) => write!(f, "Player not found: {}", player),
            PlayerServiceError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for PlayerServiceError {}

impl From<PlayerRepositoryError> for PlayerServiceError {
    fn from(error: PlayerRepositoryError) -> Self {
        PlayerServiceError::RepositoryError(error.to_string())
    }
}
