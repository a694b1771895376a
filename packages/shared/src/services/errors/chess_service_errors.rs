#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChessServiceError {
    InvalidPosition(String),
    InvalidSquare(String),
    InvalidPromotion(String),
    IllegalMove(String),
}

impl std::fmt::Display for ChessServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChessServiceError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            ChessServiceError::InvalidSquare(square) => write!(f, "Invalid square: {}", square),
            ChessServiceError::InvalidPromotion(piece) => {
                write!(f, "Invalid promotion piece: {}", piece)
            }
            ChessServiceError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
        }
    }
}

impl std::error::Error for ChessServiceError {}
