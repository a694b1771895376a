#[derive(Debug)]
pub enum AiMoveServiceError {
    Http(String),
    Status(u16),
    MalformedResponse(String),
}

impl std::fmt::Display for AiMoveServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiMoveServiceError::Http(msg) => write!(f, "HTTP error: {}", msg),
            AiMoveServiceError::Status(code) => {
                write!(f, "Suggestion source responded with status {}", code)
            }
            AiMoveServiceError::MalformedResponse(msg) => {
                write!(f, "Malformed suggestion response: {}", msg)
            }
        }
    }
}

impl std::error::Error for AiMoveServiceError {}

impl From<reqwest::Error> for AiMoveServiceError {
    fn from(error: reqwest::Error) -> Self {
        AiMoveServiceError::Http(error.to_string())
    }
}
