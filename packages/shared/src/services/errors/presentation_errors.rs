#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    MessageNotFound(String),
    Rendering(String),
    Transport(String),
}

impl std::fmt::Display for PresentationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresentationError::MessageNotFound(id) => write!(f, "Message not found: {}", id),
            PresentationError::Rendering(msg) => write!(f, "Rendering error: {}", msg),
            PresentationError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for PresentationError {}
