#[derive(Debug)]
pub enum MatchRequestRepositoryError {
    Serialization(String),
    DynamoDb(String),
    TransactionError(String),
}

impl std::fmt::Display for MatchRequestRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRequestRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            MatchRequestRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            MatchRequestRepositoryError::TransactionError(msg) => {
                write!(f, "Transaction error: {}", msg)
            }
        }
    }
}

impl std::error::Error for MatchRequestRepositoryError {}
