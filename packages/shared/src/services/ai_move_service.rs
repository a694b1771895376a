use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::moves::{LegalMove, MoveRequest};
use crate::services::errors::ai_move_service_errors::AiMoveServiceError;

#[cfg(test)]
use mockall::automock;

const SYSTEM_PROMPT: &str = "You are a chess grandmaster. You are given a chess position in FEN \
and the list of legal moves. Reply with the best move in json format: \
{\"from\": \"e2\", \"to\": \"e4\", \"promotion\": \"q\"}. Only include promotion when a pawn \
reaches the last rank.";

pub const DEFAULT_SUGGESTION_TIMEOUT: Duration = Duration::from_secs(20);

/// Outcome of reading a suggestion. The random fallback is applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMove {
    Parsed(MoveRequest),
    Unparseable,
}

/// Reads a structured move directly, or from the first fenced code block.
pub fn parse_suggestion(raw: &str) -> ParsedMove {
    if let Ok(request) = serde_json::from_str::<MoveRequest>(raw.trim()) {
        return ParsedMove::Parsed(request);
    }
    match fenced_block(raw).map(|block| serde_json::from_str::<MoveRequest>(block.trim())) {
        Some(Ok(request)) => ParsedMove::Parsed(request),
        _ => ParsedMove::Unparseable,
    }
}

/// Body of the first ``` fence, without its language tag.
fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")? + 3;
    let rest = &raw[start..];
    let body_start = rest.find('\n').map_or(0, |newline| {
        let tag = rest[..newline].trim();
        if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            newline + 1
        } else {
            0
        }
    });
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// An external source of move suggestions. Returns the raw text of the reply.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MoveSuggester: Send + Sync {
    async fn suggest_move(
        &self,
        fen: &str,
        legal_moves: &[LegalMove],
        model: &str,
    ) -> Result<String, AiMoveServiceError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    model: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for an OpenAI-compatible inference endpoint.
pub struct ChatCompletionsSuggester {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl ChatCompletionsSuggester {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not build HTTP client with a timeout, using defaults");
                reqwest::Client::new()
            });
        ChatCompletionsSuggester {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl MoveSuggester for ChatCompletionsSuggester {
    async fn suggest_move(
        &self,
        fen: &str,
        legal_moves: &[LegalMove],
        model: &str,
    ) -> Result<String, AiMoveServiceError> {
        let moves = serde_json::to_string(legal_moves)
            .map_err(|e| AiMoveServiceError::MalformedResponse(e.to_string()))?;
        let body = ChatCompletionRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("FEN: {}\n Moves: {}", fen, moves),
                },
            ],
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 1000,
            model,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiMoveServiceError::Status(response.status().as_u16()));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiMoveServiceError::MalformedResponse("no choices".to_string()))
    }
}

/// Picks moves for AI identities. Never fails while a legal move exists.
pub struct AiMoveService {
    suggester: Option<Arc<dyn MoveSuggester + Send + Sync>>,
    models: Vec<String>,
    timeout: Duration,
}

impl AiMoveService {
    pub fn new(suggester: Option<Arc<dyn MoveSuggester + Send + Sync>>, models: Vec<String>) -> Self {
        AiMoveService {
            suggester,
            models,
            timeout: DEFAULT_SUGGESTION_TIMEOUT,
        }
    }

    /// Caps how long a single suggestion may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Returns a member of `legal_moves`; `None` only when it is empty.
    pub async fn choose_move(
        &self,
        fen: &str,
        legal_moves: &[LegalMove],
        model: &str,
    ) -> Option<LegalMove> {
        if legal_moves.is_empty() {
            return None;
        }

        if let Some(suggester) = &self.suggester {
            let suggestion =
                tokio::time::timeout(self.timeout, suggester.suggest_move(fen, legal_moves, model))
                    .await;
            match suggestion {
                Err(_) => warn!(model, timeout = ?self.timeout, "Suggestion timed out, choosing randomly"),
                Ok(Err(e)) => warn!(model, error = %e, "Suggestion source failed, choosing randomly"),
                Ok(Ok(raw)) => match parse_suggestion(&raw) {
                    ParsedMove::Parsed(request) => {
                        if let Some(mv) = legal_moves.iter().find(|mv| mv.matches(&request)) {
                            debug!(model, mv = %mv.uci(), "Using suggested move");
                            return Some(mv.clone());
                        }
                        warn!(model, ?request, "Suggested move is not legal, choosing randomly");
                    }
                    ParsedMove::Unparseable => {
                        warn!(model, "Unparseable suggestion, choosing randomly");
                    }
                },
            }
        }

        legal_moves.choose(&mut rand::thread_rng()).cloned()
    }
}
