use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::game::MessageRef;
use crate::models::player::PlayerIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptChoice {
    Accept,
    Decline,
}

/// A button press on a prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub message_id: String,
    pub user: PlayerIdentity,
    pub choice: PromptChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<PromptChoice>,
    /// Who may answer the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<PlayerIdentity>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        OutgoingMessage {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Adds accept and decline buttons that only `responder` may press.
    pub fn with_prompt(mut self, responder: &PlayerIdentity) -> Self {
        self.choices = vec![PromptChoice::Accept, PromptChoice::Decline];
        self.responder = Some(responder.clone());
        self
    }
}

/// A message as it currently stands on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub reference: MessageRef,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<PromptChoice>,
    pub posted_at: DateTime<Utc>,
    pub edited: bool,
}
