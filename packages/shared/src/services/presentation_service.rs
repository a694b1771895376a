use async_trait::async_trait;
use chess::{Color, File, Piece, Rank, Square};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::game::MessageRef;
use crate::models::interaction::{
    Attachment, Interaction, OutgoingMessage, PostedMessage, PromptChoice,
};
use crate::models::player::PlayerIdentity;
use crate::services::chess_service::Position;
use crate::services::errors::presentation_errors::PresentationError;
use crate::services::response_broker::{Delivery, ResponseBroker};

#[cfg(test)]
use mockall::automock;

/// Outbound side of the chat transport.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Presenter: Send + Sync {
    /// A message with a responder accepts answers from the moment it is posted.
    async fn post_message(
        &self,
        channel: &str,
        message: OutgoingMessage,
    ) -> Result<MessageRef, PresentationError>;

    async fn edit_message(
        &self,
        message: &MessageRef,
        update: OutgoingMessage,
    ) -> Result<(), PresentationError>;

    async fn delete_message(&self, message: &MessageRef) -> Result<(), PresentationError>;

    /// Waits for `responder` to press a button on `prompt`. `Ok(None)` when the window elapses.
    async fn await_response(
        &self,
        prompt: &MessageRef,
        responder: &PlayerIdentity,
        timeout: Duration,
    ) -> Result<Option<PromptChoice>, PresentationError>;
}

/// Pure function of the position.
#[cfg_attr(test, automock)]
pub trait BoardRenderer: Send + Sync {
    fn render(&self, position: &Position) -> Result<Attachment, PresentationError>;
}

/// Draws the board as a fixed-width diagram, white at the bottom.
#[derive(Clone, Default)]
pub struct TextBoardRenderer;

impl TextBoardRenderer {
    pub fn new() -> Self {
        TextBoardRenderer
    }
}

impl BoardRenderer for TextBoardRenderer {
    fn render(&self, position: &Position) -> Result<Attachment, PresentationError> {
        let board = position.board();
        let mut diagram = String::new();

        for rank_index in (0..8).rev() {
            diagram.push_str(&format!("{} ", rank_index + 1));
            for file_index in 0..8 {
                let square = Square::make_square(
                    Rank::from_index(rank_index),
                    File::from_index(file_index),
                );
                let symbol = match (board.piece_on(square), board.color_on(square)) {
                    (Some(piece), Some(color)) => piece_symbol(piece, color),
                    _ => '.',
                };
                diagram.push(symbol);
                if file_index < 7 {
                    diagram.push(' ');
                }
            }
            diagram.push('\n');
        }
        diagram.push_str("  a b c d e f g h\n");

        Ok(Attachment {
            file_name: "board.txt".to_string(),
            content_type: "text/plain; charset=utf-8".to_string(),
            data: diagram.into_bytes(),
        })
    }
}

fn piece_symbol(piece: Piece, color: Color) -> char {
    let symbol = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    match color {
        Color::White => symbol.to_ascii_uppercase(),
        Color::Black => symbol,
    }
}

pub const DEFAULT_CHANNEL_HISTORY: usize = 200;

/// In-process stand-in for the chat transport: channels of messages plus a rendezvous for
/// button presses. Each channel keeps its most recent `history` messages.
pub struct MessageBoard {
    channels: RwLock<HashMap<String, VecDeque<PostedMessage>>>,
    broker: ResponseBroker,
    history: usize,
}

impl Default for MessageBoard {
    fn default() -> Self {
        Self::with_history(DEFAULT_CHANNEL_HISTORY)
    }
}

impl MessageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        MessageBoard {
            channels: RwLock::new(HashMap::new()),
            broker: ResponseBroker::new(),
            history: history.max(1),
        }
    }

    /// Messages on a channel, oldest first.
    pub async fn messages(&self, channel: &str) -> Vec<PostedMessage> {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Routes a button press to whoever is waiting on that prompt.
    pub async fn respond(&self, interaction: &Interaction) -> Delivery {
        self.broker
            .deliver(&interaction.message_id, &interaction.user, interaction.choice)
            .await
    }

    pub async fn is_awaiting(&self, message_id: &str) -> bool {
        self.broker.is_pending(message_id).await
    }
}

#[async_trait]
impl Presenter for MessageBoard {
    async fn post_message(
        &self,
        channel: &str,
        message: OutgoingMessage,
    ) -> Result<MessageRef, PresentationError> {
        let reference = MessageRef {
            channel: channel.to_string(),
            message_id: Uuid::new_v4().to_string(),
        };
        // Open for answers before anyone can see the message.
        if let Some(responder) = &message.responder {
            self.broker.register(&reference.message_id, responder).await;
        }

        let mut channels = self.channels.write().await;
        let messages = channels.entry(channel.to_string()).or_default();
        messages.push_back(PostedMessage {
            reference: reference.clone(),
            content: message.content,
            attachment: message.attachment,
            choices: message.choices,
            posted_at: Utc::now(),
            edited: false,
        });
        while messages.len() > self.history {
            messages.pop_front();
        }
        Ok(reference)
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        update: OutgoingMessage,
    ) -> Result<(), PresentationError> {
        let mut channels = self.channels.write().await;
        let posted = channels
            .get_mut(&message.channel)
            .and_then(|messages| messages.iter_mut().find(|m| &m.reference == message))
            .ok_or_else(|| PresentationError::MessageNotFound(message.message_id.clone()))?;

        posted.content = update.content;
        posted.attachment = update.attachment;
        posted.choices = update.choices;
        posted.edited = true;
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), PresentationError> {
        self.broker.forget(&message.message_id).await;
        let mut channels = self.channels.write().await;
        let messages = channels
            .get_mut(&message.channel)
            .ok_or_else(|| PresentationError::MessageNotFound(message.message_id.clone()))?;
        let before = messages.len();
        messages.retain(|m| &m.reference != message);
        if messages.len() == before {
            return Err(PresentationError::MessageNotFound(message.message_id.clone()));
        }
        Ok(())
    }

    async fn await_response(
        &self,
        prompt: &MessageRef,
        responder: &PlayerIdentity,
        timeout: Duration,
    ) -> Result<Option<PromptChoice>, PresentationError> {
        Ok(self
            .broker
            .await_response(&prompt.message_id, responder, timeout)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::moves::MoveRequest;
    use std::sync::Arc;

    #[test]
    fn test_text_renderer_starting_position() {
        let attachment = TextBoardRenderer::new()
            .render(&Position::starting())
            .unwrap();
        let text = String::from_utf8(attachment.data).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "8 r n b q k b n r");
        assert_eq!(lines[7], "1 R N B Q K B N R");
        assert_eq!(lines[8], "  a b c d e f g h");
    }

    #[test]
    fn test_text_renderer_reflects_moves() {
        let (position, _) = Position::starting()
            .apply_move(&MoveRequest::new("e2", "e4"))
            .unwrap();
        let attachment = TextBoardRenderer::new().render(&position).unwrap();
        let text = String::from_utf8(attachment.data).unwrap();

        assert!(text.contains("4 . . . . P . . ."));
        assert!(text.contains("2 P P P P . P P P"));
    }

    #[tokio::test]
    async fn test_message_board_post_edit_delete() {
        let board = MessageBoard::new();

        let reference = board
            .post_message("c1", OutgoingMessage::text("hello"))
            .await
            .unwrap();
        board
            .edit_message(&reference, OutgoingMessage::text("edited"))
            .await
            .unwrap();

        let messages = board.messages("c1").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "edited");
        assert!(messages[0].edited);

        board.delete_message(&reference).await.unwrap();
        assert!(board.messages("c1").await.is_empty());
        assert!(matches!(
            board.delete_message(&reference).await,
            Err(PresentationError::MessageNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_board_routes_interactions() {
        let board = Arc::new(MessageBoard::new());
        let prompt = board
            .post_message(
                "c1",
                OutgoingMessage::text("Accept?").with_prompt(&PlayerIdentity::human("2")),
            )
            .await
            .unwrap();

        let waiter = {
            let board = board.clone();
            let prompt = prompt.clone();
            tokio::spawn(async move {
                board
                    .await_response(&prompt, &PlayerIdentity::human("2"), Duration::from_secs(60))
                    .await
            })
        };
        let delivery = board
            .respond(&Interaction {
                message_id: prompt.message_id.clone(),
                user: PlayerIdentity::human("2"),
                choice: PromptChoice::Accept,
            })
            .await;

        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(waiter.await.unwrap().unwrap(), Some(PromptChoice::Accept));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_answered_before_waiting() {
        let board = MessageBoard::new();
        let prompt = board
            .post_message(
                "c1",
                OutgoingMessage::text("Accept?").with_prompt(&PlayerIdentity::human("2")),
            )
            .await
            .unwrap();

        let delivery = board
            .respond(&Interaction {
                message_id: prompt.message_id.clone(),
                user: PlayerIdentity::human("2"),
                choice: PromptChoice::Decline,
            })
            .await;

        assert_eq!(delivery, Delivery::Delivered);
        let choice = board
            .await_response(&prompt, &PlayerIdentity::human("2"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(choice, Some(PromptChoice::Decline));
    }

    #[tokio::test]
    async fn test_channel_keeps_recent_history() {
        let board = MessageBoard::with_history(3);
        for n in 0..5 {
            board
                .post_message("c1", OutgoingMessage::text(format!("notice {}", n)))
                .await
                .unwrap();
        }

        let contents: Vec<String> = board
            .messages("c1")
            .await
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["notice 2", "notice 3", "notice 4"]);
    }
}
