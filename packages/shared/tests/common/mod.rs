use std::sync::Arc;
use std::time::Duration;

use shared::models::game::MessageRef;
use shared::models::interaction::{Interaction, PromptChoice};
use shared::models::match_request::MatchRequest;
use shared::models::moves::MoveRequest;
use shared::models::player::PlayerIdentity;
use shared::repositories::match_request_repository::MatchRequestRepository;
use shared::repositories::memory::{
    InMemoryGameRepository, InMemoryMatchRequestRepository, InMemoryPlayerRepository,
};
use shared::services::ai_move_service::{AiMoveService, MoveSuggester};
use shared::services::game_session_service::{GameSessionService, MoveOutcome};
use shared::services::match_request_service::MatchRequestService;
use shared::services::player_service::PlayerService;
use shared::services::presentation_service::{MessageBoard, TextBoardRenderer};
use shared::services::rating_service::RatingService;
use shared::services::response_broker::Delivery;

pub const CHANNEL: &str = "general";
pub const WINDOW: Duration = Duration::from_secs(60);

/// Every service wired against in-memory storage and the in-process message board.
pub struct Harness {
    pub players: Arc<PlayerService>,
    pub games: Arc<InMemoryGameRepository>,
    pub requests: Arc<InMemoryMatchRequestRepository>,
    pub board: Arc<MessageBoard>,
    pub sessions: Arc<GameSessionService>,
    pub matches: Arc<MatchRequestService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_suggester(None)
    }

    pub fn with_suggester(suggester: Option<Arc<dyn MoveSuggester + Send + Sync>>) -> Self {
        let players = Arc::new(PlayerService::new(Arc::new(InMemoryPlayerRepository::new())));
        let games = Arc::new(InMemoryGameRepository::new());
        let requests = Arc::new(InMemoryMatchRequestRepository::new());
        let board = Arc::new(MessageBoard::new());
        let ai = Arc::new(AiMoveService::new(suggester, vec!["Phi-4".to_string()]));

        let sessions = Arc::new(GameSessionService::new(
            games.clone(),
            players.clone(),
            Arc::new(RatingService::new(players.clone())),
            ai,
            board.clone(),
            Arc::new(TextBoardRenderer::new()),
            WINDOW,
        ));
        let matches = Arc::new(MatchRequestService::new(
            requests.clone(),
            players.clone(),
            sessions.clone(),
            board.clone(),
            WINDOW,
        ));

        Harness {
            players,
            games,
            requests,
            board,
            sessions,
            matches,
        }
    }

    /// Creates player records, as a first interaction would.
    pub async fn register(&self, ids: &[&str]) {
        for id in ids {
            self.players
                .get_or_create(&human(id), None, None)
                .await
                .expect("player registration failed");
        }
    }

    /// Presses a button on the most recent prompt in the channel, once one has been posted.
    pub async fn answer_prompt(&self, user: &str, choice: PromptChoice) -> Delivery {
        loop {
            let prompt = self
                .board
                .messages(CHANNEL)
                .await
                .into_iter()
                .rev()
                .find(|m| !m.choices.is_empty());
            if let Some(prompt) = prompt {
                return self.respond_to(&prompt.reference, user, choice).await;
            }
            tokio::task::yield_now().await;
        }
    }

    pub async fn respond_to(&self, prompt: &MessageRef, user: &str, choice: PromptChoice) -> Delivery {
        self.board
            .respond(&Interaction {
                message_id: prompt.message_id.clone(),
                user: human(user),
                choice,
            })
            .await
    }

    pub async fn play(&self, moves: &[(&str, &str)]) -> MoveOutcome {
        let mut last = None;
        for (player, uci) in moves {
            let request = MoveRequest::from_uci(uci).expect("bad test move");
            let outcome = self
                .sessions
                .submit_move(&human(player), &request)
                .await
                .unwrap_or_else(|e| panic!("{} {} failed: {}", player, uci, e));
            last = Some(outcome);
        }
        last.expect("no moves played")
    }

    /// Outstanding requests touching any of the given players.
    pub async fn requests_for(&self, ids: &[&str]) -> Vec<MatchRequest> {
        let mut found = Vec::new();
        for id in ids {
            if let Some(request) = self
                .requests
                .find_for_player(&human(id))
                .await
                .expect("request lookup failed")
            {
                found.push(request);
            }
        }
        found
    }
}

pub fn human(id: &str) -> PlayerIdentity {
    PlayerIdentity::human(id)
}
