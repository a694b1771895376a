use std::sync::Arc;

use shared::config::{Config, StorageBackend};
use shared::repositories::game_repository::{DynamoDbGameRepository, GameRepository};
use shared::repositories::match_request_repository::{
    DynamoDbMatchRequestRepository, MatchRequestRepository,
};
use shared::repositories::memory::{
    InMemoryGameRepository, InMemoryMatchRequestRepository, InMemoryPlayerRepository,
};
use shared::repositories::player_repository::{DynamoDbPlayerRepository, PlayerRepository};
use shared::services::ai_move_service::{AiMoveService, ChatCompletionsSuggester, MoveSuggester};
use shared::services::game_session_service::GameSessionService;
use shared::services::match_request_service::MatchRequestService;
use shared::services::player_service::PlayerService;
use shared::services::presentation_service::{MessageBoard, TextBoardRenderer};
use shared::services::rating_service::RatingService;

#[derive(Clone)]
pub struct AppState {
    pub player_service: Arc<PlayerService>,
    pub game_session_service: Arc<GameSessionService>,
    pub match_request_service: Arc<MatchRequestService>,
    pub ai_move_service: Arc<AiMoveService>,
    pub message_board: Arc<MessageBoard>,
}

impl AppState {
    /// Wires the services for the configured storage backend.
    pub async fn from_config(config: &Config) -> Self {
        match &config.storage {
            StorageBackend::Memory => Self::in_memory(config),
            StorageBackend::DynamoDb(tables) => {
                let aws_config = aws_config::load_from_env().await;
                let client = aws_sdk_dynamodb::Client::new(&aws_config);
                Self::new(
                    config,
                    Arc::new(DynamoDbPlayerRepository::new(client.clone(), &tables.players)),
                    Arc::new(DynamoDbGameRepository::new(client.clone(), &tables.games)),
                    Arc::new(DynamoDbMatchRequestRepository::new(
                        client,
                        &tables.match_requests,
                    )),
                )
            }
        }
    }

    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryPlayerRepository::new()),
            Arc::new(InMemoryGameRepository::new()),
            Arc::new(InMemoryMatchRequestRepository::new()),
        )
    }

    pub fn new(
        config: &Config,
        player_repository: Arc<dyn PlayerRepository + Send + Sync>,
        game_repository: Arc<dyn GameRepository + Send + Sync>,
        match_request_repository: Arc<dyn MatchRequestRepository + Send + Sync>,
    ) -> Self {
        let suggester = config.ai.token.as_deref().map(|token| {
            Arc::new(ChatCompletionsSuggester::new(
                &config.ai.endpoint,
                token,
                config.ai.suggestion_timeout,
            )) as Arc<dyn MoveSuggester + Send + Sync>
        });

        let player_service = Arc::new(PlayerService::new(player_repository));
        let rating_service = Arc::new(RatingService::new(player_service.clone()));
        let ai_move_service = Arc::new(
            AiMoveService::new(suggester, config.ai.models.clone())
                .with_timeout(config.ai.suggestion_timeout),
        );
        let message_board = Arc::new(MessageBoard::new());

        let game_session_service = Arc::new(GameSessionService::new(
            game_repository,
            player_service.clone(),
            rating_service,
            ai_move_service.clone(),
            message_board.clone(),
            Arc::new(TextBoardRenderer::new()),
            config.response_timeout,
        ));
        let match_request_service = Arc::new(MatchRequestService::new(
            match_request_repository,
            player_service.clone(),
            game_session_service.clone(),
            message_board.clone(),
            config.response_timeout,
        ));

        AppState {
            player_service,
            game_session_service,
            match_request_service,
            ai_move_service,
            message_board,
        }
    }
}
