//! Process-local repositories with the same conditional semantics as the DynamoDB ones.
//! Every operation takes the map lock once, so each call is atomic on its own.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::game::{Game, GameStatus, MessageRef};
use crate::models::match_request::MatchRequest;
use crate::models::player::{Player, PlayerIdentity};
use crate::repositories::errors::game_repository_errors::GameRepositoryError;
use crate::repositories::errors::match_request_repository_errors::MatchRequestRepositoryError;
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::game_repository::GameRepository;
use crate::repositories::match_request_repository::MatchRequestRepository;
use crate::repositories::player_repository::PlayerRepository;

#[derive(Default)]
pub struct InMemoryPlayerRepository {
    players: RwLock<HashMap<PlayerIdentity, Player>>,
}

impl InMemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerRepository for InMemoryPlayerRepository {
    async fn get_player(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<Player>, PlayerRepositoryError> {
        Ok(self.players.read().await.get(identity).cloned())
    }

    async fn create_player_if_absent(
        &self,
        player: &Player,
    ) -> Result<bool, PlayerRepositoryError> {
        let mut players = self.players.write().await;
        if players.contains_key(&player.identity) {
            return Ok(false);
        }
        players.insert(player.identity.clone(), player.clone());
        Ok(true)
    }

    async fn update_profile(
        &self,
        identity: &PlayerIdentity,
        display_name: Option<String>,
        avatar: Option<String>,
    ) -> Result<(), PlayerRepositoryError> {
        let mut players = self.players.write().await;
        let player = players
            .get_mut(identity)
            .ok_or(PlayerRepositoryError::NotFound)?;
        if display_name.is_some() {
            player.display_name = display_name;
        }
        if avatar.is_some() {
            player.avatar = avatar;
        }
        Ok(())
    }

    async fn update_rating(
        &self,
        identity: &PlayerIdentity,
        rating: f64,
    ) -> Result<(), PlayerRepositoryError> {
        let mut players = self.players.write().await;
        let player = players
            .get_mut(identity)
            .ok_or(PlayerRepositoryError::NotFound)?;
        player.rating = rating;
        Ok(())
    }

    async fn compare_and_set_current_game(
        &self,
        identity: &PlayerIdentity,
        expected: Option<String>,
        new: Option<String>,
    ) -> Result<bool, PlayerRepositoryError> {
        let mut players = self.players.write().await;
        match players.get_mut(identity) {
            Some(player) if player.current_game == expected => {
                player.current_game = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_current_game(
        &self,
        identity: &PlayerIdentity,
        game_id: Option<String>,
    ) -> Result<(), PlayerRepositoryError> {
        let mut players = self.players.write().await;
        let player = players
            .get_mut(identity)
            .ok_or(PlayerRepositoryError::NotFound)?;
        player.current_game = game_id;
        Ok(())
    }

    async fn list_players(&self) -> Result<Vec<Player>, PlayerRepositoryError> {
        Ok(self.players.read().await.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryGameRepository {
    games: RwLock<HashMap<String, Game>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored game, active or not.
    pub async fn all_games(&self) -> Vec<Game> {
        self.games.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.game_id) {
            return Err(GameRepositoryError::DynamoDb(format!(
                "Game {} already exists",
                game.game_id
            )));
        }
        games.insert(game.game_id.clone(), game.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, GameRepositoryError> {
        Ok(self.games.read().await.get(game_id).cloned())
    }

    async fn find_active_games(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<Game>, GameRepositoryError> {
        Ok(self
            .games
            .read()
            .await
            .values()
            .filter(|game| game.is_active() && game.involves(player))
            .cloned()
            .collect())
    }

    async fn find_games_for_player(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<Game>, GameRepositoryError> {
        Ok(self
            .games
            .read()
            .await
            .values()
            .filter(|game| game.involves(player))
            .cloned()
            .collect())
    }

    async fn update_position(
        &self,
        game: &Game,
        expected_fen: &str,
    ) -> Result<bool, GameRepositoryError> {
        let mut games = self.games.write().await;
        match games.get_mut(&game.game_id) {
            Some(stored) if stored.is_active() && stored.fen == expected_fen => {
                *stored = game.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_board_message(
        &self,
        game_id: &str,
        message: &MessageRef,
    ) -> Result<(), GameRepositoryError> {
        let mut games = self.games.write().await;
        let game = games.get_mut(game_id).ok_or(GameRepositoryError::NotFound)?;
        game.board_message = Some(message.clone());
        Ok(())
    }

    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        winner: Option<PlayerIdentity>,
    ) -> Result<bool, GameRepositoryError> {
        let mut games = self.games.write().await;
        match games.get_mut(game_id) {
            Some(game) if game.is_active() => {
                game.status = status;
                game.winner = winner;
                game.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Keyed by participant, like the DynamoDB table.
#[derive(Default)]
pub struct InMemoryMatchRequestRepository {
    slots: RwLock<HashMap<PlayerIdentity, MatchRequest>>,
}

impl InMemoryMatchRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchRequestRepository for InMemoryMatchRequestRepository {
    async fn create_if_players_free(
        &self,
        request: &MatchRequest,
    ) -> Result<bool, MatchRequestRepositoryError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&request.requester) || slots.contains_key(&request.recipient) {
            return Ok(false);
        }
        slots.insert(request.requester.clone(), request.clone());
        slots.insert(request.recipient.clone(), request.clone());
        Ok(true)
    }

    async fn find_for_player(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Option<MatchRequest>, MatchRequestRepositoryError> {
        Ok(self.slots.read().await.get(player).cloned())
    }

    async fn delete_request(
        &self,
        request: &MatchRequest,
    ) -> Result<bool, MatchRequestRepositoryError> {
        let mut slots = self.slots.write().await;
        let owns = |player: &PlayerIdentity| {
            slots
                .get(player)
                .map_or(false, |slot| slot.request_id == request.request_id)
        };
        if !owns(&request.requester) || !owns(&request.recipient) {
            return Ok(false);
        }
        slots.remove(&request.requester);
        slots.remove(&request.recipient);
        Ok(true)
    }

    async fn list_requests(&self) -> Result<Vec<MatchRequest>, MatchRequestRepositoryError> {
        let slots = self.slots.read().await;
        let mut requests: Vec<MatchRequest> = Vec::new();
        for request in slots.values() {
            if !requests.iter().any(|r| r.request_id == request.request_id) {
                requests.push(request.clone());
            }
        }
        requests.sort_by_key(|request| request.created_at);
        Ok(requests)
    }
}
