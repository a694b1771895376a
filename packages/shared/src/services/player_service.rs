use std::sync::Arc;
use tracing::{debug, info};

use crate::models::player::{LeaderboardEntry, Player, PlayerIdentity};
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::player_repository::PlayerRepository;
use crate::services::errors::player_service_errors::PlayerServiceError;

/// Single writer of player ratings and current-game references.
pub struct PlayerService {
    repository: Arc<dyn PlayerRepository + Send + Sync>,
}

impl PlayerService {
    pub fn new(repository: Arc<dyn PlayerRepository + Send + Sync>) -> Self {
        PlayerService { repository }
    }

    /// The only path that creates player records. Profile fields, when given, replace the
    /// stored ones.
    pub async fn get_or_create(
        &self,
        identity: &PlayerIdentity,
        display_name: Option<String>,
        avatar: Option<String>,
    ) -> Result<Player, PlayerServiceError> {
        if let Some(mut player) = self.repository.get_player(identity).await? {
            let name_changed = display_name.is_some() && display_name != player.display_name;
            let avatar_changed = avatar.is_some() && avatar != player.avatar;
            if name_changed || avatar_changed {
                self.repository
                    .update_profile(identity, display_name.clone(), avatar.clone())
                    .await?;
                if name_changed {
                    player.display_name = display_name;
                }
                if avatar_changed {
                    player.avatar = avatar;
                }
            }
            return Ok(player);
        }

        let player = Player::new(identity.clone()).with_profile(display_name, avatar);
        if self.repository.create_player_if_absent(&player).await? {
            info!(player = %identity, "Created player record");
            return Ok(player);
        }

        // Lost a creation race; the other writer's record wins.
        self.get_player(identity).await
    }

    pub async fn get_player(&self, identity: &PlayerIdentity) -> Result<Player, PlayerServiceError> {
        self.repository
            .get_player(identity)
            .await?
            .ok_or_else(|| PlayerServiceError::PlayerNotFound(identity.to_string()))
    }

    pub async fn find_player(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<Player>, PlayerServiceError> {
        Ok(self.repository.get_player(identity).await?)
    }

    /// Points a free player at `game_id`. Returns false if the player already has a game.
    pub async fn claim_current_game(
        &self,
        identity: &PlayerIdentity,
        game_id: &str,
    ) -> Result<bool, PlayerServiceError> {
        let claimed = self
            .repository
            .compare_and_set_current_game(identity, None, Some(game_id.to_string()))
            .await?;
        debug!(player = %identity, game_id, claimed, "Claim current game");
        Ok(claimed)
    }

    /// Clears the reference only while it still points at `game_id`.
    pub async fn release_current_game(
        &self,
        identity: &PlayerIdentity,
        game_id: &str,
    ) -> Result<bool, PlayerServiceError> {
        let released = self
            .repository
            .compare_and_set_current_game(identity, Some(game_id.to_string()), None)
            .await?;
        debug!(player = %identity, game_id, released, "Release current game");
        Ok(released)
    }

    pub async fn set_current_game(
        &self,
        identity: &PlayerIdentity,
        game_id: Option<String>,
    ) -> Result<(), PlayerServiceError> {
        self.repository
            .set_current_game(identity, game_id)
            .await
            .map_err(|e| match e {
                PlayerRepositoryError::NotFound => {
                    PlayerServiceError::PlayerNotFound(identity.to_string())
                }
                other => other.into(),
            })
    }

    /// Persists a rating rounded to two decimals and returns the stored value.
    pub async fn adjust_rating(
        &self,
        identity: &PlayerIdentity,
        new_rating: f64,
    ) -> Result<f64, PlayerServiceError> {
        let rounded = round_rating(new_rating);
        self.repository
            .update_rating(identity, rounded)
            .await
            .map_err(|e| match e {
                PlayerRepositoryError::NotFound => {
                    PlayerServiceError::PlayerNotFound(identity.to_string())
                }
                other => other.into(),
            })?;
        Ok(rounded)
    }

    /// All players, highest rating first.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, PlayerServiceError> {
        let mut players = self.repository.list_players().await?;
        players.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(players.iter().map(Player::leaderboard_entry).collect())
    }
}

pub fn round_rating(rating: f64) -> f64 {
    (rating * 100.0).round() / 100.0
}
