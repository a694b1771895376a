use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::Utc;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};
use std::collections::HashMap;

use crate::models::game::{Game, GameStatus, MessageRef};
use crate::models::player::PlayerIdentity;
use crate::repositories::errors::game_repository_errors::GameRepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError>;

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, GameRepositoryError>;

    /// Every active game the player takes part in. More than one is a consistency error
    /// the caller has to surface.
    async fn find_active_games(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<Game>, GameRepositoryError>;

    async fn find_games_for_player(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<Game>, GameRepositoryError>;

    /// Writes the game's position only while it is active and still at `expected_fen`.
    async fn update_position(
        &self,
        game: &Game,
        expected_fen: &str,
    ) -> Result<bool, GameRepositoryError>;

    async fn set_board_message(
        &self,
        game_id: &str,
        message: &MessageRef,
    ) -> Result<(), GameRepositoryError>;

    /// Moves an active game to a terminal status. Returns false if it was already finished.
    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        winner: Option<PlayerIdentity>,
    ) -> Result<bool, GameRepositoryError>;
}

pub struct DynamoDbGameRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbGameRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    async fn scan_games(
        &self,
        filter: &str,
        values: HashMap<String, AttributeValue>,
        names: Option<HashMap<String, String>>,
    ) -> Result<Vec<Game>, GameRepositoryError> {
        let mut games = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(Some(values.clone()))
                .consistent_read(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let game: Game = from_item(item)
                    .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;
                games.push(game);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(games)
    }
}

fn status_value(status: GameStatus) -> AttributeValue {
    AttributeValue::S(status.as_str().to_string())
}

#[async_trait]
impl GameRepository for DynamoDbGameRepository {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError> {
        let item = to_item(game).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(game_id)")
            .send()
            .await
            .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, GameRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("game_id", AttributeValue::S(game_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| GameRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            let game: Game =
                from_item(item).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(game))
        } else {
            Ok(None)
        }
    }

    async fn find_active_games(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<Game>, GameRepositoryError> {
        let values = HashMap::from([
            (":active".to_string(), status_value(GameStatus::Active)),
            (":player".to_string(), AttributeValue::S(player.to_string())),
        ]);
        let names = HashMap::from([("#status".to_string(), "status".to_string())]);
        self.scan_games(
            "#status = :active AND (player1 = :player OR player2 = :player)",
            values,
            Some(names),
        )
        .await
    }

    async fn find_games_for_player(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<Game>, GameRepositoryError> {
        let values = HashMap::from([(":player".to_string(), AttributeValue::S(player.to_string()))]);
        self.scan_games("player1 = :player OR player2 = :player", values, None)
            .await
    }

    async fn update_position(
        &self,
        game: &Game,
        expected_fen: &str,
    ) -> Result<bool, GameRepositoryError> {
        let item = to_item(game).map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("#status = :active AND fen = :expected_fen")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":active", status_value(GameStatus::Active))
            .expression_attribute_values(":expected_fen", AttributeValue::S(expected_fen.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Ok(false);
                    }
                }
                Err(GameRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn set_board_message(
        &self,
        game_id: &str,
        message: &MessageRef,
    ) -> Result<(), GameRepositoryError> {
        let value = to_attribute_value(message)
            .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("game_id", AttributeValue::S(game_id.to_string()))
            .update_expression("SET board_message = :message")
            .condition_expression("attribute_exists(game_id)")
            .expression_attribute_values(":message", value)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(GameRepositoryError::NotFound);
                    }
                }
                Err(GameRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        winner: Option<PlayerIdentity>,
    ) -> Result<bool, GameRepositoryError> {
        let now = to_attribute_value(Utc::now())
            .map_err(|e| GameRepositoryError::Serialization(e.to_string()))?;

        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("game_id", AttributeValue::S(game_id.to_string()))
            .condition_expression("#status = :active")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":active", status_value(GameStatus::Active))
            .expression_attribute_values(":status", status_value(status))
            .expression_attribute_values(":now", now);

        request = match winner {
            Some(winner) => request
                .update_expression("SET #status = :status, updated_at = :now, winner = :winner")
                .expression_attribute_values(":winner", AttributeValue::S(winner.to_string())),
            None => request
                .update_expression("SET #status = :status, updated_at = :now REMOVE winner"),
        };

        match request.send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Ok(false);
                    }
                }
                Err(GameRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }
}
