use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};

use crate::models::player::{Player, PlayerIdentity};
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    async fn get_player(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<Player>, PlayerRepositoryError>;

    /// Returns false when a record for the identity already exists.
    async fn create_player_if_absent(&self, player: &Player)
        -> Result<bool, PlayerRepositoryError>;

    async fn update_profile(
        &self,
        identity: &PlayerIdentity,
        display_name: Option<String>,
        avatar: Option<String>,
    ) -> Result<(), PlayerRepositoryError>;

    async fn update_rating(
        &self,
        identity: &PlayerIdentity,
        rating: f64,
    ) -> Result<(), PlayerRepositoryError>;

    /// Sets the current game only if it still equals `expected`.
    async fn compare_and_set_current_game(
        &self,
        identity: &PlayerIdentity,
        expected: Option<String>,
        new: Option<String>,
    ) -> Result<bool, PlayerRepositoryError>;

    async fn set_current_game(
        &self,
        identity: &PlayerIdentity,
        game_id: Option<String>,
    ) -> Result<(), PlayerRepositoryError>;

    async fn list_players(&self) -> Result<Vec<Player>, PlayerRepositoryError>;
}

pub struct DynamoDbPlayerRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbPlayerRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    fn key(identity: &PlayerIdentity) -> AttributeValue {
        AttributeValue::S(identity.to_string())
    }
}

#[async_trait]
impl PlayerRepository for DynamoDbPlayerRepository {
    async fn get_player(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<Option<Player>, PlayerRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("player_id", Self::key(identity))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| PlayerRepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                let player: Player = from_item(item)
                    .map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?;
                Ok(Some(player))
            }
            None => Ok(None),
        }
    }

    async fn create_player_if_absent(
        &self,
        player: &Player,
    ) -> Result<bool, PlayerRepositoryError> {
        let item =
            to_item(player).map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(player_id)")
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
                Err(PlayerRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn update_profile(
        &self,
        identity: &PlayerIdentity,
        display_name: Option<String>,
        avatar: Option<String>,
    ) -> Result<(), PlayerRepositoryError> {
        let mut assignments = Vec::new();
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("player_id", Self::key(identity))
            .condition_expression("attribute_exists(player_id)");

        if let Some(name) = display_name {
            assignments.push("display_name = :display_name");
            request = request.expression_attribute_values(":display_name", AttributeValue::S(name));
        }
        if let Some(avatar) = avatar {
            assignments.push("avatar = :avatar");
            request = request.expression_attribute_values(":avatar", AttributeValue::S(avatar));
        }
        if assignments.is_empty() {
            return Ok(());
        }

        let result = request
            .update_expression(format!("SET {}", assignments.join(", ")))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(PlayerRepositoryError::NotFound);
                    }
                }
                Err(PlayerRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn update_rating(
        &self,
        identity: &PlayerIdentity,
        rating: f64,
    ) -> Result<(), PlayerRepositoryError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("player_id", Self::key(identity))
            .update_expression("SET rating = :rating")
            .condition_expression("attribute_exists(player_id)")
            .expression_attribute_values(":rating", AttributeValue::N(rating.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(PlayerRepositoryError::NotFound);
                    }
                }
                Err(PlayerRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn compare_and_set_current_game(
        &self,
        identity: &PlayerIdentity,
        expected: Option<String>,
        new: Option<String>,
    ) -> Result<bool, PlayerRepositoryError> {
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("player_id", Self::key(identity));

        request = match &expected {
            Some(game_id) => request
                .condition_expression("current_game = :expected")
                .expression_attribute_values(":expected", AttributeValue::S(game_id.clone())),
            None => request.condition_expression(
                "attribute_exists(player_id) AND attribute_not_exists(current_game)",
            ),
        };

        request = match &new {
            Some(game_id) => request
                .update_expression("SET current_game = :new")
                .expression_attribute_values(":new", AttributeValue::S(game_id.clone())),
            None if expected.is_some() => request.update_expression("REMOVE current_game"),
            None => {
                // Nothing to write; the comparison alone decides.
                let player = self.get_player(identity).await?;
                return Ok(player.map_or(false, |p| p.current_game.is_none()));
            }
        };

        match request.send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Ok(false);
                    }
                }
                Err(PlayerRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn set_current_game(
        &self,
        identity: &PlayerIdentity,
        game_id: Option<String>,
    ) -> Result<(), PlayerRepositoryError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("player_id", Self::key(identity))
            .condition_expression("attribute_exists(player_id)");

        let request = match game_id {
            Some(game_id) => request
                .update_expression("SET current_game = :game")
                .expression_attribute_values(":game", AttributeValue::S(game_id)),
            None => request.update_expression("REMOVE current_game"),
        };

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(PlayerRepositoryError::NotFound);
                    }
                }
                Err(PlayerRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn list_players(&self) -> Result<Vec<Player>, PlayerRepositoryError> {
        let mut players = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| PlayerRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let player: Player = from_item(item)
                    .map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?;
                players.push(player);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(players)
    }
}
