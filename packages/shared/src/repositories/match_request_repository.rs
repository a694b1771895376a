use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use std::collections::HashMap;

use crate::models::match_request::MatchRequest;
use crate::models::player::PlayerIdentity;
use crate::repositories::errors::match_request_repository_errors::MatchRequestRepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchRequestRepository: Send + Sync {
    /// Stores the request only if neither party already appears in an outstanding one.
    /// Both slots are claimed in one step; returns false when either is taken.
    async fn create_if_players_free(
        &self,
        request: &MatchRequest,
    ) -> Result<bool, MatchRequestRepositoryError>;

    async fn find_for_player(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Option<MatchRequest>, MatchRequestRepositoryError>;

    /// Returns false if the request was already gone.
    async fn delete_request(
        &self,
        request: &MatchRequest,
    ) -> Result<bool, MatchRequestRepositoryError>;

    async fn list_requests(&self) -> Result<Vec<MatchRequest>, MatchRequestRepositoryError>;
}

/// One row per participant, so the key itself enforces one request per player.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestSlot {
    player_id: PlayerIdentity,
    request_id: String,
    requester: PlayerIdentity,
    recipient: PlayerIdentity,
    channel: String,
    created_at: DateTime<Utc>,
}

impl RequestSlot {
    fn for_player(player: &PlayerIdentity, request: &MatchRequest) -> Self {
        RequestSlot {
            player_id: player.clone(),
            request_id: request.request_id.clone(),
            requester: request.requester.clone(),
            recipient: request.recipient.clone(),
            channel: request.channel.clone(),
            created_at: request.created_at,
        }
    }

    fn into_request(self) -> MatchRequest {
        MatchRequest {
            request_id: self.request_id,
            requester: self.requester,
            recipient: self.recipient,
            channel: self.channel,
            created_at: self.created_at,
        }
    }
}

pub struct DynamoDbMatchRequestRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMatchRequestRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    fn slot_put(
        &self,
        player: &PlayerIdentity,
        request: &MatchRequest,
    ) -> Result<TransactWriteItem, MatchRequestRepositoryError> {
        let item: HashMap<String, AttributeValue> =
            to_item(RequestSlot::for_player(player, request))
                .map_err(|e| MatchRequestRepositoryError::Serialization(e.to_string()))?;

        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(player_id)")
            .build()
            .map_err(|e| MatchRequestRepositoryError::TransactionError(e.to_string()))?;

        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn slot_delete(
        &self,
        player: &PlayerIdentity,
        request: &MatchRequest,
    ) -> Result<TransactWriteItem, MatchRequestRepositoryError> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .key("player_id", AttributeValue::S(player.to_string()))
            .condition_expression("request_id = :request_id")
            .expression_attribute_values(
                ":request_id",
                AttributeValue::S(request.request_id.clone()),
            )
            .build()
            .map_err(|e| MatchRequestRepositoryError::TransactionError(e.to_string()))?;

        Ok(TransactWriteItem::builder().delete(delete).build())
    }
}

#[async_trait]
impl MatchRequestRepository for DynamoDbMatchRequestRepository {
    async fn create_if_players_free(
        &self,
        request: &MatchRequest,
    ) -> Result<bool, MatchRequestRepositoryError> {
        let transaction_items = vec![
            self.slot_put(&request.requester, request)?,
            self.slot_put(&request.recipient, request)?,
        ];

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(transaction_items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                // A failed condition on either slot cancels the whole transaction.
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_transaction_canceled_exception() {
                        return Ok(false);
                    }
                }
                Err(MatchRequestRepositoryError::TransactionError(e.to_string()))
            }
        }
    }

    async fn find_for_player(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Option<MatchRequest>, MatchRequestRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("player_id", AttributeValue::S(player.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRequestRepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                let slot: RequestSlot = from_item(item)
                    .map_err(|e| MatchRequestRepositoryError::Serialization(e.to_string()))?;
                Ok(Some(slot.into_request()))
            }
            None => Ok(None),
        }
    }

    async fn delete_request(
        &self,
        request: &MatchRequest,
    ) -> Result<bool, MatchRequestRepositoryError> {
        let transaction_items = vec![
            self.slot_delete(&request.requester, request)?,
            self.slot_delete(&request.recipient, request)?,
        ];

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(transaction_items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_transaction_canceled_exception() {
                        return Ok(false);
                    }
                }
                Err(MatchRequestRepositoryError::TransactionError(e.to_string()))
            }
        }
    }

    async fn list_requests(&self) -> Result<Vec<MatchRequest>, MatchRequestRepositoryError> {
        let mut requests: HashMap<String, MatchRequest> = HashMap::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| MatchRequestRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let slot: RequestSlot = from_item(item)
                    .map_err(|e| MatchRequestRepositoryError::Serialization(e.to_string()))?;
                requests
                    .entry(slot.request_id.clone())
                    .or_insert_with(|| slot.into_request());
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        let mut requests: Vec<MatchRequest> = requests.into_values().collect();
        requests.sort_by_key(|request| request.created_at);
        Ok(requests)
    }
}
