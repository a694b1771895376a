use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::game::{Game, MessageRef};
use crate::models::interaction::{OutgoingMessage, PromptChoice};
use crate::models::match_request::MatchRequest;
use crate::models::player::PlayerIdentity;
use crate::repositories::match_request_repository::MatchRequestRepository;
use crate::services::errors::match_request_service_errors::MatchRequestServiceError;
use crate::services::game_session_service::GameSessionService;
use crate::services::player_service::PlayerService;
use crate::services::presentation_service::Presenter;

/// A challenge that has been stored and shown to the recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChallenge {
    pub request: MatchRequest,
    pub prompt: MessageRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeOutcome {
    Accepted(Game),
    Declined,
    TimedOut,
}

/// Owns match requests from issue to accept, decline or timeout.
pub struct MatchRequestService {
    requests: Arc<dyn MatchRequestRepository + Send + Sync>,
    players: Arc<PlayerService>,
    sessions: Arc<GameSessionService>,
    presenter: Arc<dyn Presenter + Send + Sync>,
    response_timeout: Duration,
}

impl MatchRequestService {
    pub fn new(
        requests: Arc<dyn MatchRequestRepository + Send + Sync>,
        players: Arc<PlayerService>,
        sessions: Arc<GameSessionService>,
        presenter: Arc<dyn Presenter + Send + Sync>,
        response_timeout: Duration,
    ) -> Self {
        MatchRequestService {
            requests,
            players,
            sessions,
            presenter,
            response_timeout,
        }
    }

    /// Stores a request and prompts the recipient. Both players must be free and appear in no
    /// other request; the store enforces the latter atomically.
    pub async fn issue_challenge(
        &self,
        requester: &PlayerIdentity,
        recipient: &PlayerIdentity,
        channel: &str,
    ) -> Result<PendingChallenge, MatchRequestServiceError> {
        if requester == recipient {
            return Err(MatchRequestServiceError::InvalidOpponent(
                "you cannot challenge yourself".to_string(),
            ));
        }
        if recipient.is_ai() {
            return Err(MatchRequestServiceError::InvalidOpponent(format!(
                "{} is an AI model, start an AI game instead",
                recipient
            )));
        }

        let challenger = self.players.get_or_create(requester, None, None).await?;
        let opponent = self
            .players
            .find_player(recipient)
            .await?
            .ok_or_else(|| MatchRequestServiceError::UnknownRecipient(recipient.clone()))?;

        for player in [&challenger, &opponent] {
            if !player.is_available() {
                return Err(MatchRequestServiceError::AlreadyInGame(
                    player.identity.clone(),
                ));
            }
        }

        for player in [requester, recipient] {
            self.clear_if_expired(player).await?;
        }

        let request = MatchRequest::new(requester.clone(), recipient.clone(), channel);
        if !self.requests.create_if_players_free(&request).await? {
            return Err(MatchRequestServiceError::DuplicatePending);
        }

        let message = OutgoingMessage::text(format!(
            "{}, {} has challenged you to a match!",
            recipient.mention(),
            requester.mention()
        ))
        .with_prompt(recipient);
        let prompt = match self.presenter.post_message(channel, message).await {
            Ok(prompt) => prompt,
            Err(e) => {
                self.requests.delete_request(&request).await?;
                return Err(e.into());
            }
        };

        info!(
            request_id = %request.request_id,
            requester = %requester,
            recipient = %recipient,
            "Challenge issued"
        );
        Ok(PendingChallenge { request, prompt })
    }

    /// Waits out the response window. Whichever side deletes the request decides the outcome,
    /// so a request reconciled elsewhere never also starts a game.
    pub async fn await_resolution(
        &self,
        pending: PendingChallenge,
    ) -> Result<ChallengeOutcome, MatchRequestServiceError> {
        let PendingChallenge { request, prompt } = pending;

        let choice = match self
            .presenter
            .await_response(&prompt, &request.recipient, self.response_timeout)
            .await
        {
            Ok(choice) => choice,
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "Challenge prompt failed, treating as timeout");
                None
            }
        };
        if let Err(e) = self.presenter.delete_message(&prompt).await {
            warn!(request_id = %request.request_id, error = %e, "Could not delete challenge prompt");
        }

        if !self.requests.delete_request(&request).await? {
            warn!(request_id = %request.request_id, "Match request was already removed");
            return Ok(ChallengeOutcome::TimedOut);
        }

        match choice {
            Some(PromptChoice::Accept) => {
                info!(request_id = %request.request_id, "Challenge accepted");
                let game = self
                    .sessions
                    .start_game(&request.requester, &request.recipient, &request.channel)
                    .await?;
                Ok(ChallengeOutcome::Accepted(game))
            }
            Some(PromptChoice::Decline) => {
                info!(request_id = %request.request_id, "Challenge declined");
                self.notify(&request.channel, "Match request declined!").await;
                Ok(ChallengeOutcome::Declined)
            }
            None => {
                info!(request_id = %request.request_id, "Challenge timed out");
                self.notify(
                    &request.channel,
                    &format!("{}, match request timed out.", request.requester.mention()),
                )
                .await;
                Ok(ChallengeOutcome::TimedOut)
            }
        }
    }

    /// Issues a challenge and waits for its resolution.
    pub async fn challenge(
        &self,
        requester: &PlayerIdentity,
        recipient: &PlayerIdentity,
        channel: &str,
    ) -> Result<ChallengeOutcome, MatchRequestServiceError> {
        let pending = self.issue_challenge(requester, recipient, channel).await?;
        self.await_resolution(pending).await
    }

    pub async fn pending_for(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Option<MatchRequest>, MatchRequestServiceError> {
        Ok(self.requests.find_for_player(player).await?)
    }

    /// Deletes every request older than the response window. Returns how many were removed.
    pub async fn reconcile_expired(&self) -> Result<usize, MatchRequestServiceError> {
        let now = Utc::now();
        let window = self.window();
        let mut removed = 0;

        for request in self.requests.list_requests().await? {
            if request.is_expired(now, window) && self.requests.delete_request(&request).await? {
                info!(request_id = %request.request_id, "Removed expired match request");
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear_if_expired(&self, player: &PlayerIdentity) -> Result<(), MatchRequestServiceError> {
        if let Some(request) = self.requests.find_for_player(player).await? {
            if request.is_expired(Utc::now(), self.window())
                && self.requests.delete_request(&request).await?
            {
                info!(request_id = %request.request_id, player = %player, "Removed expired match request");
            }
        }
        Ok(())
    }

    fn window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.response_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(60))
    }

    async fn notify(&self, channel: &str, content: &str) {
        if let Err(e) = self
            .presenter
            .post_message(channel, OutgoingMessage::text(content))
            .await
        {
            warn!(channel, error = %e, "Could not post notice");
        }
    }
}
