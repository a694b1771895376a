use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::player::PlayerIdentity;

/// An outstanding challenge. While it exists neither party may appear in another one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub request_id: String,
    pub requester: PlayerIdentity,
    pub recipient: PlayerIdentity,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

impl MatchRequest {
    pub fn new(requester: PlayerIdentity, recipient: PlayerIdentity, channel: &str) -> Self {
        MatchRequest {
            request_id: Uuid::new_v4().to_string(),
            requester,
            recipient,
            channel: channel.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, player: &PlayerIdentity) -> bool {
        &self.requester == player || &self.recipient == player
    }

    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.created_at >= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_request_creation() {
        let request = MatchRequest::new(
            PlayerIdentity::human("1"),
            PlayerIdentity::human("2"),
            "channel-1",
        );

        assert!(request.involves(&PlayerIdentity::human("1")));
        assert!(request.involves(&PlayerIdentity::human("2")));
        assert!(!request.involves(&PlayerIdentity::human("3")));
        assert_eq!(request.channel, "channel-1");
    }

    #[test]
    fn test_match_request_expiry() {
        let mut request = MatchRequest::new(
            PlayerIdentity::human("1"),
            PlayerIdentity::human("2"),
            "channel-1",
        );
        let now = Utc::now();
        request.created_at = now - Duration::seconds(59);
        assert!(!request.is_expired(now, Duration::seconds(60)));

        request.created_at = now - Duration::seconds(61);
        assert!(request.is_expired(now, Duration::seconds(60)));
    }
}
