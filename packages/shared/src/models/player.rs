use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_RATING: f64 = 1200.0;
const DEFAULT_AVATAR: &str = "/assets/wn.png";

/// Who sits on one side of the board.
///
/// Stored as a tagged string (`human:<id>` / `ai:<model>`) so storage predicates can
/// compare identities by plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PlayerIdentity {
    Human(String),
    Ai(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdentity(pub String);

impl fmt::Display for InvalidIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid player identity: {}", self.0)
    }
}

impl std::error::Error for InvalidIdentity {}

impl PlayerIdentity {
    pub fn human(id: impl Into<String>) -> Self {
        PlayerIdentity::Human(id.into())
    }

    pub fn ai(model: impl Into<String>) -> Self {
        PlayerIdentity::Ai(model.into())
    }

    /// The bare user id or model name.
    pub fn id(&self) -> &str {
        match self {
            PlayerIdentity::Human(id) | PlayerIdentity::Ai(id) => id,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, PlayerIdentity::Ai(_))
    }

    /// Human-readable label used in transport messages.
    pub fn mention(&self) -> String {
        match self {
            PlayerIdentity::Human(id) => format!("<@{}>", id),
            PlayerIdentity::Ai(model) => format!("{} (AI)", model),
        }
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerIdentity::Human(id) => write!(f, "human:{}", id),
            PlayerIdentity::Ai(model) => write!(f, "ai:{}", model),
        }
    }
}

impl FromStr for PlayerIdentity {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("human", id)) if !id.is_empty() => Ok(PlayerIdentity::human(id)),
            Some(("ai", model)) if !model.is_empty() => Ok(PlayerIdentity::ai(model)),
            _ => Err(InvalidIdentity(s.to_string())),
        }
    }
}

impl From<PlayerIdentity> for String {
    fn from(identity: PlayerIdentity) -> Self {
        identity.to_string()
    }
}

impl TryFrom<String> for PlayerIdentity {
    type Error = InvalidIdentity;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "player_id")]
    pub identity: PlayerIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_game: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Player {
    pub fn new(identity: PlayerIdentity) -> Self {
        Player {
            identity,
            display_name: None,
            avatar: None,
            rating: DEFAULT_RATING,
            current_game: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_profile(mut self, display_name: Option<String>, avatar: Option<String>) -> Self {
        self.display_name = display_name;
        self.avatar = avatar;
        self
    }

    /// A player with no current game can be challenged.
    pub fn is_available(&self) -> bool {
        self.current_game.is_none()
    }

    pub fn leaderboard_entry(&self) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: self.identity.id().to_string(),
            name: self
                .display_name
                .clone()
                .unwrap_or_else(|| capitalize_first_letter(self.identity.id())),
            avatar: self
                .avatar
                .clone()
                .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            rating: self.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub name: String,
    pub avatar: String,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player: PlayerIdentity,
    pub display_name: Option<String>,
    pub rating: f64,
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
}

fn capitalize_first_letter(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
