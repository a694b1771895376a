use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::player::PlayerIdentity;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Active,
    Checkmate,
    Draw,
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
    Resign,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Active => "active",
            GameStatus::Checkmate => "checkmate",
            GameStatus::Draw => "draw",
            GameStatus::Stalemate => "stalemate",
            GameStatus::ThreefoldRepetition => "threefoldRepetition",
            GameStatus::InsufficientMaterial => "insufficientMaterial",
            GameStatus::Resign => "resign",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Active)
    }

    /// Decisive results have a winner and move ratings.
    pub fn is_decisive(&self) -> bool {
        matches!(self, GameStatus::Checkmate | GameStatus::Resign)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

/// Where a rendered board or prompt lives on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub player1: PlayerIdentity,
    pub player2: PlayerIdentity,
    /// Channel the game was started in; boards and results are posted there.
    pub channel: String,
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerIdentity>,
    pub fen: String,
    #[serde(default)]
    pub moves: Vec<String>,
    /// Hashes of every position since the last irreversible move, current position last.
    #[serde(default)]
    pub position_history: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_message: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    /// player1 plays white.
    pub fn new(player1: PlayerIdentity, player2: PlayerIdentity, channel: &str) -> Self {
        let now = Utc::now();
        Game {
            game_id: Uuid::new_v4().to_string(),
            player1,
            player2,
            channel: channel.to_string(),
            status: GameStatus::Active,
            winner: None,
            fen: STARTING_FEN.to_string(),
            moves: vec![],
            position_history: vec![],
            board_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    pub fn involves(&self, player: &PlayerIdentity) -> bool {
        &self.player1 == player || &self.player2 == player
    }

    pub fn side_of(&self, player: &PlayerIdentity) -> Option<Side> {
        if &self.player1 == player {
            Some(Side::White)
        } else if &self.player2 == player {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn player_on(&self, side: Side) -> &PlayerIdentity {
        match side {
            Side::White => &self.player1,
            Side::Black => &self.player2,
        }
    }

    pub fn opponent_of(&self, player: &PlayerIdentity) -> Option<&PlayerIdentity> {
        self.side_of(player)
            .map(|side| self.player_on(side.opposite()))
    }

    pub fn players(&self) -> [&PlayerIdentity; 2] {
        [&self.player1, &self.player2]
    }

    /// Summary of a finished game from one participant's point of view.
    pub fn summary_for(&self, player: &PlayerIdentity) -> Option<GameSummary> {
        let opponent = self.opponent_of(player)?.clone();
        let result = match &self.winner {
            None => GameResult::Draw,
            Some(winner) if winner == player => GameResult::Win,
            Some(_) => GameResult::Loss,
        };
        Some(GameSummary {
            game_id: self.game_id.clone(),
            opponent,
            result,
            status: self.status,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: String,
    pub opponent: PlayerIdentity,
    pub result: GameResult,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
}
