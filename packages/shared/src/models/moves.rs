use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::game::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Lowercase algebraic letter, as used in promotion suffixes.
    pub fn letter(&self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    /// Accepts `q` as well as `queen`, any case.
    pub fn from_promotion(value: &str) -> Option<PieceKind> {
        match value.trim().to_ascii_lowercase().as_str() {
            "q" | "queen" => Some(PieceKind::Queen),
            "r" | "rook" => Some(PieceKind::Rook),
            "b" | "bishop" => Some(PieceKind::Bishop),
            "n" | "knight" => Some(PieceKind::Knight),
            _ => None,
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PieceKind::Pawn => "Pawn",
            PieceKind::Knight => "Knight",
            PieceKind::Bishop => "Bishop",
            PieceKind::Rook => "Rook",
            PieceKind::Queen => "Queen",
            PieceKind::King => "King",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegalMove {
    pub from: String,
    pub to: String,
    pub color: Side,
    pub piece: PieceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
}

impl LegalMove {
    /// Long algebraic form, e.g. `e2e4` or `a7a8q`.
    pub fn uci(&self) -> String {
        match self.promotion {
            Some(piece) => format!("{}{}{}", self.from, self.to, piece.letter()),
            None => format!("{}{}", self.from, self.to),
        }
    }

    pub fn to_request(&self) -> MoveRequest {
        MoveRequest {
            from: self.from.clone(),
            to: self.to.clone(),
            promotion: self.promotion.map(|piece| piece.letter().to_string()),
        }
    }

    /// Whether a client-supplied move names this move.
    pub fn matches(&self, request: &MoveRequest) -> bool {
        if !self.from.eq_ignore_ascii_case(request.from.trim())
            || !self.to.eq_ignore_ascii_case(request.to.trim())
        {
            return false;
        }
        match (self.promotion, request.promotion_piece()) {
            (None, RequestedPromotion::None) => true,
            (Some(expected), RequestedPromotion::Piece(requested)) => expected == requested,
            _ => false,
        }
    }
}

/// A move as supplied by a client or a suggestion source: squares plus optional promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedPromotion {
    None,
    Piece(PieceKind),
    Invalid,
}

impl MoveRequest {
    pub fn new(from: &str, to: &str) -> Self {
        MoveRequest {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }

    pub fn with_promotion(from: &str, to: &str, promotion: &str) -> Self {
        MoveRequest {
            from: from.to_string(),
            to: to.to_string(),
            promotion: Some(promotion.to_string()),
        }
    }

    /// Parses `e2e4` / `e7e8q`.
    pub fn from_uci(uci: &str) -> Option<Self> {
        let uci = uci.trim();
        if !uci.is_ascii() || !(4..=5).contains(&uci.len()) {
            return None;
        }
        let promotion = uci.get(4..).filter(|p| !p.is_empty()).map(str::to_string);
        Some(MoveRequest {
            from: uci[0..2].to_string(),
            to: uci[2..4].to_string(),
            promotion,
        })
    }

    /// Suggestion sources often send `""` for "no promotion".
    pub fn promotion_piece(&self) -> RequestedPromotion {
        match self.promotion.as_deref().map(str::trim) {
            None | Some("") => RequestedPromotion::None,
            Some(value) => match PieceKind::from_promotion(value) {
                Some(piece) => RequestedPromotion::Piece(piece),
                None => RequestedPromotion::Invalid,
            },
        }
    }
}

/// Groups moves by the piece that makes them, for a piece-then-move selection flow.
pub fn group_by_piece(moves: &[LegalMove]) -> BTreeMap<(PieceKind, String), Vec<LegalMove>> {
    let mut grouped: BTreeMap<(PieceKind, String), Vec<LegalMove>> = BTreeMap::new();
    for mv in moves {
        grouped
            .entry((mv.piece, mv.from.clone()))
            .or_default()
            .push(mv.clone());
    }
    grouped
}
