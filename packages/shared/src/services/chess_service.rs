use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square, EMPTY};
use chrono::Utc;
use std::str::FromStr;

use crate::models::game::{Game, GameStatus, Side, STARTING_FEN};
use crate::models::moves::{LegalMove, MoveRequest, PieceKind, RequestedPromotion};
use crate::services::errors::chess_service_errors::ChessServiceError;

/// Halfmove clock value at which the fifty-move rule ends the game.
const FIFTY_MOVE_LIMIT: u32 = 100;

/// Ways a position can end the game, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    Draw,
}

impl TerminalStatus {
    pub fn game_status(self) -> GameStatus {
        match self {
            TerminalStatus::Checkmate => GameStatus::Checkmate,
            TerminalStatus::Stalemate => GameStatus::Stalemate,
            TerminalStatus::InsufficientMaterial => GameStatus::InsufficientMaterial,
            TerminalStatus::ThreefoldRepetition => GameStatus::ThreefoldRepetition,
            TerminalStatus::Draw => GameStatus::Draw,
        }
    }
}

/// An immutable position snapshot.
///
/// Wraps the rules library's board together with the state it does not keep: the move
/// counters and the hashes of every position since the last irreversible move, which
/// threefold repetition needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    history: Vec<u64>,
}

impl Position {
    pub fn starting() -> Self {
        Board::default().into()
    }

    /// Parses a FEN string. Missing move counters default to `0 1`.
    pub fn load(fen: &str) -> Result<Self, ChessServiceError> {
        let board = Board::from_str(fen)
            .map_err(|e| ChessServiceError::InvalidPosition(format!("{}: {}", fen, e)))?;

        let fields: Vec<&str> = fen.split_whitespace().collect();
        let counter = |index: usize, default: u32| -> Result<u32, ChessServiceError> {
            match fields.get(index) {
                None => Ok(default),
                Some(raw) => raw.parse().map_err(|_| {
                    ChessServiceError::InvalidPosition(format!("bad move counter '{}'", raw))
                }),
            }
        };

        Ok(Position {
            halfmove_clock: counter(4, 0)?,
            fullmove_number: counter(5, 1)?.max(1),
            history: vec![board.get_hash()],
            board,
        })
    }

    /// Restores a stored position together with its repetition history. A history that
    /// does not end in this position is discarded.
    pub fn with_history(fen: &str, history: &[u64]) -> Result<Self, ChessServiceError> {
        let mut position = Self::load(fen)?;
        if history.last() == Some(&position.board.get_hash()) {
            position.history = history.to_vec();
        }
        Ok(position)
    }

    pub fn serialize(&self) -> String {
        let board_fen = self.board.to_string();
        let placement: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            placement.join(" "),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn history(&self) -> &[u64] {
        &self.history
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn side_to_move(&self) -> Side {
        side_of(self.board.side_to_move())
    }

    /// Legal moves, optionally only those starting on `origin`.
    pub fn legal_moves(&self, origin: Option<&str>) -> Result<Vec<LegalMove>, ChessServiceError> {
        let origin = origin.map(parse_square).transpose()?;

        Ok(MoveGen::new_legal(&self.board)
            .filter(|mv| origin.map_or(true, |square| mv.get_source() == square))
            .filter_map(|mv| self.describe(mv))
            .collect())
    }

    /// Applies a move and returns the resulting position. `self` is never modified.
    ///
    /// Promotion must be named explicitly; an empty promotion counts as none.
    pub fn apply_move(
        &self,
        request: &MoveRequest,
    ) -> Result<(Position, LegalMove), ChessServiceError> {
        let from = parse_square(&request.from)?;
        let to = parse_square(&request.to)?;
        let promotion = match request.promotion_piece() {
            RequestedPromotion::None => None,
            RequestedPromotion::Piece(piece) => Some(to_chess_piece(piece)),
            RequestedPromotion::Invalid => {
                return Err(ChessServiceError::InvalidPromotion(
                    request.promotion.clone().unwrap_or_default(),
                ))
            }
        };

        let chess_move = ChessMove::new(from, to, promotion);
        if !MoveGen::new_legal(&self.board).any(|mv| mv == chess_move) {
            return Err(ChessServiceError::IllegalMove(format!("{}", chess_move)));
        }
        let described = self
            .describe(chess_move)
            .ok_or_else(|| ChessServiceError::IllegalMove(format!("{}", chess_move)))?;

        let next_board = self.board.make_move_new(chess_move);
        let resets_clock = described.piece == PieceKind::Pawn || self.board.piece_on(to).is_some();
        let irreversible = resets_clock || self.castling_changed(&next_board);

        let mut history = if irreversible {
            Vec::new()
        } else {
            self.history.clone()
        };
        history.push(next_board.get_hash());

        let next = Position {
            board: next_board,
            halfmove_clock: if resets_clock {
                0
            } else {
                self.halfmove_clock + 1
            },
            fullmove_number: match self.board.side_to_move() {
                Color::Black => self.fullmove_number + 1,
                Color::White => self.fullmove_number,
            },
            history,
        };

        Ok((next, described))
    }

    /// `None` while the game can continue.
    pub fn terminal_status(&self) -> Option<TerminalStatus> {
        match self.board.status() {
            BoardStatus::Checkmate => return Some(TerminalStatus::Checkmate),
            BoardStatus::Stalemate => return Some(TerminalStatus::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if self.insufficient_material() {
            Some(TerminalStatus::InsufficientMaterial)
        } else if self.is_threefold_repetition() {
            Some(TerminalStatus::ThreefoldRepetition)
        } else if self.halfmove_clock >= FIFTY_MOVE_LIMIT {
            Some(TerminalStatus::Draw)
        } else {
            None
        }
    }

    fn is_threefold_repetition(&self) -> bool {
        let current = self.board.get_hash();
        self.history.iter().filter(|hash| **hash == current).count() >= 3
    }

    /// Bare kings, a single minor piece, or bishops that all stand on one square colour.
    fn insufficient_material(&self) -> bool {
        let board = &self.board;
        let occupied = board.combined();
        let kings = *board.pieces(Piece::King);
        let others = *occupied & !kings;
        let piece_count = others.popcnt();

        if piece_count == 0 {
            return true;
        }
        let minors = *board.pieces(Piece::Knight) | *board.pieces(Piece::Bishop);
        if piece_count == 1 && (others & minors) != EMPTY {
            return true;
        }

        let bishops = *board.pieces(Piece::Bishop);
        if others != bishops {
            return false;
        }
        let light = bishops.into_iter().filter(|sq| is_light(*sq)).count();
        light == 0 || light as u32 == bishops.popcnt()
    }

    fn castling_changed(&self, next: &Board) -> bool {
        self.board.castle_rights(Color::White) != next.castle_rights(Color::White)
            || self.board.castle_rights(Color::Black) != next.castle_rights(Color::Black)
    }

    fn describe(&self, mv: ChessMove) -> Option<LegalMove> {
        let piece = self.board.piece_on(mv.get_source())?;
        Some(LegalMove {
            from: mv.get_source().to_string(),
            to: mv.get_dest().to_string(),
            color: self.side_to_move(),
            piece: from_chess_piece(piece),
            promotion: mv.get_promotion().map(from_chess_piece),
        })
    }
}

impl From<Board> for Position {
    fn from(board: Board) -> Self {
        Position {
            history: vec![board.get_hash()],
            board,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }
}

/// Glue between stored games and positions.
#[derive(Clone, Default)]
pub struct ChessService;

impl ChessService {
    pub fn new() -> Self {
        ChessService
    }

    pub fn load_game(&self, game: &Game) -> Result<Position, ChessServiceError> {
        Position::with_history(&game.fen, &game.position_history)
    }

    /// Copies a move and its resulting position onto the game record.
    pub fn record_move(&self, game: &mut Game, position: &Position, mv: &LegalMove) {
        game.fen = position.serialize();
        game.position_history = position.history().to_vec();
        game.moves.push(mv.uci());
        game.updated_at = Utc::now();
    }

    pub fn starting_fen(&self) -> &'static str {
        STARTING_FEN
    }
}

fn parse_square(raw: &str) -> Result<Square, ChessServiceError> {
    Square::from_str(&raw.trim().to_ascii_lowercase())
        .map_err(|_| ChessServiceError::InvalidSquare(raw.to_string()))
}

fn is_light(square: Square) -> bool {
    (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 1
}

fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

fn from_chess_piece(piece: Piece) -> PieceKind {
    match piece {
        Piece::Pawn => PieceKind::Pawn,
        Piece::Knight => PieceKind::Knight,
        Piece::Bishop => PieceKind::Bishop,
        Piece::Rook => PieceKind::Rook,
        Piece::Queen => PieceKind::Queen,
        Piece::King => PieceKind::King,
    }
}

fn to_chess_piece(piece: PieceKind) -> Piece {
    match piece {
        PieceKind::Pawn => Piece::Pawn,
        PieceKind::Knight => Piece::Knight,
        PieceKind::Bishop => Piece::Bishop,
        PieceKind::Rook => Piece::Rook,
        PieceKind::Queen => Piece::Queen,
        PieceKind::King => Piece::King,
    }
}
