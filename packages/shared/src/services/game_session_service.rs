use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::models::game::{Game, GameResult, GameStatus, GameSummary, MessageRef, Side};
use crate::models::interaction::{Attachment, OutgoingMessage, PromptChoice};
use crate::models::moves::{LegalMove, MoveRequest};
use crate::models::player::{PlayerIdentity, PlayerStats};
use crate::repositories::game_repository::GameRepository;
use crate::services::ai_move_service::AiMoveService;
use crate::services::chess_service::{ChessService, Position, TerminalStatus};
use crate::services::errors::game_session_service_errors::GameSessionServiceError;
use crate::services::player_service::PlayerService;
use crate::services::presentation_service::{BoardRenderer, Presenter};
use crate::services::rating_service::RatingService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveOutcome {
    pub game: Game,
    pub played: LegalMove,
    /// The AI opponent's answer, when there was one.
    pub reply: Option<LegalMove>,
    pub status: GameStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    pub game: Game,
    pub side_to_move: Side,
    pub board: Attachment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDrawOffer {
    pub game: Game,
    pub offered_by: PlayerIdentity,
    pub opponent: PlayerIdentity,
    pub prompt: MessageRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOffer {
    /// The opponent is an AI and accepted on the spot.
    Settled(Game),
    Pending(PendingDrawOffer),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutcome {
    Accepted(Game),
    Declined,
    TimedOut,
}

/// Owns the active-game record: starting games, resolving moves, and settling results.
pub struct GameSessionService {
    games: Arc<dyn GameRepository + Send + Sync>,
    players: Arc<PlayerService>,
    ratings: Arc<RatingService>,
    ai: Arc<AiMoveService>,
    presenter: Arc<dyn Presenter + Send + Sync>,
    renderer: Arc<dyn BoardRenderer + Send + Sync>,
    chess: ChessService,
    response_timeout: Duration,
}

impl GameSessionService {
    pub fn new(
        games: Arc<dyn GameRepository + Send + Sync>,
        players: Arc<PlayerService>,
        ratings: Arc<RatingService>,
        ai: Arc<AiMoveService>,
        presenter: Arc<dyn Presenter + Send + Sync>,
        renderer: Arc<dyn BoardRenderer + Send + Sync>,
        response_timeout: Duration,
    ) -> Self {
        GameSessionService {
            games,
            players,
            ratings,
            ai,
            presenter,
            renderer,
            chess: ChessService::new(),
            response_timeout,
        }
    }

    /// Creates an active game from the starting position, claims both human players and
    /// renders the board. AI identities never hold a current game.
    pub async fn start_game(
        &self,
        player1: &PlayerIdentity,
        player2: &PlayerIdentity,
        channel: &str,
    ) -> Result<Game, GameSessionServiceError> {
        let mut game = Game::new(player1.clone(), player2.clone(), channel);
        let mut claimed: Vec<&PlayerIdentity> = Vec::new();

        for player in [player1, player2] {
            if player.is_ai() {
                continue;
            }
            if !self.players.claim_current_game(player, &game.game_id).await? {
                self.release_all(&claimed, &game.game_id).await;
                return Err(GameSessionServiceError::AlreadyInGame(player.clone()));
            }
            claimed.push(player);
        }

        if let Err(e) = self.games.create_game(&game).await {
            self.release_all(&claimed, &game.game_id).await;
            return Err(e.into());
        }

        info!(
            game_id = %game.game_id,
            white = %player1,
            black = %player2,
            "Game started"
        );

        let caption = format!(
            "{} (white) vs {} (black). {} to move.",
            player1.mention(),
            player2.mention(),
            player1.mention()
        );
        self.publish_board(&mut game, &Position::starting(), caption)
            .await;
        Ok(game)
    }

    /// Starts a game against a model from the catalogue. The human plays white.
    pub async fn start_ai_game(
        &self,
        human: &PlayerIdentity,
        model: &str,
        channel: &str,
    ) -> Result<Game, GameSessionServiceError> {
        if !self.ai.is_known_model(model) {
            return Err(GameSessionServiceError::UnknownModel(model.to_string()));
        }
        let player = self.players.get_or_create(human, None, None).await?;
        if !player.is_available() {
            return Err(GameSessionServiceError::AlreadyInGame(human.clone()));
        }
        let opponent = PlayerIdentity::ai(model);
        self.players.get_or_create(&opponent, None, None).await?;

        self.start_game(human, &opponent, channel).await
    }

    /// The single active game the player is in.
    pub async fn active_game(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Game, GameSessionServiceError> {
        let mut games = self.games.find_active_games(player).await?;
        match games.len() {
            0 => Err(GameSessionServiceError::NoActiveGame),
            1 => Ok(games.remove(0)),
            count => {
                let ids: Vec<&str> = games.iter().map(|g| g.game_id.as_str()).collect();
                error!(player = %player, count, ?ids, "Player has more than one active game");
                Err(GameSessionServiceError::InconsistentState(format!(
                    "{} has {} active games",
                    player, count
                )))
            }
        }
    }

    /// Resolves one move for `player`, then the AI reply if the opponent is a model.
    ///
    /// A game already sitting in a terminal position is settled first and the move is
    /// refused with `GameOver`.
    pub async fn submit_move(
        &self,
        player: &PlayerIdentity,
        request: &MoveRequest,
    ) -> Result<MoveOutcome, GameSessionServiceError> {
        let game = self.active_game(player).await?;
        let side = self.side_of(&game, player)?;
        let position = self.chess.load_game(&game)?;

        if let Some(terminal) = position.terminal_status() {
            warn!(game_id = %game.game_id, ?terminal, "Settling a finished position before accepting moves");
            let settled = self.finalize(&game, &position, terminal).await?;
            return Err(GameSessionServiceError::GameOver(settled.status));
        }
        if position.side_to_move() != side {
            return Err(GameSessionServiceError::NotYourTurn);
        }

        let (mut game, position, played) = self.advance(&game, &position, request, player).await?;
        if let Some(terminal) = position.terminal_status() {
            let settled = self.finalize(&game, &position, terminal).await?;
            return Ok(MoveOutcome {
                status: settled.status,
                game: settled,
                played,
                reply: None,
            });
        }
        let opponent = game.player_on(side.opposite()).clone();
        self.publish_board(&mut game, &position, move_caption(player, &played, &opponent))
            .await;

        let model = match &opponent {
            PlayerIdentity::Ai(model) => model.clone(),
            PlayerIdentity::Human(_) => {
                return Ok(MoveOutcome {
                    status: game.status,
                    game,
                    played,
                    reply: None,
                })
            }
        };

        let legal = position.legal_moves(None)?;
        let chosen = self
            .ai
            .choose_move(&game.fen, &legal, &model)
            .await
            .ok_or_else(|| {
                GameSessionServiceError::InconsistentState(format!(
                    "no legal reply in live game {}",
                    game.game_id
                ))
            })?;

        let (mut game, position, reply) = self
            .advance(&game, &position, &chosen.to_request(), &opponent)
            .await?;
        if let Some(terminal) = position.terminal_status() {
            let settled = self.finalize(&game, &position, terminal).await?;
            return Ok(MoveOutcome {
                status: settled.status,
                game: settled,
                played,
                reply: Some(reply),
            });
        }
        self.publish_board(&mut game, &position, move_caption(&opponent, &reply, player))
            .await;

        Ok(MoveOutcome {
            status: game.status,
            game,
            played,
            reply: Some(reply),
        })
    }

    /// Legal moves for the player's side, optionally from one square.
    pub async fn legal_moves_for(
        &self,
        player: &PlayerIdentity,
        origin: Option<&str>,
    ) -> Result<Vec<LegalMove>, GameSessionServiceError> {
        let game = self.active_game(player).await?;
        let side = self.side_of(&game, player)?;
        let position = self.chess.load_game(&game)?;
        if position.side_to_move() != side {
            return Err(GameSessionServiceError::NotYourTurn);
        }
        Ok(position.legal_moves(origin)?)
    }

    pub async fn show_game(
        &self,
        player: &PlayerIdentity,
    ) -> Result<GameView, GameSessionServiceError> {
        let game = self.active_game(player).await?;
        let position = self.chess.load_game(&game)?;
        let board = self.renderer.render(&position)?;
        Ok(GameView {
            side_to_move: position.side_to_move(),
            game,
            board,
        })
    }

    /// Ends the player's game with the opponent as winner.
    pub async fn resign(&self, player: &PlayerIdentity) -> Result<Game, GameSessionServiceError> {
        let game = self.active_game(player).await?;
        let winner = game
            .opponent_of(player)
            .cloned()
            .ok_or(GameSessionServiceError::NoActiveGame)?;

        info!(game_id = %game.game_id, player = %player, "Player resigned");
        self.settle(&game, GameStatus::Resign, Some(winner)).await
    }

    /// Offers a draw. Both current-game references are cleared when the offer is made and
    /// restored if it is declined or times out. An AI opponent always accepts.
    pub async fn offer_draw(
        &self,
        player: &PlayerIdentity,
    ) -> Result<DrawOffer, GameSessionServiceError> {
        let game = self.active_game(player).await?;
        let opponent = game
            .opponent_of(player)
            .cloned()
            .ok_or(GameSessionServiceError::NoActiveGame)?;

        if opponent.is_ai() {
            info!(game_id = %game.game_id, model = %opponent, "AI accepts the draw");
            let settled = self.settle(&game, GameStatus::Draw, None).await?;
            return Ok(DrawOffer::Settled(settled));
        }

        for participant in [player, &opponent] {
            self.players
                .release_current_game(participant, &game.game_id)
                .await?;
        }

        let message = OutgoingMessage::text(format!(
            "{}, {} offers a draw.",
            opponent.mention(),
            player.mention()
        ))
        .with_prompt(&opponent);
        let prompt = match self.presenter.post_message(&game.channel, message).await {
            Ok(prompt) => prompt,
            Err(e) => {
                self.restore_current_games(&game).await?;
                return Err(e.into());
            }
        };

        info!(game_id = %game.game_id, player = %player, "Draw offered");
        Ok(DrawOffer::Pending(PendingDrawOffer {
            game,
            offered_by: player.clone(),
            opponent,
            prompt,
        }))
    }

    /// Waits for the opponent's answer to a draw offer.
    pub async fn resolve_draw_offer(
        &self,
        offer: PendingDrawOffer,
    ) -> Result<DrawOutcome, GameSessionServiceError> {
        let choice = match self
            .presenter
            .await_response(&offer.prompt, &offer.opponent, self.response_timeout)
            .await
        {
            Ok(choice) => choice,
            Err(e) => {
                warn!(game_id = %offer.game.game_id, error = %e, "Draw prompt failed, treating as timeout");
                None
            }
        };
        if let Err(e) = self.presenter.delete_message(&offer.prompt).await {
            warn!(error = %e, "Could not delete draw prompt");
        }

        let (outcome, notice) = match choice {
            Some(PromptChoice::Accept) => {
                info!(game_id = %offer.game.game_id, "Draw accepted");
                let settled = self.settle(&offer.game, GameStatus::Draw, None).await?;
                return Ok(DrawOutcome::Accepted(settled));
            }
            Some(PromptChoice::Decline) => (DrawOutcome::Declined, "Draw offer declined."),
            None => (DrawOutcome::TimedOut, "Draw offer timed out."),
        };

        info!(game_id = %offer.game.game_id, ?outcome, "Draw offer not accepted");
        self.restore_current_games(&offer.game).await?;
        self.notify(&offer.game.channel, notice).await;
        Ok(outcome)
    }

    /// Offers a draw and waits for the answer.
    pub async fn offer_draw_and_wait(
        &self,
        player: &PlayerIdentity,
    ) -> Result<DrawOutcome, GameSessionServiceError> {
        match self.offer_draw(player).await? {
            DrawOffer::Settled(game) => Ok(DrawOutcome::Accepted(game)),
            DrawOffer::Pending(offer) => self.resolve_draw_offer(offer).await,
        }
    }

    /// Finished games, newest first.
    pub async fn history(
        &self,
        player: &PlayerIdentity,
    ) -> Result<Vec<GameSummary>, GameSessionServiceError> {
        let mut summaries: Vec<GameSummary> = self
            .games
            .find_games_for_player(player)
            .await?
            .iter()
            .filter(|game| !game.is_active())
            .filter_map(|game| game.summary_for(player))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    pub async fn player_stats(
        &self,
        player: &PlayerIdentity,
    ) -> Result<PlayerStats, GameSessionServiceError> {
        let record = self.players.get_player(player).await?;
        let history = self.history(player).await?;
        let count = |result: GameResult| history.iter().filter(|s| s.result == result).count();

        Ok(PlayerStats {
            player: record.identity.clone(),
            display_name: record.display_name.clone(),
            rating: record.rating,
            wins: count(GameResult::Win),
            losses: count(GameResult::Loss),
            draws: count(GameResult::Draw),
        })
    }

    fn side_of(&self, game: &Game, player: &PlayerIdentity) -> Result<Side, GameSessionServiceError> {
        game.side_of(player).ok_or_else(|| {
            GameSessionServiceError::InconsistentState(format!(
                "{} is not a participant of {}",
                player, game.game_id
            ))
        })
    }

    /// Applies a move and persists the result against the position it was computed from.
    async fn advance(
        &self,
        game: &Game,
        position: &Position,
        request: &MoveRequest,
        mover: &PlayerIdentity,
    ) -> Result<(Game, Position, LegalMove), GameSessionServiceError> {
        let (next, played) = position.apply_move(request)?;
        let mut updated = game.clone();
        self.chess.record_move(&mut updated, &next, &played);

        if !self.games.update_position(&updated, &game.fen).await? {
            warn!(game_id = %game.game_id, player = %mover, "Position changed underneath a move");
            return Err(GameSessionServiceError::ConcurrentUpdate);
        }

        info!(
            game_id = %game.game_id,
            player = %mover,
            mv = %played.uci(),
            fen = %updated.fen,
            "Move applied"
        );
        Ok((updated, next, played))
    }

    /// Settles a game whose position is terminal. On checkmate the side that just moved wins.
    async fn finalize(
        &self,
        game: &Game,
        position: &Position,
        terminal: TerminalStatus,
    ) -> Result<Game, GameSessionServiceError> {
        let winner = match terminal {
            TerminalStatus::Checkmate => {
                Some(game.player_on(position.side_to_move().opposite()).clone())
            }
            _ => None,
        };
        self.settle(game, terminal.game_status(), winner).await
    }

    /// Moves the game to its terminal status. Ratings change only for the caller that wins
    /// the conditional finish, so they are applied once per game.
    async fn settle(
        &self,
        game: &Game,
        status: GameStatus,
        winner: Option<PlayerIdentity>,
    ) -> Result<Game, GameSessionServiceError> {
        if !self
            .games
            .finish_game(&game.game_id, status, winner.clone())
            .await?
        {
            let current = self.games.get_game(&game.game_id).await?;
            let finished_as = current.map_or(status, |g| g.status);
            debug!(game_id = %game.game_id, %finished_as, "Game was already settled");
            return Err(GameSessionServiceError::GameOver(finished_as));
        }

        // The game is final from here on, so nothing below may leave a player pointing at it.
        let humans: Vec<&PlayerIdentity> =
            game.players().into_iter().filter(|p| !p.is_ai()).collect();
        self.release_all(&humans, &game.game_id).await;

        if status.is_decisive() {
            if let Some(winner) = &winner {
                if let Some(loser) = game.opponent_of(winner) {
                    self.ratings.adjust_ratings(winner, loser).await?;
                }
            }
        }

        info!(
            game_id = %game.game_id,
            %status,
            winner = ?winner.as_ref().map(|w| w.to_string()),
            "Game finished"
        );

        let mut settled = game.clone();
        settled.status = status;
        settled.winner = winner;
        match self.chess.load_game(&settled) {
            Ok(position) => {
                let caption = result_caption(&settled);
                self.publish_board(&mut settled, &position, caption).await;
            }
            Err(e) => warn!(game_id = %settled.game_id, error = %e, "Could not render final board"),
        }
        Ok(settled)
    }

    /// Re-points both players at a game whose draw offer fell through. A player who was
    /// pulled into another game while the offer was open keeps that game.
    async fn restore_current_games(&self, game: &Game) -> Result<(), GameSessionServiceError> {
        let still_active = self
            .games
            .get_game(&game.game_id)
            .await?
            .map_or(false, |g| g.is_active());
        if !still_active {
            return Ok(());
        }

        for player in game.players().into_iter().filter(|p| !p.is_ai()) {
            if !self.players.claim_current_game(player, &game.game_id).await? {
                warn!(
                    game_id = %game.game_id,
                    player = %player,
                    "Player joined another game while a draw offer was open"
                );
            }
        }
        Ok(())
    }

    async fn release_all(&self, players: &[&PlayerIdentity], game_id: &str) {
        for player in players {
            if let Err(e) = self.players.release_current_game(player, game_id).await {
                warn!(player = %player, game_id, error = %e, "Could not release claimed player");
            }
        }
    }

    /// Renders the position onto the game's board message. Presentation failures are logged
    /// and never undo a persisted move.
    async fn publish_board(&self, game: &mut Game, position: &Position, caption: String) {
        let attachment = match self.renderer.render(position) {
            Ok(attachment) => attachment,
            Err(e) => {
                warn!(game_id = %game.game_id, error = %e, "Board rendering failed");
                self.notify(&game.channel, &caption).await;
                return;
            }
        };
        let message = OutgoingMessage::text(caption).with_attachment(attachment);

        if let Some(existing) = game.board_message.clone() {
            match self.presenter.edit_message(&existing, message.clone()).await {
                Ok(()) => return,
                Err(e) => warn!(
                    game_id = %game.game_id,
                    error = %e,
                    "Board message is gone, posting a new one"
                ),
            }
        }

        match self.presenter.post_message(&game.channel, message).await {
            Ok(reference) => {
                if let Err(e) = self.games.set_board_message(&game.game_id, &reference).await {
                    warn!(game_id = %game.game_id, error = %e, "Could not store board message");
                }
                game.board_message = Some(reference);
            }
            Err(e) => warn!(game_id = %game.game_id, error = %e, "Could not post board"),
        }
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

fn move_caption(mover: &PlayerIdentity, played: &LegalMove, next: &PlayerIdentity) -> String {
    format!(
        "{} played {}. {} to move.",
        mover.mention(),
        played.uci(),
        next.mention()
    )
}

fn result_caption(game: &Game) -> String {
    let winner = game.winner.as_ref().map(PlayerIdentity::mention);
    match (game.status, winner) {
        (GameStatus::Checkmate, Some(winner)) => format!("Checkmate! {} wins.", winner),
        (GameStatus::Resign, Some(winner)) => {
            let loser = game
                .winner
                .as_ref()
                .and_then(|w| game.opponent_of(w))
                .map(PlayerIdentity::mention)
                .unwrap_or_default();
            format!("{} resigned. {} wins.", loser, winner)
        }
        (GameStatus::Stalemate, _) => "Stalemate! The game is a draw.".to_string(),
        (GameStatus::ThreefoldRepetition, _) => "Draw by threefold repetition.".to_string(),
        (GameStatus::InsufficientMaterial, _) => "Draw by insufficient material.".to_string(),
        _ => "The game ended in a draw.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::STARTING_FEN;
    use crate::repositories::game_repository::MockGameRepository;
    use crate::models::player::Player;
    use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
    use crate::repositories::memory::{InMemoryGameRepository, InMemoryPlayerRepository};
    use crate::repositories::player_repository::PlayerRepository;
    use async_trait::async_trait;
    use crate::services::errors::presentation_errors::PresentationError;
    use crate::services::presentation_service::{
        MessageBoard, MockBoardRenderer, TextBoardRenderer,
    };
    use crate::services::response_broker::Delivery;
    use crate::models::interaction::Interaction;

    const CHANNEL: &str = "channel-1";

    struct Fixture {
        service: Arc<GameSessionService>,
        games: Arc<InMemoryGameRepository>,
        players: Arc<PlayerService>,
        board: Arc<MessageBoard>,
    }

    fn fixture_with_renderer(renderer: Arc<dyn BoardRenderer + Send + Sync>) -> Fixture {
        fixture_with_parts(renderer, Arc::new(InMemoryPlayerRepository::new()))
    }

    fn fixture_with_parts(
        renderer: Arc<dyn BoardRenderer + Send + Sync>,
        player_repository: Arc<dyn PlayerRepository + Send + Sync>,
    ) -> Fixture {
        let games = Arc::new(InMemoryGameRepository::new());
        let players = Arc::new(PlayerService::new(player_repository));
        let ratings = Arc::new(RatingService::new(players.clone()));
        let ai = Arc::new(AiMoveService::new(None, vec!["Phi-4".to_string()]));
        let board = Arc::new(MessageBoard::new());
        let service = Arc::new(GameSessionService::new(
            games.clone(),
            players.clone(),
            ratings,
            ai,
            board.clone(),
            renderer,
            Duration::from_secs(60),
        ));
        Fixture {
            service,
            games,
            players,
            board,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_renderer(Arc::new(TextBoardRenderer::new()))
    }

    fn white() -> PlayerIdentity {
        PlayerIdentity::human("1")
    }

    fn black() -> PlayerIdentity {
        PlayerIdentity::human("2")
    }

    async fn started(fixture: &Fixture) -> Game {
        for player in [white(), black()] {
            fixture.players.get_or_create(&player, None, None).await.unwrap();
        }
        fixture
            .service
            .start_game(&white(), &black(), CHANNEL)
            .await
            .unwrap()
    }

    async fn play(fixture: &Fixture, moves: &[(&PlayerIdentity, &str)]) -> MoveOutcome {
        let mut last = None;
        for (player, uci) in moves {
            let request = MoveRequest::from_uci(uci).unwrap();
            last = Some(fixture.service.submit_move(player, &request).await.unwrap());
        }
        last.unwrap()
    }

    #[tokio::test]
    async fn test_start_game_claims_players_and_renders() {
        let fixture = fixture();
        let game = started(&fixture).await;

        assert_eq!(game.fen, STARTING_FEN);
        assert!(game.board_message.is_some());
        for player in [white(), black()] {
            let record = fixture.players.get_player(&player).await.unwrap();
            assert_eq!(record.current_game.as_deref(), Some(game.game_id.as_str()));
        }
        let messages = fixture.board.messages(CHANNEL).await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].attachment.is_some());
    }

    #[tokio::test]
    async fn test_start_game_with_busy_player_releases_claims() {
        let fixture = fixture();
        for player in [white(), black()] {
            fixture.players.get_or_create(&player, None, None).await.unwrap();
        }
        fixture
            .players
            .set_current_game(&black(), Some("elsewhere".to_string()))
            .await
            .unwrap();

        let result = fixture.service.start_game(&white(), &black(), CHANNEL).await;

        assert!(matches!(result, Err(GameSessionServiceError::AlreadyInGame(p)) if p == black()));
        assert!(fixture.players.get_player(&white()).await.unwrap().is_available());
        assert!(fixture.games.all_games().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_move_without_game() {
        let fixture = fixture();
        let result = fixture
            .service
            .submit_move(&white(), &MoveRequest::new("e2", "e4"))
            .await;
        assert!(matches!(result, Err(GameSessionServiceError::NoActiveGame)));
    }

    #[tokio::test]
    async fn test_not_your_turn_leaves_position_unchanged() {
        let fixture = fixture();
        let game = started(&fixture).await;

        let result = fixture
            .service
            .submit_move(&black(), &MoveRequest::new("e7", "e5"))
            .await;

        assert!(matches!(result, Err(GameSessionServiceError::NotYourTurn)));
        let stored = fixture.games.get_game(&game.game_id).await.unwrap().unwrap();
        assert_eq!(stored.fen, STARTING_FEN);
        assert!(stored.moves.is_empty());
    }

    #[tokio::test]
    async fn test_illegal_move_is_rejected() {
        let fixture = fixture();
        let game = started(&fixture).await;

        let result = fixture
            .service
            .submit_move(&white(), &MoveRequest::new("e2", "e5"))
            .await;

        assert!(matches!(result, Err(GameSessionServiceError::IllegalMove(_))));
        let stored = fixture.games.get_game(&game.game_id).await.unwrap().unwrap();
        assert_eq!(stored.fen, STARTING_FEN);
    }

    #[tokio::test]
    async fn test_move_passes_turn_and_updates_board() {
        let fixture = fixture();
        let game = started(&fixture).await;

        let outcome = play(&fixture, &[(&white(), "e2e4")]).await;

        assert_eq!(outcome.status, GameStatus::Active);
        assert_eq!(outcome.game.moves, vec!["e2e4".to_string()]);
        assert_eq!(outcome.game.board_message, game.board_message);
        let messages = fixture.board.messages(CHANNEL).await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].edited);
        assert!(messages[0].content.contains("played e2e4"));

        let black_moves = fixture.service.legal_moves_for(&black(), None).await.unwrap();
        assert_eq!(black_moves.len(), 20);
        assert!(matches!(
            fixture.service.legal_moves_for(&white(), None).await,
            Err(GameSessionServiceError::NotYourTurn)
        ));
    }

    #[tokio::test]
    async fn test_checkmate_settles_game_and_ratings() {
        let fixture = fixture();
        started(&fixture).await;

        let outcome = play(
            &fixture,
            &[
                (&white(), "f2f3"),
                (&black(), "e7e5"),
                (&white(), "g2g4"),
                (&black(), "d8h4"),
            ],
        )
        .await;

        assert_eq!(outcome.status, GameStatus::Checkmate);
        assert_eq!(outcome.game.winner, Some(black()));
        let winner = fixture.players.get_player(&black()).await.unwrap();
        let loser = fixture.players.get_player(&white()).await.unwrap();
        assert_eq!(winner.rating, 1216.0);
        assert_eq!(loser.rating, 1184.0);
        assert!(winner.is_available() && loser.is_available());
        assert!(matches!(
            fixture.service.submit_move(&white(), &MoveRequest::new("a2", "a3")).await,
            Err(GameSessionServiceError::NoActiveGame)
        ));
    }

    #[tokio::test]
    async fn test_unsettled_terminal_position_is_settled_before_moving() {
        let fixture = fixture();
        let game = started(&fixture).await;
        let mut mated = game.clone();
        mated.fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3".to_string();
        assert!(fixture.games.update_position(&mated, &game.fen).await.unwrap());

        let result = fixture
            .service
            .submit_move(&white(), &MoveRequest::new("a2", "a3"))
            .await;

        assert!(matches!(
            result,
            Err(GameSessionServiceError::GameOver(GameStatus::Checkmate))
        ));
        let stored = fixture.games.get_game(&game.game_id).await.unwrap().unwrap();
        assert_eq!(stored.winner, Some(black()));
        assert_eq!(fixture.players.get_player(&black()).await.unwrap().rating, 1216.0);
    }

    #[tokio::test]
    async fn test_two_active_games_is_an_inconsistency() {
        let fixture = fixture();
        started(&fixture).await;
        let stray = Game::new(white(), PlayerIdentity::human("3"), CHANNEL);
        fixture.games.create_game(&stray).await.unwrap();

        let result = fixture
            .service
            .submit_move(&white(), &MoveRequest::new("e2", "e4"))
            .await;

        assert!(matches!(
            result,
            Err(GameSessionServiceError::InconsistentState(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_update_is_reported() {
        let game = Game::new(white(), black(), CHANNEL);
        let mut games = MockGameRepository::new();
        let stored = game.clone();
        games
            .expect_find_active_games()
            .returning(move |_| Ok(vec![stored.clone()]));
        games
            .expect_update_position()
            .times(1)
            .returning(|_, _| Ok(false));

        let players = Arc::new(PlayerService::new(Arc::new(InMemoryPlayerRepository::new())));
        let service = GameSessionService::new(
            Arc::new(games),
            players.clone(),
            Arc::new(RatingService::new(players)),
            Arc::new(AiMoveService::new(None, vec![])),
            Arc::new(MessageBoard::new()),
            Arc::new(TextBoardRenderer::new()),
            Duration::from_secs(60),
        );

        let result = service
            .submit_move(&white(), &MoveRequest::new("e2", "e4"))
            .await;

        assert!(matches!(result, Err(GameSessionServiceError::ConcurrentUpdate)));
    }

    #[tokio::test]
    async fn test_rendering_failure_does_not_undo_move() {
        let mut renderer = MockBoardRenderer::new();
        renderer
            .expect_render()
            .returning(|_| Err(PresentationError::Rendering("no fonts".to_string())));
        let fixture = fixture_with_renderer(Arc::new(renderer));
        let game = started(&fixture).await;

        let outcome = play(&fixture, &[(&white(), "d2d4")]).await;

        assert_eq!(outcome.game.moves, vec!["d2d4".to_string()]);
        let stored = fixture.games.get_game(&game.game_id).await.unwrap().unwrap();
        assert_eq!(stored.moves, vec!["d2d4".to_string()]);
    }

    #[tokio::test]
    async fn test_ai_game_replies_after_human_move() {
        let fixture = fixture();
        let game = fixture
            .service
            .start_ai_game(&white(), "Phi-4", CHANNEL)
            .await
            .unwrap();
        assert_eq!(game.player2, PlayerIdentity::ai("Phi-4"));

        let outcome = play(&fixture, &[(&white(), "e2e4")]).await;

        let reply = outcome.reply.unwrap();
        assert_eq!(reply.color, Side::Black);
        assert_eq!(outcome.game.moves.len(), 2);
        assert_eq!(outcome.game.moves[1], reply.uci());
        let ai_record = fixture
            .players
            .get_player(&PlayerIdentity::ai("Phi-4"))
            .await
            .unwrap();
        assert!(ai_record.current_game.is_none());
    }

    #[tokio::test]
    async fn test_ai_game_rejects_unknown_model_and_busy_player() {
        let fixture = fixture();
        assert!(matches!(
            fixture.service.start_ai_game(&white(), "gpt-5", CHANNEL).await,
            Err(GameSessionServiceError::UnknownModel(_))
        ));

        started(&fixture).await;
        assert!(matches!(
            fixture.service.start_ai_game(&white(), "Phi-4", CHANNEL).await,
            Err(GameSessionServiceError::AlreadyInGame(_))
        ));
    }

    #[tokio::test]
    async fn test_resign_awards_opponent() {
        let fixture = fixture();
        started(&fixture).await;

        let game = fixture.service.resign(&white()).await.unwrap();

        assert_eq!(game.status, GameStatus::Resign);
        assert_eq!(game.winner, Some(black()));
        assert_eq!(fixture.players.get_player(&black()).await.unwrap().rating, 1216.0);
        assert_eq!(fixture.players.get_player(&white()).await.unwrap().rating, 1184.0);
        assert!(matches!(
            fixture.service.resign(&white()).await,
            Err(GameSessionServiceError::NoActiveGame)
        ));
    }

    /// Player store whose rating writes always fail.
    #[derive(Default)]
    struct RatingOutage {
        inner: InMemoryPlayerRepository,
    }

    #[async_trait]
    impl PlayerRepository for RatingOutage {
        async fn get_player(
            &self,
            identity: &PlayerIdentity,
        ) -> Result<Option<Player>, PlayerRepositoryError> {
            self.inner.get_player(identity).await
        }

        async fn create_player_if_absent(
            &self,
            player: &Player,
        ) -> Result<bool, PlayerRepositoryError> {
            self.inner.create_player_if_absent(player).await
        }

        async fn update_profile(
            &self,
            identity: &PlayerIdentity,
            display_name: Option<String>,
            avatar: Option<String>,
        ) -> Result<(), PlayerRepositoryError> {
            self.inner.update_profile(identity, display_name, avatar).await
        }

        async fn update_rating(
            &self,
            _identity: &PlayerIdentity,
            _rating: f64,
        ) -> Result<(), PlayerRepositoryError> {
            Err(PlayerRepositoryError::DynamoDb("throttled".to_string()))
        }

        async fn compare_and_set_current_game(
            &self,
            identity: &PlayerIdentity,
            expected: Option<String>,
            new: Option<String>,
        ) -> Result<bool, PlayerRepositoryError> {
            self.inner
                .compare_and_set_current_game(identity, expected, new)
                .await
        }

        async fn set_current_game(
            &self,
            identity: &PlayerIdentity,
            game_id: Option<String>,
        ) -> Result<(), PlayerRepositoryError> {
            self.inner.set_current_game(identity, game_id).await
        }

        async fn list_players(&self) -> Result<Vec<Player>, PlayerRepositoryError> {
            self.inner.list_players().await
        }
    }

    #[tokio::test]
    async fn test_failed_rating_write_still_frees_players() {
        let fixture = fixture_with_parts(
            Arc::new(TextBoardRenderer::new()),
            Arc::new(RatingOutage::default()),
        );
        let game = started(&fixture).await;

        let result = fixture.service.resign(&white()).await;

        assert!(matches!(result, Err(GameSessionServiceError::PlayerError(_))));
        let stored = fixture.games.get_game(&game.game_id).await.unwrap().unwrap();
        assert_eq!(stored.status, GameStatus::Resign);
        for player in [white(), black()] {
            let record = fixture.players.get_player(&player).await.unwrap();
            assert_eq!(record.current_game, None);
        }
        assert!(matches!(
            fixture.service.resign(&white()).await,
            Err(GameSessionServiceError::NoActiveGame)
        ));
        fixture
            .service
            .start_game(&white(), &black(), CHANNEL)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ai_accepts_draw_without_rating_change() {
        let fixture = fixture();
        fixture
            .service
            .start_ai_game(&white(), "Phi-4", CHANNEL)
            .await
            .unwrap();

        let outcome = fixture.service.offer_draw_and_wait(&white()).await.unwrap();

        match outcome {
            DrawOutcome::Accepted(game) => {
                assert_eq!(game.status, GameStatus::Draw);
                assert_eq!(game.winner, None);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let record = fixture.players.get_player(&white()).await.unwrap();
        assert_eq!(record.rating, 1200.0);
        assert!(record.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_draw_restores_current_games() {
        let fixture = fixture();
        let game = started(&fixture).await;

        let offer = match fixture.service.offer_draw(&white()).await.unwrap() {
            DrawOffer::Pending(offer) => offer,
            DrawOffer::Settled(_) => panic!("human opponents must be asked"),
        };
        assert!(fixture.players.get_player(&white()).await.unwrap().is_available());

        let prompt_id = offer.prompt.message_id.clone();
        let waiter = {
            let service = fixture.service.clone();
            tokio::spawn(async move { service.resolve_draw_offer(offer).await })
        };
        let delivery = fixture
            .board
            .respond(&Interaction {
                message_id: prompt_id,
                user: black(),
                choice: PromptChoice::Decline,
            })
            .await;
        assert_eq!(delivery, Delivery::Delivered);

        assert_eq!(waiter.await.unwrap().unwrap(), DrawOutcome::Declined);
        for player in [white(), black()] {
            let record = fixture.players.get_player(&player).await.unwrap();
            assert_eq!(record.current_game.as_deref(), Some(game.game_id.as_str()));
        }
        let stored = fixture.games.get_game(&game.game_id).await.unwrap().unwrap();
        assert!(stored.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_draw_offer_times_out() {
        let fixture = fixture();
        let game = started(&fixture).await;

        let outcome = fixture.service.offer_draw_and_wait(&white()).await.unwrap();

        assert_eq!(outcome, DrawOutcome::TimedOut);
        let record = fixture.players.get_player(&black()).await.unwrap();
        assert_eq!(record.current_game.as_deref(), Some(game.game_id.as_str()));
        let messages = fixture.board.messages(CHANNEL).await;
        assert!(messages.iter().any(|m| m.content == "Draw offer timed out."));
        assert!(messages.iter().all(|m| m.choices.is_empty()));
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let fixture = fixture();
        started(&fixture).await;
        fixture.service.resign(&black()).await.unwrap();
        fixture
            .service
            .start_game(&white(), &black(), CHANNEL)
            .await
            .unwrap();

        let history = fixture.service.history(&white()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, GameResult::Win);
        assert_eq!(history[0].opponent, black());

        let stats = fixture.service.player_stats(&black()).await.unwrap();
        assert_eq!((stats.wins, stats.losses, stats.draws), (0, 1, 0));
        assert_eq!(stats.rating, 1184.0);
    }

    #[tokio::test]
    async fn test_show_game() {
        let fixture = fixture();
        started(&fixture).await;
        play(&fixture, &[(&white(), "e2e4")]).await;

        let view = fixture.service.show_game(&black()).await.unwrap();

        assert_eq!(view.side_to_move, Side::Black);
        assert_eq!(view.board.file_name, "board.txt");
    }
}
