use std::sync::Arc;
use tracing::info;

use crate::models::player::PlayerIdentity;
use crate::services::errors::player_service_errors::PlayerServiceError;
use crate::services::player_service::PlayerService;

pub const K_FACTOR: f64 = 32.0;

/// Expected score of a player rated `rating` against `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// New (winner, loser) ratings after a decisive game, unrounded.
pub fn elo_update(winner: f64, loser: f64) -> (f64, f64) {
    let expected_winner = expected_score(winner, loser);
    let expected_loser = expected_score(loser, winner);
    (
        winner + K_FACTOR * (1.0 - expected_winner),
        loser + K_FACTOR * (0.0 - expected_loser),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingChange {
    pub winner_before: f64,
    pub winner_after: f64,
    pub loser_before: f64,
    pub loser_after: f64,
}

pub struct RatingService {
    players: Arc<PlayerService>,
}

impl RatingService {
    pub fn new(players: Arc<PlayerService>) -> Self {
        RatingService { players }
    }

    /// Applies one decisive result. Callers guarantee this runs once per game.
    pub async fn adjust_ratings(
        &self,
        winner: &PlayerIdentity,
        loser: &PlayerIdentity,
    ) -> Result<RatingChange, PlayerServiceError> {
        let winner_before = self.players.get_or_create(winner, None, None).await?.rating;
        let loser_before = self.players.get_or_create(loser, None, None).await?.rating;

        let (winner_rating, loser_rating) = elo_update(winner_before, loser_before);
        let winner_after = self.players.adjust_rating(winner, winner_rating).await?;
        let loser_after = self.players.adjust_rating(loser, loser_rating).await?;

        info!(
            winner = %winner,
            loser = %loser,
            winner_before,
            winner_after,
            loser_before,
            loser_after,
            "Ratings adjusted"
        );

        Ok(RatingChange {
            winner_before,
            winner_after,
            loser_before,
            loser_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::InMemoryPlayerRepository;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_equal_ratings_expect_half() {
        assert_eq!(expected_score(1200.0, 1200.0), 0.5);
    }

    #[rstest]
    #[case(1200.0, 1200.0, 1216.0, 1184.0)]
    #[case(1400.0, 1000.0, 1402.91, 997.09)]
    #[case(1000.0, 1400.0, 1029.09, 1370.91)]
    fn test_elo_update(
        #[case] winner: f64,
        #[case] loser: f64,
        #[case] expected_winner: f64,
        #[case] expected_loser: f64,
    ) {
        let (w, l) = elo_update(winner, loser);
        assert!((w - expected_winner).abs() < 0.01, "winner {}", w);
        assert!((l - expected_loser).abs() < 0.01, "loser {}", l);
    }

    #[tokio::test]
    async fn test_adjust_ratings_persists_rounded_values() {
        let players = Arc::new(PlayerService::new(Arc::new(InMemoryPlayerRepository::new())));
        let service = RatingService::new(players.clone());
        let winner = PlayerIdentity::human("1");
        let loser = PlayerIdentity::ai("gpt-4o-mini");

        let change = service.adjust_ratings(&winner, &loser).await.unwrap();

        assert_eq!(change.winner_after, 1216.0);
        assert_eq!(change.loser_after, 1184.0);
        assert_eq!(players.get_player(&winner).await.unwrap().rating, 1216.0);
        assert_eq!(players.get_player(&loser).await.unwrap().rating, 1184.0);
    }

    proptest! {
        #[test]
        fn prop_rating_points_are_conserved(winner in 100.0f64..3000.0, loser in 100.0f64..3000.0) {
            let (w, l) = elo_update(winner, loser);
            prop_assert!(w > winner);
            prop_assert!(l < loser);
            prop_assert!(((w - winner) - (loser - l)).abs() < 1e-9);
        }
    }
}
