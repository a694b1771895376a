pub mod errors;
pub mod game_repository;
pub mod match_request_repository;
pub mod memory;
pub mod player_repository;
