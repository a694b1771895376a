pub mod game;
pub mod interaction;
pub mod match_request;
pub mod moves;
pub mod player;
