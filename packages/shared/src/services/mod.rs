pub mod ai_move_service;
pub mod chess_service;
pub mod errors;
pub mod game_session_service;
pub mod match_request_service;
pub mod player_service;
pub mod presentation_service;
pub mod rating_service;
pub mod response_broker;
