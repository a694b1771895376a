pub mod ai_move_service_errors;
pub mod chess_service_errors;
pub mod game_session_service_errors;
pub mod match_request_service_errors;
pub mod player_service_errors;
pub mod presentation_errors;
