use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, state::AppState};
use shared::models::player::PlayerIdentity;

const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";
const USER_AVATAR_HEADER: &str = "x-user-avatar";

/// The human issuing the request, as identified by the chat transport. Extracting it records the
/// player on first contact and refreshes their profile fields.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: PlayerIdentity,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Result<Option<String>, ApiError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
            .map_err(|_| ApiError::BadRequest(format!("Invalid {} header", name))),
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .map_err(|_| ApiError::Unauthorized)?
            .ok_or(ApiError::Unauthorized)?;

        let caller = Caller {
            identity: PlayerIdentity::human(user_id),
            display_name: header(parts, USER_NAME_HEADER)?,
            avatar: header(parts, USER_AVATAR_HEADER)?,
        };
        state
            .player_service
            .get_or_create(
                &caller.identity,
                caller.display_name.clone(),
                caller.avatar.clone(),
            )
            .await?;

        Ok(caller)
    }
}
