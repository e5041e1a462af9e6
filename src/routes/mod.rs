pub mod health;
pub mod playlist;
pub mod proxy;
pub mod xtream;

use axum::{http::StatusCode, Json};

use crate::AppState;

/// Error shape returned by every handler
pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(serde_json::json!({ "error": message })))
}

/// Check client credentials against the proxy's own
pub fn authorize(state: &AppState, username: &str, password: &str) -> Result<(), ApiError> {
    if username == state.config.user && password == state.config.password {
        Ok(())
    } else {
        tracing::warn!("Rejected request with invalid credentials for user {:?}", username);
        Err(api_error(StatusCode::UNAUTHORIZED, "Invalid credentials"))
    }
}
