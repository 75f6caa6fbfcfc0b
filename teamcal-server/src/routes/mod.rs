pub mod sync;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use teamcal_core::TeamcalError;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert core errors to HTTP responses.
pub struct AppError(TeamcalError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TeamcalError::NotFound(_) => StatusCode::NOT_FOUND,
            TeamcalError::Transport { .. } | TeamcalError::Parse(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<TeamcalError> for AppError {
    fn from(err: TeamcalError) -> Self {
        Self(err)
    }
}
