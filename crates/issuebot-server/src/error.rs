use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use issuebot_core::BotError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit 400/401 errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

#[derive(Debug)]
struct UnauthorizedError(String);

impl std::fmt::Display for UnauthorizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnauthorizedError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(UnauthorizedError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequestError>().is_some() {
            StatusCode::BAD_REQUEST
        } else if self.0.downcast_ref::<UnauthorizedError>().is_some() {
            StatusCode::UNAUTHORIZED
        } else if let Some(e) = self.0.downcast_ref::<BotError>() {
            match e {
                BotError::NotFound(_) | BotError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
                BotError::Auth(_) | BotError::Upstream(_) => StatusCode::BAD_GATEWAY,
                BotError::Json(_) | BotError::Yaml(_) => StatusCode::BAD_REQUEST,
                BotError::InvalidRegex { .. }
                | BotError::UnknownActionType(_)
                | BotError::MissingMailer(_)
                | BotError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
