use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Request-terminal errors, rendered as `{"error": "..."}` with the matching
/// status. Messages stay generic: internal detail is logged server-side and
/// never echoed to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bearer route hit without an `Authorization` header.
    #[error("Authorization header required")]
    MissingAuthorization,
    /// Bearer token failed verification (bad signature, malformed, expired).
    #[error("Invalid token")]
    InvalidToken,
    /// Login failed. Unknown user and wrong password share this variant so
    /// the response cannot be used for username enumeration.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Basic credentials missing, malformed, or wrong.
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(&'static str),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingAuthorization
            | ApiError::InvalidToken
            | ApiError::InvalidCredentials
            | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn challenges_basic(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        let mut response = (self.status(), body).into_response();
        if self.challenges_basic() {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"Restricted\""),
            );
        }
        response
    }
}
