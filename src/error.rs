use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// Every failure a handler can return. Mapped to a status code and a stable
/// machine-readable code at the HTTP edge.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("email already registered")]
    EmailExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("no user for identity {0}")]
    UserNotFound(String),

    #[error("prediction service unavailable: {0}")]
    Upstream(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::EmailExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UserNotFound(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::EmailExists => "EMAIL_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Upstream(_) => "UPSTREAM_UNAVAILABLE",
            AppError::UserNotFound(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::EmailExists => "Email address is already registered".into(),
            AppError::InvalidCredentials => "Invalid email or password".into(),
            AppError::Unauthorized => "Authentication required".into(),
            AppError::Upstream(_) => "Prediction service unavailable".into(),
            AppError::UserNotFound(_) | AppError::Internal(_) => {
                "An internal server error occurred".into()
            }
        }
    }
}

/// Body-limit hits keep their 413; every other malformed body is a 400.
fn rejected_body(status: StatusCode, text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(text)
    } else {
        AppError::Validation(text)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        rejected_body(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        rejected_body(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        rejected_body(e.status(), e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::UserNotFound(email) => {
                error!(%email, "identity does not resolve to a stored user")
            }
            AppError::Upstream(detail) => error!(%detail, "prediction service call failed"),
            AppError::Internal(e) => error!(error = ?e, "internal error"),
            _ => {}
        }

        let body = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.client_message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PayloadTooLarge("x".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::EmailExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::UserNotFound("a@b.c".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Upstream("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (status, body) =
            body_json(AppError::Internal(anyhow::anyhow!("pool timed out at 10.0.0.7"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("10.0.0.7"));

        let (_, body) = body_json(AppError::UserNotFound("ghost@example.com".into())).await;
        assert!(!body.to_string().contains("ghost@example.com"));
    }

    #[tokio::test]
    async fn validation_message_is_passed_through() {
        let (status, body) = body_json(AppError::Validation("name is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "name is required");
    }
}
