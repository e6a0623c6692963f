use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{event, Level};

use crate::{auth::AuthError, config::ConfigError, dtos::ApiError, repositories::RepositoryError};

/// Errors surfaced by request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Repository(e) | AppError::Auth(AuthError::Repository(e)) => {
                repository_status(e)
            }
            AppError::Auth(AuthError::PasswordHash | AuthError::TokenEncoding(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Auth(AuthError::EmptyUsername) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::NotFound { .. } => StatusCode::NOT_FOUND,
        RepositoryError::DuplicateUsername(_) => StatusCode::CONFLICT,
        RepositoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            event!(Level::ERROR, error = %self, "request failed");
        } else {
            event!(Level::DEBUG, error = %self, status = status.as_u16(), "request rejected");
        }

        // internal details stay in the logs
        let message = if status.is_server_error() {
            String::from("internal server error")
        } else {
            self.to_string()
        };

        (status, Json(ApiError { error: message })).into_response()
    }
}

/// Failures that prevent the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("mongodb error: {0}")]
    MongoDb(#[from] mongodb::error::Error),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_statuses() {
        let cases = [
            (
                AppError::Repository(RepositoryError::NotFound {
                    entity: "CookieStand",
                    id: 4,
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Repository(RepositoryError::Storage(String::from("down"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Auth(AuthError::Repository(RepositoryError::DuplicateUsername(
                    String::from("testuser1"),
                ))),
                StatusCode::CONFLICT,
            ),
            (AppError::Auth(AuthError::MissingCredentials), StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::RevokedSession), StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::PasswordHash), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::BadRequest(String::from("nope")), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{}", error);
        }
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let response =
            AppError::Repository(RepositoryError::Storage(String::from("secret dsn"))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "internal server error");
    }
}
