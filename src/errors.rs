use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::Envelope;

/// Machine-readable failure kind carried in every error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateIdentity,
    NotFound,
    WrongSecret,
    InvalidCredential,
    Expired,
    LimitReached,
    InvalidSignature,
    Validation,
    ProviderError,
    StorageError,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account already exists: {0}")]
    DuplicateIdentity(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Wrong password")]
    WrongSecret,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Credential expired")]
    Expired,

    #[error("Daily limit of {0} messages reached. Buy premium.")]
    LimitReached(u32),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::WrongSecret => ErrorKind::WrongSecret,
            AppError::InvalidCredential(_) => ErrorKind::InvalidCredential,
            AppError::Expired => ErrorKind::Expired,
            AppError::LimitReached(_) => ErrorKind::LimitReached,
            AppError::InvalidSignature => ErrorKind::InvalidSignature,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Provider(_) => ErrorKind::ProviderError,
            AppError::Storage(_) => ErrorKind::StorageError,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::DuplicateIdentity => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::WrongSecret | ErrorKind::InvalidCredential | ErrorKind::Expired => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::LimitReached => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::InvalidSignature | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorKind::StorageError | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Provider("upstream request timed out".to_string())
        } else {
            AppError::Provider(err.to_string())
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Upstream and internal details stay in the log.
        let detail = match self {
            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                "Storage error".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Provider(ref msg) => {
                tracing::warn!("Provider error: {}", msg);
                self.to_string()
            }
            ref other => other.to_string(),
        };

        let body: Envelope<()> = Envelope::Error {
            kind: self.kind(),
            detail,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
