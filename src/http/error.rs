//! Request-level error responses.
//!
//! Per-request failures map to HTTP status codes with a generic category
//! message in the body; internal error detail stays in the logs.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::archive::ExtractError;
use crate::upload::UploadError;

/// Error type for request handling.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    /// Map an authentication denial status to a response error.
    pub fn from_auth_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            405 => Self::MethodNotAllowed,
            400 => Self::BadRequest("bad request"),
            _ => Self::Internal,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_string();
        if matches!(self, Self::Unauthorized) {
            // Basic challenge, realm matching the built-in authenticator.
            (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"*\"")],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::InvalidPrefix(_) => Self::BadRequest("invalid prefix"),
            UploadError::AlreadyExists(_) => Self::BadRequest("file already exists"),
            UploadError::MissingFile => Self::BadRequest("missing file part"),
            UploadError::TooLarge { .. } => Self::BadRequest("upload too large"),
            UploadError::Multipart(_) => Self::BadRequest("malformed multipart body"),
            UploadError::Io(source) => {
                tracing::error!(%source, "Upload failed");
                Self::Internal
            }
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::AlreadyExists(_) => Self::BadRequest("file already exists"),
            ExtractError::Archive(_) => Self::BadRequest("invalid archive"),
            ExtractError::Write { path, source } => {
                tracing::error!(path = %path.display(), %source, "Extraction failed");
                Self::Internal
            }
        }
    }
}

/// Result type for request handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
