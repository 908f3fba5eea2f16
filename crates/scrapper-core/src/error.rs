//! Error taxonomy for the scrapper: storage, remote adapters, and config.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::APIErrorResponse;

/// Precondition and infrastructure errors raised by a `LinkStorage` implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chat not found")]
    ChatNotFound,

    #[error("link not found")]
    LinkNotFound,

    #[error("link already exists")]
    LinkAlreadyExists,

    #[error("tag not found")]
    TagNotFound,

    #[error("error creating pool: {0}")]
    PoolCreate(String),

    #[error("error executing query: {0}")]
    ExecQuery(String),

    #[error("error creating chat: {0}")]
    CreateChat(String),

    #[error("error deleting chat: {0}")]
    DeleteChat(String),

    #[error("error removing link: {0}")]
    RemoveLink(String),
}

/// Remote-API failures raised by an update adapter or the bot client.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("error doing request: {0}")]
    DoRequest(String),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("read body error: {0}")]
    ReadBody(String),
}

/// Configuration-loading errors, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("value is not specified in .env file: {0}")]
    MissingKey(String),

    #[error("cannot parse env value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(e: tokio_postgres::Error) -> Self {
        StorageError::ExecQuery(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StorageError::PoolCreate(e.to_string())
    }
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let message = message.into();
    let body = APIErrorResponse {
        description: message.clone(),
        code: code.to_string(),
        exception_name: code.to_string(),
        exception_message: message,
        stacktrace: Vec::new(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        match self {
            StorageError::ChatNotFound => {
                error_response(StatusCode::NOT_FOUND, "ChatNotFound", self.to_string())
            }
            StorageError::LinkNotFound => {
                error_response(StatusCode::NOT_FOUND, "LinkNotFound", self.to_string())
            }
            StorageError::TagNotFound => {
                error_response(StatusCode::NOT_FOUND, "TagNotFound", self.to_string())
            }
            StorageError::LinkAlreadyExists => {
                error_response(StatusCode::BAD_REQUEST, "LinkAlreadyExists", self.to_string())
            }
            StorageError::PoolCreate(_)
            | StorageError::ExecQuery(_)
            | StorageError::CreateChat(_)
            | StorageError::DeleteChat(_)
            | StorageError::RemoveLink(_) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                self.to_string(),
            ),
        }
    }
}
