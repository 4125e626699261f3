use hostwatch_proto::{Response, ResponseCode};
use thiserror::Error;
use tracing::warn;

use crate::database::StoreError;

/// Why a command was not carried out; the message is what the client sees
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("bad request")]
    Malformed,
    #[error("{0}")]
    StorageFailure(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("no permissions")]
    PermissionDenied,
}

impl CommandError {
    pub fn code(&self) -> ResponseCode {
        match self {
            CommandError::Malformed => ResponseCode::Malformed,
            CommandError::StorageFailure(_) => ResponseCode::StorageError,
            CommandError::Conflict(_) => ResponseCode::Conflict,
            CommandError::NotFound(_) => ResponseCode::NotFound,
            CommandError::PermissionDenied => ResponseCode::PermissionDenied,
        }
    }

    pub fn into_response(self) -> Response {
        Response::new(self.code(), self.to_string())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CommandError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CommandError::NotFound(message.into())
    }

    /// Storage fault reported under a specific message
    pub fn storage(message: impl Into<String>, err: StoreError) -> Self {
        let message = message.into();
        warn!("storage call failed ({message}): {err}");
        CommandError::StorageFailure(message)
    }
}

/// Any store error that reaches `?` unhandled is reported as `DB.error`
impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        CommandError::storage("DB.error", err)
    }
}

pub type CommandResult = Result<Response, CommandError>;
