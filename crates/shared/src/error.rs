use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Transition attempted from a terminal state. Not retried.
    InvalidState,
    /// The record store read or write failed. Safe to retry manually.
    StoreUnavailable,
    /// Reserved for rejected operator input; blank messages are dropped instead.
    Validation,
    NotFound,
}

impl ErrorCode {
    /// Whether the operator may retry the same action unchanged.
    pub fn is_transient(self) -> bool {
        match self {
            ErrorCode::StoreUnavailable => true,
            ErrorCode::InvalidState | ErrorCode::Validation | ErrorCode::NotFound => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// One-line text for the operator console status bar.
    pub fn operator_message(&self) -> String {
        match self.code {
            ErrorCode::InvalidState => format!("Action blocked: {}", self.message),
            ErrorCode::StoreUnavailable => {
                format!("Record store unavailable, retry when connectivity returns: {}", self.message)
            }
            ErrorCode::Validation => format!("Invalid input: {}", self.message),
            ErrorCode::NotFound => format!("Not found: {}", self.message),
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ApiException> for ApiError {
    fn from(value: ApiException) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

impl From<ApiError> for ApiException {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
