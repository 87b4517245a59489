//! Error types for the command delegation pipeline
//!
//! Only validation and not-found failures ever reach the caller of the coordinator.
//! Everything else (backend failures, malformed delegation replies, dispatch misses) is
//! recovered inside the pipeline and surfaces as a [`Recovered`] value plus a metric event.

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::llm::provider::LlmError;
use crate::storage::FileStoreError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

static SECRET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").unwrap());

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").unwrap()
});

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Main error type for coordinator operations
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Handler not found: {handler_id}")]
    NotFound { handler_id: String },

    #[error("Generative backend error: {message}")]
    Upstream { message: String },

    #[error("Malformed delegation reply: {message}")]
    MalformedUpstreamReply { message: String },

    #[error("No deterministic behavior for '{command_type}' on handler '{handler_id}'")]
    DispatchMiss {
        handler_id: String,
        command_type: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] FileStoreError),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<LlmError> for CoordinatorError {
    fn from(error: LlmError) -> Self {
        Self::Upstream {
            message: error.to_string(),
        }
    }
}

/// Machine-readable error codes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    UpstreamError,
    MalformedUpstreamReply,
    DispatchMiss,
    InternalError,
}

/// Error payload handed back to a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub request_id: Uuid,
    pub code: ErrorCode,
    pub message: String,
}

impl CoordinatorError {
    /// Whether the error is the caller's fault (bad input or unknown handler)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }

    /// Protocol code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Upstream { .. } => ErrorCode::UpstreamError,
            Self::MalformedUpstreamReply { .. } => ErrorCode::MalformedUpstreamReply,
            Self::DispatchMiss { .. } => ErrorCode::DispatchMiss,
            Self::Storage(_) | Self::Dispatch(_) | Self::Config(_) | Self::Internal { .. } => {
                ErrorCode::InternalError
            }
        }
    }

    /// Convert to a sanitized error payload for the caller
    pub fn to_error_body(&self, request_id: Uuid) -> ErrorBody {
        ErrorBody {
            request_id,
            code: self.code(),
            message: sanitize_error_message(&self.to_string()),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(handler_id: S) -> Self {
        Self::NotFound {
            handler_id: handler_id.into(),
        }
    }

    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn malformed_reply<S: Into<String>>(message: S) -> Self {
        Self::MalformedUpstreamReply {
            message: message.into(),
        }
    }

    pub fn dispatch_miss<S: Into<String>, C: Into<String>>(handler_id: S, command_type: C) -> Self {
        Self::DispatchMiss {
            handler_id: handler_id.into(),
            command_type: command_type.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// A value produced by the pipeline, possibly after degrading around a failure.
///
/// The degrade path is an explicit branch: callers can tell a clean answer from one that
/// was produced after an upstream failure, and the error travels with the value so it can
/// be logged and recorded.
#[derive(Debug)]
pub struct Recovered<T> {
    pub value: T,
    pub recovered: Option<CoordinatorError>,
}

impl<T> Recovered<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            recovered: None,
        }
    }

    pub fn degraded(value: T, error: CoordinatorError) -> Self {
        Self {
            value,
            recovered: Some(error),
        }
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered.is_some()
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Recovered<U> {
        Recovered {
            value: f(self.value),
            recovered: self.recovered,
        }
    }
}

/// Redact secrets and sensitive paths, then bound the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
