// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent failure messages.

use crate::config::ConfigError;
use crate::models::MediaCategory;
use serde::Deserialize;
use std::fmt;

/// Application error type. Every variant renders the message that ends up
/// in a failure envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Invalid file type for {0}")]
    InvalidFileType(MediaCategory),

    #[error("File size exceeds limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Auth(ProviderError),

    #[error("{0}")]
    Database(ProviderError),

    #[error("{0}")]
    Storage(ProviderError),

    /// The provider rejected the refresh token; the session is gone.
    #[error("Session expired: {0}")]
    SessionExpired(ProviderError),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The provider's error body, when the failure came from the backend.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            AppError::Auth(e)
            | AppError::Database(e)
            | AppError::Storage(e)
            | AppError::SessionExpired(e) => Some(e),
            _ => None,
        }
    }
}

/// Error reported by the backend provider.
///
/// The auth, table and storage APIs each shape their error bodies a little
/// differently; all of them are folded into this one struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderError {
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
    pub code: Option<String>,
}

impl ProviderError {
    pub const UNKNOWN: &'static str = "Unknown error occurred";

    /// Error carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Most descriptive text available: message, then details, then hint.
    pub fn best_message(&self) -> &str {
        [&self.message, &self.details, &self.hint]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.trim().is_empty())
            .unwrap_or(Self::UNKNOWN)
    }

    /// Build from a non-success HTTP response body.
    ///
    /// Bodies that are not JSON are kept verbatim as the message, prefixed
    /// with the status line.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<RawProviderError>(body) {
            Ok(raw) => {
                let mut err = raw.into_provider_error();
                if err.code.is_none() {
                    err.code = Some(status.to_string());
                }
                err
            }
            Err(_) if body.trim().is_empty() => Self::default().with_code(status.to_string()),
            Err(_) => Self::message(format!("HTTP {}: {}", status, body.trim()))
                .with_code(status.to_string()),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.best_message())
    }
}

/// Union of the error body fields used across the provider's APIs.
#[derive(Debug, Default, Deserialize)]
struct RawProviderError {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<serde_json::Value>,
    details: Option<String>,
    hint: Option<String>,
    code: Option<serde_json::Value>,
    error_code: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<serde_json::Value>,
}

impl RawProviderError {
    fn into_provider_error(self) -> ProviderError {
        let error_text = self.error.as_ref().and_then(value_to_string);
        ProviderError {
            message: self
                .message
                .or(self.msg)
                .or(self.error_description)
                .or(error_text),
            details: self.details,
            hint: self.hint,
            code: self
                .error_code
                .or_else(|| self.code.as_ref().and_then(value_to_string))
                .or_else(|| self.status_code.as_ref().and_then(value_to_string)),
        }
    }
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Result type alias for facade and backend operations.
pub type Result<T> = std::result::Result<T, AppError>;
