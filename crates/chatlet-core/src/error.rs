// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chatlet extension host.

use thiserror::Error;

/// The primary error type used across all Chatlet adapter traits and host operations.
#[derive(Debug, Error)]
pub enum ChatletError {
    /// Configuration errors (invalid TOML, missing required fields, bad startup wiring).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (connection failure, rejected message, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A submission was rejected before anything was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting user may not perform the requested mutation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A referenced script or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// User-authored logic raised while being loaded or invoked.
    #[error("script execution failed: {message}")]
    Execution { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatletError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns `true` for failures caused by the script itself rather than the host.
    pub fn is_script_failure(&self) -> bool {
        matches!(self, Self::Execution { .. } | Self::Timeout { .. })
    }

    /// Short explanation suitable for showing to a chat user.
    ///
    /// Storage, channel, and internal failures are collapsed to a generic message so
    /// backend detail never reaches the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::PermissionDenied(msg) | Self::NotFound(msg) => {
                msg.clone()
            }
            Self::Execution { message } => message.clone(),
            Self::Timeout { duration } => {
                format!("script did not finish within {}s", duration.as_secs())
            }
            Self::Config(_) | Self::Storage { .. } | Self::Channel { .. } | Self::Internal(_) => {
                "internal error, please try again later".to_string()
            }
        }
    }
}
