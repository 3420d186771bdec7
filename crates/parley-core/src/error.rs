// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley chatbot gateway.

use thiserror::Error;

/// The primary error type used across Parley adapter traits and core operations.
///
/// Fatal configuration-time failures (duplicate registrations, malformed
/// schemas) are raised synchronously at startup. Runtime dialog failures are
/// never surfaced through this type -- they resolve to a chat reply or a
/// silent deadline reset instead.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid registration, reserved word, malformed suffix pattern).
    #[error("configuration error: {0}")]
    Config(String),

    /// Conversation schema compilation errors (missing steps, unknown schema kind).
    #[error("schema error: {0}")]
    Schema(String),

    /// Channel adapter errors (connection failure, delivery failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication adapter errors (credential store failure, bad login session).
    #[error("auth error: {0}")]
    Auth(String),

    /// No registered command matches the inbound text.
    #[error("no command matches `{text}`")]
    CommandNotFound { text: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
