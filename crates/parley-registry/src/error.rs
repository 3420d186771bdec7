// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fatal registration-time errors.
//!
//! Every variant here is a configuration defect: it is raised synchronously
//! during integration bootstrap and aborts startup, never at message time.

use parley_core::ParleyError;
use thiserror::Error;

/// Errors raised while registering integrations and commands.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Integration name is empty or whitespace-only.
    #[error("integration name must not be empty")]
    EmptyName,

    /// Integration name is not a single lowercase token.
    #[error("integration name `{0}` must be a single lowercase token")]
    InvalidName(String),

    /// Name collides with a reserved word.
    #[error("`{0}` is a reserved word")]
    ReservedWord(String),

    /// Integration already registered under this name.
    #[error("integration `{0}` is already registered")]
    DuplicateIntegration(String),

    /// Command registered against an unknown integration.
    #[error("integration `{0}` is not registered")]
    UnknownIntegration(String),

    /// Verb or entity contains whitespace or is empty.
    #[error("`{0}` must be a single non-empty token without whitespace")]
    InvalidToken(String),

    /// A command with the same normalized verb/entity key already exists.
    #[error("command `{key}` is already registered under integration `{integration}`")]
    DuplicateCommand { integration: String, key: String },

    /// Suffix spec combination is not expressible (`pattern: none` with `optional: false`).
    #[error("malformed suffix spec: a mandatory suffix requires a pattern")]
    MalformedSuffix,

    /// Suffix pattern failed to compile.
    #[error("invalid suffix pattern `{pattern}`: {source}")]
    BadSuffixPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

impl From<RegistryError> for ParleyError {
    fn from(err: RegistryError) -> Self {
        ParleyError::Config(err.to_string())
    }
}
