// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as positive timeouts, a threshold inside [0, 1], and
//! well-formed reserved words.

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.gateway.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.name must not be empty".to_string(),
        });
    }

    if config.gateway.name.contains(char::is_whitespace) {
        errors.push(ConfigError::Validation {
            message: format!(
                "gateway.name `{}` must be a single token without whitespace",
                config.gateway.name
            ),
        });
    }

    for word in &config.gateway.reserved_words {
        if word.trim().is_empty() || word.contains(char::is_whitespace) {
            errors.push(ConfigError::Validation {
                message: format!("gateway.reserved_words entry `{word}` must be a single token"),
            });
        }
    }

    if config.conversation.expiry_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "conversation.expiry_secs must be positive".to_string(),
        });
    }

    if config.conversation.skip_keyword.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "conversation.skip_keyword must not be empty".to_string(),
        });
    }

    if config.auth.credentials_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "auth.credentials_ttl_secs must be positive".to_string(),
        });
    }

    if config.auth.login_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "auth.login_ttl_secs must be positive".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&config.nlu.confidence_threshold) {
        errors.push(ConfigError::Validation {
            message: format!(
                "nlu.confidence_threshold must be within [0, 1], got {}",
                config.nlu.confidence_threshold
            ),
        });
    }

    // An enabled platform without a credential cannot connect.
    for (section, platform) in [
        ("slack", &config.slack),
        ("teams", &config.teams),
        ("mattermost", &config.mattermost),
        ("wechat", &config.wechat),
    ] {
        if platform.enabled && platform.token.is_none() {
            errors.push(ConfigError::Validation {
                message: format!("{section}.enabled is true but {section}.token is not set"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
