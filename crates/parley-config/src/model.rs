// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley chatbot gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use parley_core::ScopeMode;
use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Gateway identity and behavior settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Conversation engine settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Authentication gate settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// NLU scorer settings.
    #[serde(default)]
    pub nlu: NluConfig,

    /// Slack platform settings.
    #[serde(default)]
    pub slack: PlatformConfig,

    /// Microsoft Teams platform settings.
    #[serde(default)]
    pub teams: PlatformConfig,

    /// Mattermost platform settings.
    #[serde(default)]
    pub mattermost: PlatformConfig,

    /// WeChat platform settings.
    #[serde(default)]
    pub wechat: PlatformConfig,
}

/// Gateway identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Display name of the bot; also the command prefix stripped by adapters.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Conversation scoping mode: `user` or `room`.
    #[serde(default)]
    pub scope_mode: ScopeMode,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Extra reserved words that may not be used as integration names or verbs.
    #[serde(default)]
    pub reserved_words: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            scope_mode: ScopeMode::default(),
            log_level: default_log_level(),
            reserved_words: Vec::new(),
        }
    }
}

fn default_bot_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Conversation engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Seconds of inactivity before an idle conversation expires.
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,

    /// Keyword that skips a non-required step.
    #[serde(default = "default_skip_keyword")]
    pub skip_keyword: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry_secs(),
            skip_keyword: default_skip_keyword(),
        }
    }
}

fn default_expiry_secs() -> u64 {
    600 // 10 minutes
}

fn default_skip_keyword() -> String {
    "skip".to_string()
}

/// Authentication gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Seconds a cached credential stays valid after its last access.
    #[serde(default = "default_credentials_ttl_secs")]
    pub credentials_ttl_secs: u64,

    /// Seconds a pending login session stays alive before the sweep reaps it.
    #[serde(default = "default_login_ttl_secs")]
    pub login_ttl_secs: u64,

    /// Seconds between pending-login sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_ttl_secs: default_credentials_ttl_secs(),
            login_ttl_secs: default_login_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_credentials_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_login_ttl_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// NLU scorer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NluConfig {
    /// Minimum similarity score in [0, 1] for an intent match to count.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.8
}

/// Settings for one chat platform adapter.
///
/// Token semantics differ per platform (bot token, app password, webhook
/// secret); the adapter interprets them. A platform with `enabled = false`
/// is never connected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Whether this platform adapter is connected at startup.
    #[serde(default)]
    pub enabled: bool,

    /// Platform credential. `None` disables the adapter even if enabled.
    #[serde(default)]
    pub token: Option<String>,

    /// Platform API endpoint, for self-hosted platforms (Mattermost).
    #[serde(default)]
    pub endpoint: Option<String>,
}
