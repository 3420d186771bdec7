// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use parley_config::{load_and_validate_str, load_config_from_str};
use parley_core::ScopeMode;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_parley_config() {
    let toml = r#"
[gateway]
name = "testbot"
scope_mode = "room"
log_level = "debug"
reserved_words = ["admin"]

[conversation]
expiry_secs = 120
skip_keyword = "pass"

[auth]
credentials_ttl_secs = 900
login_ttl_secs = 300
sweep_interval_secs = 30

[nlu]
confidence_threshold = 0.6

[slack]
enabled = true
token = "xoxb-123"

[mattermost]
enabled = true
token = "mm-token"
endpoint = "https://chat.example.com"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.gateway.name, "testbot");
    assert_eq!(config.gateway.scope_mode, ScopeMode::Room);
    assert_eq!(config.gateway.log_level, "debug");
    assert_eq!(config.gateway.reserved_words, vec!["admin"]);
    assert_eq!(config.conversation.expiry_secs, 120);
    assert_eq!(config.conversation.skip_keyword, "pass");
    assert_eq!(config.auth.credentials_ttl_secs, 900);
    assert_eq!(config.auth.login_ttl_secs, 300);
    assert_eq!(config.nlu.confidence_threshold, 0.6);
    assert!(config.slack.enabled);
    assert_eq!(config.slack.token.as_deref(), Some("xoxb-123"));
    assert_eq!(
        config.mattermost.endpoint.as_deref(),
        Some("https://chat.example.com")
    );
    assert!(!config.wechat.enabled);
}

/// Empty TOML falls back to compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("defaults should apply");
    assert_eq!(config.gateway.name, "parley");
    assert_eq!(config.gateway.scope_mode, ScopeMode::User);
    assert_eq!(config.conversation.expiry_secs, 600);
    assert_eq!(config.conversation.skip_keyword, "skip");
    assert_eq!(config.auth.credentials_ttl_secs, 1800);
    assert_eq!(config.nlu.confidence_threshold, 0.8);
}

/// Unknown field in a section is rejected by deny_unknown_fields.
#[test]
fn unknown_field_is_rejected() {
    let toml = r#"
[gateway]
naem = "test"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("naem"),
        "error should mention the bad key, got: {err_str}"
    );
}

/// Invalid scope_mode value is rejected.
#[test]
fn invalid_scope_mode_is_rejected() {
    let toml = r#"
[gateway]
scope_mode = "channel"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Semantic validation catches a zero expiry even when the TOML parses.
#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[conversation]
expiry_secs = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("expiry_secs")));
}
