// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley chatbot gateway.
//!
//! This crate provides the foundational trait definitions, error types, and
//! the normalized message model used throughout the Parley workspace.
//! Platform adapter plugins implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParleyError;
pub use types::{
    AdapterType, ConversationId, Credentials, HealthStatus, Identity, InboundMessage, MessageId,
    OutboundMessage, ScopeMode,
};

// Re-export all adapter traits at crate root.
pub use traits::{ChannelAdapter, CredentialStore, NluAdapter, OutboundSink, PluginAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parley_error_has_all_variants() {
        let _config = ParleyError::Config("test".into());
        let _schema = ParleyError::Schema("test".into());
        let _channel = ParleyError::Channel {
            message: "test".into(),
            source: None,
        };
        let _auth = ParleyError::Auth("test".into());
        let _not_found = ParleyError::CommandNotFound {
            text: "unknown thing".into(),
        };
        let _timeout = ParleyError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ParleyError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trips_through_display() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Channel,
            AdapterType::CredentialStore,
            AdapterType::Nlu,
        ] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        // Compile-time check that every adapter trait is reachable from the
        // crate root.
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_adapter<T: ChannelAdapter>() {}
        fn _assert_credential_store<T: CredentialStore>() {}
        fn _assert_nlu_adapter<T: NluAdapter>() {}
        fn _assert_outbound_sink<T: OutboundSink>() {}
    }
}
