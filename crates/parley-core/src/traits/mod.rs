// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Parley plugin architecture.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth;
pub mod channel;
pub mod nlu;

// Re-export all traits at the traits module level for convenience.
pub use adapter::PluginAdapter;
pub use auth::CredentialStore;
pub use channel::{ChannelAdapter, ChannelCapabilities, OutboundSink};
pub use nlu::NluAdapter;
