// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat platform integrations (Slack, Teams, Mattermost, WeChat).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundMessage, MessageId, OutboundMessage};

/// Capabilities reported by a channel adapter.
#[derive(Debug, Clone, Default)]
pub struct ChannelCapabilities {
    /// Platform can render interactive buttons/selects.
    pub supports_actions: bool,
    /// Platform supports threaded replies.
    pub supports_threads: bool,
    /// Maximum message length, if the platform enforces one.
    pub max_message_length: Option<usize>,
}

/// Adapter for bidirectional chat platform integrations.
///
/// Channel adapters own the wire protocol; they deliver normalized
/// [`InboundMessage`]s and accept platform-agnostic [`OutboundMessage`]s.
/// The interactive-action model in an outbound message is rendered (or
/// flattened to text) by the adapter.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Returns the capabilities supported by this channel.
    fn capabilities(&self) -> ChannelCapabilities;

    /// Establishes a connection to the chat platform.
    async fn connect(&mut self) -> Result<(), ParleyError>;

    /// Sends a message through the channel.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError>;

    /// Receives the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, ParleyError>;
}

/// Outbound-only delivery seam handed to command handlers and the router.
///
/// Implemented by the gateway's channel multiplexer; test code substitutes a
/// capturing mock.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    /// Delivers an outbound message to its target channel.
    async fn deliver(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError>;
}
