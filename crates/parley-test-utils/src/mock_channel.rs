// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound messages
//! and captured outbound messages for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use parley_core::types::{AdapterType, HealthStatus};
use parley_core::{
    ChannelAdapter, InboundMessage, MessageId, OutboundMessage, OutboundSink, ParleyError,
    PluginAdapter,
};
use parley_core::traits::ChannelCapabilities;

/// A mock messaging channel for testing.
///
/// Provides two queues:
/// - **inbound**: Messages injected via `inject_message()` are returned by `receive()`
/// - **sent**: Messages passed to `send()` are captured and retrievable via `sent_messages()`
pub struct MockChannel {
    name: String,
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    notify: Arc<Notify>,
}

impl MockChannel {
    /// Create a new mock channel with empty queues.
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock channel reporting the given adapter name. Inbound
    /// messages are expected to carry the same name in their `channel` field.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Inject an inbound message into the receive queue.
    ///
    /// The next call to `receive()` will return this message.
    pub async fn inject_message(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Shorthand: inject a plain text message from a user in a room.
    pub async fn inject_text(&self, user_id: &str, room_id: &str, text: &str) {
        self.inject_message(InboundMessage {
            id: format!("mock-in-{}", uuid::Uuid::new_v4()),
            channel: self.name.clone(),
            user_id: user_id.to_string(),
            room_id: room_id.to_string(),
            text: text.to_string(),
            nlu: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
        .await;
    }

    /// Get all messages that were sent through `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts of all sent messages, in send order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.text.clone()).collect()
    }

    /// Get the count of sent messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all sent messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_actions: true,
            supports_threads: false,
            max_message_length: None,
        }
    }

    async fn connect(&mut self) -> Result<(), ParleyError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let id = format!("mock-msg-{}", uuid::Uuid::new_v4());
        self.sent.lock().await.push(msg);
        Ok(MessageId(id))
    }

    async fn receive(&self) -> Result<InboundMessage, ParleyError> {
        loop {
            if let Some(msg) = self.inbound.lock().await.pop_front() {
                return Ok(msg);
            }
            self.notify.notified().await;
        }
    }
}

/// The mock channel doubles as an outbound sink so router and conversation
/// tests can capture replies without a running gateway.
#[async_trait]
impl OutboundSink for MockChannel {
    async fn deliver(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        self.send(msg).await
    }
}
