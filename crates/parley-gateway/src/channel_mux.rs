// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel multiplexer that aggregates multiple ChannelAdapters into one.
//!
//! The multiplexer spawns per-channel receive tasks that forward inbound
//! messages to a shared mpsc channel, tagging each with its source channel
//! name. Outbound messages are routed back to the originating channel based
//! on the `channel` field.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use parley_core::traits::ChannelCapabilities;
use parley_core::types::{AdapterType, HealthStatus};
use parley_core::{
    ChannelAdapter, InboundMessage, MessageId, OutboundMessage, OutboundSink, ParleyError,
    PluginAdapter,
};

/// A multiplexer that aggregates multiple channel adapters into a single
/// `ChannelAdapter` interface.
///
/// On `connect()`, each child channel is connected and a background task
/// is spawned that forwards its inbound messages to a shared mpsc channel.
/// On `send()`, the outbound message is routed to the child named by the
/// message's `channel` field.
pub struct ChannelMultiplexer {
    /// Named child channels, stored before connect().
    pending_channels: Vec<(String, Box<dyn ChannelAdapter + Send + Sync>)>,
    /// Connected child channels (moved here after connect()).
    connected_channels: Arc<Vec<(String, Arc<dyn ChannelAdapter + Send + Sync>)>>,
    /// Shared inbound receiver.
    inbound_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    /// Shared inbound sender (cloned per background task).
    inbound_tx: mpsc::Sender<InboundMessage>,
}

impl Default for ChannelMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMultiplexer {
    /// Create a new empty multiplexer.
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(512);
        Self {
            pending_channels: Vec::new(),
            connected_channels: Arc::new(Vec::new()),
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx,
        }
    }

    /// Add a named channel to the multiplexer.
    ///
    /// Must be called before `connect()`. The channel name is used for
    /// routing outbound messages back to the correct channel.
    pub fn add_channel(&mut self, name: String, channel: Box<dyn ChannelAdapter + Send + Sync>) {
        self.pending_channels.push((name, channel));
    }

    /// Number of channels registered (pending + connected).
    pub fn channel_count(&self) -> usize {
        self.pending_channels.len() + self.connected_channels.len()
    }

    fn child(&self, name: &str) -> Option<Arc<dyn ChannelAdapter + Send + Sync>> {
        self.connected_channels
            .iter()
            .find(|(child_name, _)| child_name == name)
            .map(|(_, channel)| Arc::clone(channel))
    }
}

#[async_trait]
impl PluginAdapter for ChannelMultiplexer {
    fn name(&self) -> &str {
        "multiplexer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let mut any_unhealthy = false;
        let mut degraded_reasons = Vec::new();

        for (name, channel) in self.connected_channels.iter() {
            match channel.health_check().await? {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(reason) => {
                    degraded_reasons.push(format!("{name}: {reason}"));
                }
                HealthStatus::Unhealthy(reason) => {
                    any_unhealthy = true;
                    degraded_reasons.push(format!("{name}: {reason}"));
                }
            }
        }

        if any_unhealthy || !degraded_reasons.is_empty() {
            Ok(HealthStatus::Degraded(degraded_reasons.join("; ")))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        for (name, channel) in self.connected_channels.iter() {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = %name, error = %e, "channel shutdown error");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for ChannelMultiplexer {
    fn capabilities(&self) -> ChannelCapabilities {
        // Union of action/thread support; minimum message length cap.
        let mut caps = ChannelCapabilities::default();
        for (_, channel) in self.connected_channels.iter() {
            let child_caps = channel.capabilities();
            caps.supports_actions = caps.supports_actions || child_caps.supports_actions;
            caps.supports_threads = caps.supports_threads || child_caps.supports_threads;
            caps.max_message_length = match (caps.max_message_length, child_caps.max_message_length)
            {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
        }
        caps
    }

    async fn connect(&mut self) -> Result<(), ParleyError> {
        let mut connected: Vec<(String, Arc<dyn ChannelAdapter + Send + Sync>)> = Vec::new();

        // Take ownership of pending channels.
        let pending = std::mem::take(&mut self.pending_channels);

        for (name, mut channel) in pending {
            channel.connect().await?;
            info!(channel = %name, "channel connected via multiplexer");

            let arc_channel: Arc<dyn ChannelAdapter + Send + Sync> = Arc::from(channel);
            connected.push((name.clone(), Arc::clone(&arc_channel)));

            // Spawn a background receive task for this channel.
            let tx = self.inbound_tx.clone();
            let channel_name = name.clone();
            let recv_channel = arc_channel;

            tokio::spawn(async move {
                loop {
                    match recv_channel.receive().await {
                        Ok(mut msg) => {
                            // Tag the message with its source channel.
                            msg.channel = channel_name.clone();

                            if tx.send(msg).await.is_err() {
                                // Multiplexer was dropped.
                                break;
                            }
                        }
                        Err(e) => {
                            if e.to_string().contains("closed") {
                                info!(
                                    channel = %channel_name,
                                    "channel closed, stopping receive task"
                                );
                                break;
                            }
                            warn!(
                                error = %e,
                                channel = %channel_name,
                                "channel receive error"
                            );
                        }
                    }
                }
            });
        }

        self.connected_channels = Arc::new(connected);

        info!(
            channels = self.connected_channels.len(),
            "channel multiplexer connected"
        );
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let Some(channel) = self.child(&msg.channel) else {
            return Err(ParleyError::Channel {
                message: format!("no channel named `{}` for outbound message", msg.channel),
                source: None,
            });
        };
        channel.send(msg).await
    }

    async fn receive(&self) -> Result<InboundMessage, ParleyError> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ParleyError::Channel {
                message: "multiplexer inbound channel closed".to_string(),
                source: None,
            })
    }
}

/// Outbound-only view of a connected channel, handed to the router and
/// command handlers.
pub struct ChannelSink(pub Arc<dyn ChannelAdapter + Send + Sync>);

#[async_trait]
impl OutboundSink for ChannelSink {
    async fn deliver(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        self.0.send(msg).await
    }
}
