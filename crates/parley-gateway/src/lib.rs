// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway loop for the Parley chatbot framework.
//!
//! The [`GatewayLoop`] is the central coordinator that:
//! - Receives messages from a channel adapter (usually the multiplexer)
//! - Routes each message: built-in verbs, then the active conversation for
//!   the sender's identity, then the command router
//! - Settles conversation expiry events from the manager's watchdogs
//! - Sweeps expired pending logins on an interval
//! - Handles graceful shutdown

pub mod channel_mux;
pub mod help;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use parley_conversation::{ConversationManager, Lifecycle};
use parley_core::{
    ChannelAdapter, ConversationId, InboundMessage, OutboundMessage, OutboundSink, ParleyError,
};
use parley_router::{CommandRouter, Dispatch};

pub use channel_mux::{ChannelMultiplexer, ChannelSink};

/// The main gateway loop coordinating channels, conversations, and commands.
pub struct GatewayLoop {
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    sink: Arc<dyn OutboundSink>,
    manager: ConversationManager,
    expired_rx: mpsc::UnboundedReceiver<ConversationId>,
    router: Arc<CommandRouter>,
    sweep_interval: Duration,
    nlu_threshold: f64,
}

impl GatewayLoop {
    /// Create a gateway loop over an already-connected channel adapter.
    ///
    /// `nlu_threshold` is the minimum confidence an attached NLU parse needs
    /// to be believed; anything below it is treated as no parse at all.
    pub fn new(
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        manager: ConversationManager,
        expired_rx: mpsc::UnboundedReceiver<ConversationId>,
        router: Arc<CommandRouter>,
        sweep_interval: Duration,
        nlu_threshold: f64,
    ) -> Self {
        let sink: Arc<dyn OutboundSink> = Arc::new(ChannelSink(Arc::clone(&channel)));
        Self {
            channel,
            sink,
            manager,
            expired_rx,
            router,
            sweep_interval,
            nlu_threshold,
        }
    }

    /// The sink handlers and the login callback should use for replies.
    pub fn sink(&self) -> Arc<dyn OutboundSink> {
        Arc::clone(&self.sink)
    }

    /// Runs the gateway loop until the cancellation token is triggered.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ParleyError> {
        info!("gateway loop running");
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it.
        sweep.tick().await;

        loop {
            tokio::select! {
                msg = self.channel.receive() => {
                    match msg {
                        Ok(inbound) => {
                            if let Err(e) = self.handle_inbound(inbound).await {
                                error!(error = %e, "failed to handle inbound message");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "channel receive error");
                            if e.to_string().contains("closed") {
                                break;
                            }
                        }
                    }
                }
                Some(id) = self.expired_rx.recv() => {
                    if let Some(outbound) = self.manager.expire(id) {
                        self.send_all(outbound).await;
                    }
                }
                _ = sweep.tick() => {
                    let swept = self.router.sweep_pending();
                    if swept > 0 {
                        debug!(swept, "pending logins reaped");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping gateway loop");
                    break;
                }
            }
        }

        self.manager.shutdown();
        self.channel.shutdown().await?;
        info!("gateway loop stopped");
        Ok(())
    }

    /// Handles a single inbound message.
    ///
    /// Order: built-in verbs first (they must work even mid-conversation),
    /// then the sender's active conversation, then the command router, and
    /// finally the not-found fallback with a fuzzy suggestion.
    pub async fn handle_inbound(&mut self, mut inbound: InboundMessage) -> Result<(), ParleyError> {
        debug!(
            user_id = inbound.user_id.as_str(),
            channel = inbound.channel.as_str(),
            "handling inbound message"
        );

        // A low-confidence NLU parse is treated as no parse: handlers and
        // slot prefill only ever see parses above the threshold.
        if let Some(nlu) = &inbound.nlu {
            if nlu.confidence < self.nlu_threshold {
                debug!(
                    intent = nlu.intent.as_str(),
                    confidence = nlu.confidence,
                    "NLU parse below confidence threshold, discarded"
                );
                inbound.nlu = None;
            }
        }

        if let Some(reply) = self.handle_builtin(&inbound) {
            self.send_all(reply).await;
            return Ok(());
        }

        if let Some(turn) = self.manager.deliver(&inbound) {
            if let Some(Lifecycle::End(answers)) = &turn.outcome {
                debug!(fragments = answers.len(), "conversation ended with answers");
            }
            self.send_all(turn.outbound).await;
            return Ok(());
        }

        match self.router.dispatch(inbound.clone(), self.sink()).await {
            Ok(Dispatch::Handled { integration, key }) => {
                debug!(
                    integration = integration.as_str(),
                    key = key.as_str(),
                    "message dispatched"
                );
            }
            Ok(Dispatch::LoginPending { integration, .. }) => {
                debug!(integration = integration.as_str(), "message parked for login");
            }
            Ok(Dispatch::NotFound { suggestion }) => {
                let reply = help::render_not_found(suggestion.as_deref());
                self.send_all(vec![OutboundMessage::reply_to(&inbound, reply)])
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "command handler failed");
                self.send_all(vec![OutboundMessage::reply_to(
                    &inbound,
                    "Something went wrong running that command.",
                )])
                .await;
            }
        }
        Ok(())
    }

    /// Built-in verbs: help and conversation control. Exact phrases only, so
    /// conversations can still capture ordinary text.
    fn handle_builtin(&self, inbound: &InboundMessage) -> Option<Vec<OutboundMessage>> {
        let text = inbound.text.trim().to_lowercase();
        let identity = self.manager.identity_of(inbound);
        let registry = self.router.registry();

        let reply = |text: String| Some(vec![OutboundMessage::reply_to(inbound, text)]);

        match text.as_str() {
            "help" => reply(help::render_overview(registry)),
            "conversations" => reply(help::render_conversations(&self.manager.list(&identity))),
            "pause" => match self.manager.pause(&identity) {
                Ok(id) => reply(format!(
                    "Paused conversation {id}. Say `resume` to pick it back up."
                )),
                Err(denial) => reply(denial.to_string()),
            },
            "resume" => match self.manager.resume(&identity) {
                Ok(turn) => Some(turn.outbound),
                Err(denial) => reply(denial.to_string()),
            },
            "cancel" => match self.manager.cancel(&identity) {
                Ok(turn) => {
                    let mut out = vec![OutboundMessage::reply_to(inbound, "Cancelled.")];
                    out.extend(turn.outbound);
                    Some(out)
                }
                Err(denial) => reply(denial.to_string()),
            },
            "cancel all" => {
                let count = self.manager.cancel_all(&identity);
                reply(format!("Cancelled {count} conversation(s)."))
            }
            _ => {
                let rest = text.strip_prefix("help ")?;
                reply(help::render_integration(registry, rest.trim()))
            }
        }
    }

    async fn send_all(&self, outbound: Vec<OutboundMessage>) {
        for msg in outbound {
            if let Err(e) = self.sink.deliver(msg).await {
                error!(error = %e, "failed to deliver outbound message");
            }
        }
    }
}
