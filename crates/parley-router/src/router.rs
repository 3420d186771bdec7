// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic command resolution and the two-phase authentication gate.
//!
//! Resolution walks integrations in name order and each integration's
//! commands in registration order; the first matching descriptor wins, so a
//! given input always dispatches the same way. Auth-gated dispatch either
//! runs the handler with fresh credentials or parks the message behind a
//! one-time login id and prompts the user with a login URL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use parley_core::{
    traits::CredentialStore, Credentials, Identity, InboundMessage, OutboundMessage, OutboundSink,
    ParleyError,
};
use parley_registry::{CommandContext, CommandDescriptor, CommandRegistry};

use crate::pending::PendingLogins;

/// Minimum similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A successful match: which descriptor fired and what its suffix captured.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub integration: &'a str,
    pub descriptor: &'a CommandDescriptor,
    pub captures: Vec<Option<String>>,
}

/// Outcome of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran (successfully or not; handler errors propagate
    /// separately).
    Handled { integration: String, key: String },
    /// The message was parked behind a login; the user was prompted.
    LoginPending { integration: String, login_id: String },
    /// Nothing matched. Carries the closest known command, if any is close
    /// enough to mention.
    NotFound { suggestion: Option<String> },
}

/// Routes inbound messages to registered command handlers.
pub struct CommandRouter {
    registry: Arc<CommandRegistry>,
    stores: HashMap<String, Arc<dyn CredentialStore>>,
    credentials_ttl: Duration,
    pending: PendingLogins,
}

impl CommandRouter {
    pub fn new(registry: Arc<CommandRegistry>, credentials_ttl: Duration, login_ttl: Duration) -> Self {
        Self {
            registry,
            stores: HashMap::new(),
            credentials_ttl,
            pending: PendingLogins::new(login_ttl),
        }
    }

    /// Attach the credential store backing an integration's auth gate.
    /// Dispatch for that integration's gated commands fails without one.
    pub fn register_credential_store(
        &mut self,
        integration: impl Into<String>,
        store: Arc<dyn CredentialStore>,
    ) {
        self.stores.insert(integration.into(), store);
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Number of messages currently parked behind logins.
    pub fn pending_logins(&self) -> usize {
        self.pending.len()
    }

    /// Drop expired pending logins. Called on the gateway's sweep tick.
    pub fn sweep_pending(&self) -> usize {
        self.pending.sweep()
    }

    /// Find the first descriptor matching `text`. Integrations are walked in
    /// name order, commands in registration order.
    pub fn resolve(&self, text: &str) -> Option<Resolution<'_>> {
        for integration in self.registry.list_integrations() {
            for descriptor in integration.commands() {
                if let Some(captures) = descriptor.matches(text) {
                    return Some(Resolution {
                        integration: integration.name(),
                        descriptor,
                        captures,
                    });
                }
            }
        }
        None
    }

    /// Route a message: resolve, pass the auth gate if required, invoke the
    /// handler.
    pub async fn dispatch(
        &self,
        msg: InboundMessage,
        sink: Arc<dyn OutboundSink>,
    ) -> Result<Dispatch, ParleyError> {
        let Some(resolution) = self.resolve(&msg.text) else {
            return Ok(Dispatch::NotFound {
                suggestion: self.suggest(&msg.text),
            });
        };

        let integration = resolution.integration.to_string();
        let key = resolution.descriptor.key.clone();
        let captures = resolution.captures;
        let descriptor = resolution.descriptor.clone();
        debug!(integration = integration.as_str(), key = key.as_str(), "command resolved");

        let credentials = if descriptor.requires_auth {
            match self.pass_auth_gate(&integration, &msg, &sink).await? {
                Gate::Pass(credentials) => Some(credentials),
                Gate::Parked(login_id) => {
                    // The login prompt has already been sent.
                    return Ok(Dispatch::LoginPending {
                        integration,
                        login_id,
                    });
                }
            }
        } else {
            None
        };

        let handler = descriptor.handler();
        handler(CommandContext {
            message: msg,
            captures,
            credentials,
            sink,
        })
        .await?;

        info!(integration = integration.as_str(), key = key.as_str(), "command handled");
        Ok(Dispatch::Handled { integration, key })
    }

    /// Finish a login: cache the credentials and replay the parked message.
    pub async fn complete_login(
        &self,
        login_id: &str,
        token: impl Into<String>,
    ) -> Result<Dispatch, ParleyError> {
        let Some(entry) = self.pending.redeem(login_id) else {
            warn!(login_id, "login completion for unknown or expired id");
            return Err(ParleyError::Auth(
                "unknown or expired login session".to_string(),
            ));
        };

        let store = self.store_for(&entry.integration)?;
        let identity = Identity(entry.message.user_id.clone());
        store
            .put(&entry.integration, &identity, Credentials::new(token))
            .await?;
        info!(
            integration = entry.integration.as_str(),
            identity = %identity,
            "login completed; replaying parked command"
        );

        self.dispatch(entry.message, entry.sink).await
    }

    /// Closest registered full command, if similar enough to be worth
    /// suggesting.
    pub fn suggest(&self, text: &str) -> Option<String> {
        let input = text.trim().to_lowercase();
        self.registry
            .full_commands()
            .into_iter()
            .map(|candidate| {
                let score = strsim::jaro_winkler(&input, &candidate.to_lowercase());
                (candidate, score)
            })
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(candidate, _)| candidate)
    }

    fn store_for(&self, integration: &str) -> Result<Arc<dyn CredentialStore>, ParleyError> {
        self.stores.get(integration).cloned().ok_or_else(|| {
            ParleyError::Auth(format!(
                "integration `{integration}` requires auth but has no credential store"
            ))
        })
    }

    fn ttl_for(&self, integration: &str) -> Duration {
        self.registry
            .integration(integration)
            .and_then(|i| i.auth())
            .and_then(|a| a.ttl)
            .unwrap_or(self.credentials_ttl)
    }

    /// Either passes the gate with fresh credentials, or parks the message
    /// and prompts the user with a login URL.
    async fn pass_auth_gate(
        &self,
        integration: &str,
        msg: &InboundMessage,
        sink: &Arc<dyn OutboundSink>,
    ) -> Result<Gate, ParleyError> {
        let store = self.store_for(integration)?;
        let identity = Identity(msg.user_id.clone());
        let ttl = self.ttl_for(integration);

        if let Some(credentials) = store.get(integration, &identity).await? {
            if credentials.is_valid_at(ttl, chrono::Utc::now()) {
                // Sliding TTL: every gated use refreshes the access time.
                let refreshed = Credentials::new(credentials.token.clone());
                store.put(integration, &identity, refreshed.clone()).await?;
                return Ok(Gate::Pass(refreshed));
            }
            debug!(integration, identity = %identity, "credentials expired");
        }

        let login_id = self
            .pending
            .park(integration, msg.clone(), Arc::clone(sink));
        let url = store.login_url(integration, &login_id);
        info!(integration, identity = %identity, login_id = login_id.as_str(), "login required");
        sink.deliver(OutboundMessage::reply_to(
            msg,
            format!("You need to log in to `{integration}` first: {url}"),
        ))
        .await?;
        Ok(Gate::Parked(login_id))
    }
}

enum Gate {
    Pass(Credentials),
    Parked(String),
}


impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("integrations", &self.registry.list_integrations().count())
            .field("pending_logins", &self.pending.len())
            .finish_non_exhaustive()
    }
}
