// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command registry: integrations and their registered commands.
//!
//! The registry is written once during bootstrap and read on every inbound
//! message. It is constructed explicitly and shared as `Arc<CommandRegistry>`;
//! there is no ambient singleton.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{debug, info};

use crate::command::{CommandDescriptor, CommandSpec};
use crate::error::RegistryError;

/// Base reserved words that can never be used as an integration name, verb,
/// or entity. The bot's own name and caller-declared extras are added at
/// construction.
const BASE_RESERVED: [&str; 2] = ["help", "skip"];

/// Declares that an integration's commands pass through the authentication
/// gate.
#[derive(Debug, Clone, Default)]
pub struct AuthRequirement {
    /// Credential TTL override; `None` uses the gateway-wide setting.
    pub ttl: Option<Duration>,
}

/// Descriptive metadata for an integration.
#[derive(Debug, Clone, Default)]
pub struct IntegrationMeta {
    /// One-line description for the integration list.
    pub short_description: String,
    /// Longer description for per-integration help.
    pub long_description: String,
}

/// A registered namespace of commands.
#[derive(Debug)]
pub struct Integration {
    name: String,
    meta: IntegrationMeta,
    auth: Option<AuthRequirement>,
    commands: Vec<CommandDescriptor>,
    keys: BTreeSet<String>,
}

impl Integration {
    /// The integration's unique lowercase name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptive metadata.
    pub fn meta(&self) -> &IntegrationMeta {
        &self.meta
    }

    /// The integration's authentication requirement, if declared.
    pub fn auth(&self) -> Option<&AuthRequirement> {
        self.auth.as_ref()
    }

    /// Registered commands, in registration order.
    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }
}

/// Stores integration metadata and registered command descriptors.
///
/// Registration failures are fatal configuration errors raised at startup;
/// lookups never fail after bootstrap.
#[derive(Debug)]
pub struct CommandRegistry {
    bot_name: String,
    integrations: BTreeMap<String, Integration>,
    reserved: BTreeSet<String>,
}

impl CommandRegistry {
    /// Create an empty registry.
    ///
    /// `bot_name` joins the reserved-word set along with `help`, `skip`, and
    /// any caller-declared extras.
    pub fn new(bot_name: impl Into<String>, extra_reserved: &[String]) -> Self {
        let bot_name = bot_name.into();
        let mut reserved: BTreeSet<String> =
            BASE_RESERVED.iter().map(|s| s.to_string()).collect();
        reserved.insert(bot_name.to_lowercase());
        reserved.extend(extra_reserved.iter().map(|s| s.to_lowercase()));

        Self {
            bot_name,
            integrations: BTreeMap::new(),
            reserved,
        }
    }

    /// The bot name this registry was built for.
    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Register an integration namespace.
    ///
    /// Fails if the name is empty, not a single lowercase token, reserved,
    /// or already registered. Integrations are immutable once registered and
    /// live for the process lifetime.
    pub fn register_integration(
        &mut self,
        name: &str,
        meta: IntegrationMeta,
        auth: Option<AuthRequirement>,
    ) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.contains(char::is_whitespace) || name.to_lowercase() != name {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.reserved.contains(name) {
            return Err(RegistryError::ReservedWord(name.to_string()));
        }
        if self.integrations.contains_key(name) {
            return Err(RegistryError::DuplicateIntegration(name.to_string()));
        }

        info!(integration = name, auth = auth.is_some(), "integration registered");
        self.integrations.insert(
            name.to_string(),
            Integration {
                name: name.to_string(),
                meta,
                auth,
                commands: Vec::new(),
                keys: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Register a command under an integration.
    ///
    /// Fails if the integration is unregistered, the verb or entity is not a
    /// single token or is reserved, the normalized `verb[ entity]` key is a
    /// case-insensitive duplicate, or the suffix spec is malformed.
    pub fn register_command(
        &mut self,
        integration: &str,
        spec: CommandSpec,
    ) -> Result<(), RegistryError> {
        for token in std::iter::once(&spec.verb).chain(spec.entity.iter()) {
            if self.reserved.contains(&token.to_lowercase()) {
                return Err(RegistryError::ReservedWord(token.clone()));
            }
        }

        let entry = self
            .integrations
            .get_mut(integration)
            .ok_or_else(|| RegistryError::UnknownIntegration(integration.to_string()))?;

        let descriptor = CommandDescriptor::compile(integration, spec, entry.auth.is_some())?;

        if !entry.keys.insert(descriptor.key.clone()) {
            return Err(RegistryError::DuplicateCommand {
                integration: integration.to_string(),
                key: descriptor.key,
            });
        }

        debug!(
            integration,
            command = descriptor.full_command.as_str(),
            "command registered"
        );
        entry.commands.push(descriptor);
        Ok(())
    }

    /// All integrations in deterministic (name) order.
    pub fn list_integrations(&self) -> impl Iterator<Item = &Integration> {
        self.integrations.values()
    }

    /// Commands registered under one integration, in registration order.
    pub fn list_commands(&self, integration: &str) -> Result<&[CommandDescriptor], RegistryError> {
        self.integrations
            .get(integration)
            .map(Integration::commands)
            .ok_or_else(|| RegistryError::UnknownIntegration(integration.to_string()))
    }

    /// Look up one command by verb and optional entity.
    pub fn describe(
        &self,
        integration: &str,
        verb: &str,
        entity: Option<&str>,
    ) -> Option<&CommandDescriptor> {
        let key = match entity {
            Some(e) => format!("{} {}", verb.to_lowercase(), e.to_lowercase()),
            None => verb.to_lowercase(),
        };
        self.integrations
            .get(integration)?
            .commands
            .iter()
            .find(|c| c.key == key)
    }

    /// The integration an inbound command belongs to.
    pub fn integration(&self, name: &str) -> Option<&Integration> {
        self.integrations.get(name)
    }

    /// Full-command strings of every registered command, for help listings
    /// and fuzzy not-found suggestions.
    pub fn full_commands(&self) -> Vec<String> {
        self.integrations
            .values()
            .flat_map(|i| i.commands.iter().map(|c| c.full_command.clone()))
            .collect()
    }
}
