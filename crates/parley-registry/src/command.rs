// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command descriptors and the matcher grammar.
//!
//! A registered command is matched against raw inbound text as
//! `"<integration> <verb>[ <entity>][<suffix>]"`, anchored and
//! case-insensitive. The suffix fragment is derived from [`SuffixSpec`]:
//!
//! - no suffix spec: the exact literal only
//! - `{ pattern: none, optional: true }`: an optional free-text remainder
//! - `{ pattern: p, optional: true }`: `(?: p)?`
//! - `{ pattern: p, optional: false }`: ` p` (mandatory, space-prefixed)

use std::sync::Arc;

use futures::future::BoxFuture;
use regex::{Regex, RegexBuilder};

use parley_core::{Credentials, InboundMessage, OutboundSink, ParleyError};

use crate::error::RegistryError;

/// Suffix-matching spec for the text following the verb/entity literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixSpec {
    /// Regex fragment the remainder must match; `None` means free text.
    pub pattern: Option<String>,
    /// Whether the remainder may be absent.
    pub optional: bool,
}

impl Default for SuffixSpec {
    /// The default spec accepts an optional free-text remainder.
    fn default() -> Self {
        Self {
            pattern: None,
            optional: true,
        }
    }
}

/// Everything a command handler receives on invocation.
pub struct CommandContext {
    /// The inbound message that matched.
    pub message: InboundMessage,
    /// Capture groups extracted from the suffix, in group order.
    pub captures: Vec<Option<String>>,
    /// Credentials attached by the authentication gate, when the integration
    /// requires auth.
    pub credentials: Option<Credentials>,
    /// Outbound delivery seam for replies.
    pub sink: Arc<dyn OutboundSink>,
}

/// Boxed future returned by command handlers.
pub type HandlerFuture = BoxFuture<'static, Result<(), ParleyError>>;

/// The callback invoked when a command matches.
pub type CommandHandler = Arc<dyn Fn(CommandContext) -> HandlerFuture + Send + Sync>;

/// Registration input for one command.
pub struct CommandSpec {
    /// Single-token verb.
    pub verb: String,
    /// Optional single-token entity.
    pub entity: Option<String>,
    /// Suffix spec; `None` means the command accepts the exact literal only.
    pub suffix: Option<SuffixSpec>,
    /// Human-readable help text.
    pub help: String,
    /// Parameter names for help display.
    pub params: Vec<String>,
    /// Whether the integration's authentication gate applies. Defaults to
    /// true; a command may opt out.
    pub requires_auth: bool,
    /// The callback invoked on match.
    pub handler: CommandHandler,
}

impl CommandSpec {
    /// Shorthand for a plain command: default suffix, auth per integration.
    pub fn new(
        verb: impl Into<String>,
        entity: Option<&str>,
        help: impl Into<String>,
        handler: CommandHandler,
    ) -> Self {
        Self {
            verb: verb.into(),
            entity: entity.map(str::to_string),
            suffix: Some(SuffixSpec::default()),
            help: help.into(),
            params: Vec::new(),
            requires_auth: true,
            handler,
        }
    }
}

/// One compiled verb/entity command within an integration.
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Single-token verb.
    pub verb: String,
    /// Optional single-token entity.
    pub entity: Option<String>,
    /// Normalized lowercase `verb[ entity]` key; unique per integration.
    pub key: String,
    /// Help text.
    pub help: String,
    /// Parameter names for help display.
    pub params: Vec<String>,
    /// Auto-generated full command string for help listings.
    pub full_command: String,
    /// Whether dispatch passes through the authentication gate.
    pub requires_auth: bool,
    matcher: Regex,
    pub(crate) handler: CommandHandler,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("key", &self.key)
            .field("full_command", &self.full_command)
            .field("requires_auth", &self.requires_auth)
            .field("matcher", &self.matcher.as_str())
            .finish_non_exhaustive()
    }
}

impl CommandDescriptor {
    /// Compile a registration spec into a matchable descriptor.
    pub(crate) fn compile(
        integration: &str,
        spec: CommandSpec,
        integration_has_auth: bool,
    ) -> Result<Self, RegistryError> {
        let verb = single_token(&spec.verb)?;
        let entity = spec.entity.as_deref().map(single_token).transpose()?;

        let key = match &entity {
            Some(e) => format!("{} {}", verb.to_lowercase(), e.to_lowercase()),
            None => verb.to_lowercase(),
        };

        let mut pattern = format!("^{} {}", regex::escape(integration), regex::escape(&verb));
        if let Some(e) = &entity {
            pattern.push(' ');
            pattern.push_str(&regex::escape(e));
        }

        match &spec.suffix {
            None => {}
            Some(SuffixSpec {
                pattern: None,
                optional: true,
            }) => pattern.push_str(" ?(.*)?"),
            Some(SuffixSpec {
                pattern: None,
                optional: false,
            }) => return Err(RegistryError::MalformedSuffix),
            Some(SuffixSpec {
                pattern: Some(p),
                optional,
            }) => {
                if *optional {
                    pattern.push_str(&format!("(?: {p})?"));
                } else {
                    pattern.push_str(&format!(" {p}"));
                }
            }
        }
        pattern.push('$');

        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RegistryError::BadSuffixPattern {
                pattern: spec.suffix.and_then(|s| s.pattern).unwrap_or_default(),
                source: Box::new(e),
            })?;

        let mut full_command = format!("{integration} {key}");
        for param in &spec.params {
            full_command.push_str(&format!(" <{param}>"));
        }

        Ok(Self {
            verb,
            entity,
            key,
            help: spec.help,
            params: spec.params,
            full_command,
            requires_auth: integration_has_auth && spec.requires_auth,
            matcher,
            handler: spec.handler,
        })
    }

    /// Test raw text against this command's matcher.
    ///
    /// Returns the suffix capture groups (group 0 excluded) on a match.
    pub fn matches(&self, text: &str) -> Option<Vec<Option<String>>> {
        self.matcher.captures(text.trim()).map(|caps| {
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect()
        })
    }

    /// The callback invoked on match.
    pub fn handler(&self) -> CommandHandler {
        Arc::clone(&self.handler)
    }
}

/// Validate that a string is one non-empty token without whitespace.
fn single_token(s: &str) -> Result<String, RegistryError> {
    if s.is_empty() || s.contains(char::is_whitespace) {
        return Err(RegistryError::InvalidToken(s.to_string()));
    }
    Ok(s.to_string())
}
