// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering for the built-in `help` and `conversations` surfaces.

use parley_conversation::ConversationSummary;
use parley_registry::CommandRegistry;

/// Top-level help: one line per integration plus the built-in verbs.
pub fn render_overview(registry: &CommandRegistry) -> String {
    let mut lines = vec![format!(
        "I'm {}. Here's what I know about:",
        registry.bot_name()
    )];
    for integration in registry.list_integrations() {
        let short = integration.meta().short_description.as_str();
        if short.is_empty() {
            lines.push(format!("  {}", integration.name()));
        } else {
            lines.push(format!("  {} -- {short}", integration.name()));
        }
    }
    lines.push(String::new());
    lines.push("Say `help <integration>` for its commands.".to_string());
    lines.push(
        "Built-ins: `pause`, `resume`, `cancel`, `cancel all`, `conversations`.".to_string(),
    );
    lines.join("\n")
}

/// Per-integration help: long description plus each command with its help
/// text.
pub fn render_integration(registry: &CommandRegistry, name: &str) -> String {
    let Some(integration) = registry.integration(&name.to_lowercase()) else {
        return format!("I don't know an integration called `{name}`. Say `help` for the list.");
    };

    let mut lines = Vec::new();
    let long = integration.meta().long_description.as_str();
    if long.is_empty() {
        lines.push(format!("Commands for `{}`:", integration.name()));
    } else {
        lines.push(long.to_string());
    }
    for command in integration.commands() {
        lines.push(format!("  {} -- {}", command.full_command, command.help));
    }
    if integration.auth().is_some() {
        lines.push(String::new());
        lines.push("This integration requires login.".to_string());
    }
    lines.join("\n")
}

/// The `conversations` listing for one identity.
pub fn render_conversations(rows: &[ConversationSummary]) -> String {
    if rows.is_empty() {
        return "You have no conversations.".to_string();
    }
    let mut lines = vec!["Your conversations:".to_string()];
    for row in rows {
        lines.push(format!(
            "  {} `{}` ({}) -- {}, started {}",
            row.id,
            row.name,
            row.integration,
            row.status,
            row.started_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    lines.join("\n")
}

/// Fallback for text nothing matched.
pub fn render_not_found(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(candidate) => {
            format!("I didn't catch that. Did you mean `{candidate}`? Say `help` for everything I know.")
        }
        None => "I didn't catch that. Say `help` for everything I know.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_registry::IntegrationMeta;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new("parley", &[]);
        registry
            .register_integration(
                "ops",
                IntegrationMeta {
                    short_description: "Deployments and status".into(),
                    long_description: "Operational commands for the platform team.".into(),
                },
                None,
            )
            .unwrap();
        registry
    }

    #[test]
    fn overview_lists_integrations_and_builtins() {
        let rendered = render_overview(&registry());
        assert!(rendered.contains("ops -- Deployments and status"));
        assert!(rendered.contains("`cancel all`"));
    }

    #[test]
    fn unknown_integration_help_is_graceful() {
        let rendered = render_integration(&registry(), "nope");
        assert!(rendered.contains("`nope`"));
        assert!(rendered.contains("help"));
    }

    #[test]
    fn integration_lookup_is_case_insensitive() {
        let rendered = render_integration(&registry(), "OPS");
        assert!(rendered.contains("Operational commands"));
    }

    #[test]
    fn not_found_mentions_the_suggestion() {
        assert!(render_not_found(Some("ops deploy")).contains("`ops deploy`"));
        assert!(!render_not_found(None).contains("Did you mean"));
    }
}
