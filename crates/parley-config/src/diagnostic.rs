// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rich diagnostics for configuration failures.
//!
//! Parley's config model is flat: top-level `[section]` tables with scalar
//! keys, everything defaulted. That leaves two interesting failure shapes --
//! a key nobody knows (usually a typo) and a value of the wrong shape --
//! plus the semantic checks from [`crate::validation`]. Figment errors are
//! folded into those three, with miette source spans and a Jaro-Winkler
//! "did you mean?" for the typos.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity before a key is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error, ready for miette rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key no section recognizes, with precomputed advice.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(code(parley::config::unknown_key), help("{advice}"))]
    UnknownKey {
        key: String,
        advice: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value figment could not deserialize into the model.
    #[error("bad value at `{path}`: {detail}")]
    #[diagnostic(code(parley::config::bad_value))]
    BadValue { path: String, detail: String },

    /// A semantic constraint violation found after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(parley::config::validation))]
    Validation { message: String },
}

/// Fold a `figment::Error` into `ConfigError` diagnostics.
///
/// One figment error can bundle several underlying failures; each becomes
/// its own diagnostic. `toml_sources` maps file paths to their contents so
/// unknown keys can be annotated with a source span.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter().map(|e| classify(e, toml_sources)).collect()
}

fn classify(error: figment::Error, sources: &[(String, String)]) -> ConfigError {
    use figment::error::Kind;

    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let advice = match suggest_key(field, expected) {
                Some(hit) => format!("did you mean `{hit}`? Valid keys: {}", expected.join(", ")),
                None => format!("valid keys: {}", expected.join(", ")),
            };
            let (span, src) = match locate(&error, field, sources) {
                Some((span, src)) => (Some(span), Some(src)),
                None => (None, None),
            };
            ConfigError::UnknownKey {
                key: field.clone(),
                advice,
                span,
                src,
            }
        }
        _ => {
            let mut path = error
                .path
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                path = "<config>".into();
            }
            ConfigError::BadValue {
                path,
                detail: error.to_string(),
            }
        }
    }
}

/// Pin the offending key to a span in the TOML file figment read it from.
fn locate(
    error: &figment::error::Error,
    key: &str,
    sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        })?;
    let (name, content) = sources.iter().find(|(p, _)| *p == file)?;

    let section = error.path.first().map(String::as_str);
    let span = span_for_key(content, section, key)?;
    Some((span, NamedSource::new(name, content.clone())))
}

/// Scan TOML content for `key = ...` under the given section (or at top
/// level for `None`), returning a span over the key name.
fn span_for_key(content: &str, section: Option<&str>, key: &str) -> Option<SourceSpan> {
    let mut current: Option<&str> = None;
    let mut offset = 0usize;

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = Some(header.trim());
        } else if current == section {
            if let Some((lhs, _)) = line.split_once('=') {
                if lhs.trim() == key {
                    let column = line.find(key).unwrap_or(0);
                    return Some(SourceSpan::new((offset + column).into(), key.len()));
                }
            }
        }
        offset += line.len() + 1;
    }

    None
}

/// The closest valid key to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("config error: {error}"),
        }
    }
}
