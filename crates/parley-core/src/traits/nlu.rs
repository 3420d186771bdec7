// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! NLU adapter trait for intent matching and slot extraction.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::NluResult;

/// External NLU / fuzzy-match scorer.
///
/// The scoring algorithm is not Parley's concern: the adapter returns an
/// intent with a similarity score in [0, 1] and any extracted slot values.
/// Callers treat a confidence below their configured threshold as "no match".
#[async_trait]
pub trait NluAdapter: PluginAdapter {
    /// Parses a raw utterance into an intent and slot values, if any intent matches.
    async fn parse(&self, text: &str) -> Result<Option<NluResult>, ParleyError>;
}
