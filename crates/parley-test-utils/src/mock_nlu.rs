// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted NLU adapter: exact-utterance lookup instead of a real scorer.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use parley_core::types::{AdapterType, HealthStatus, NluResult};
use parley_core::{NluAdapter, ParleyError, PluginAdapter};

/// An NLU adapter whose answers are scripted per utterance.
#[derive(Default)]
pub struct MockNlu {
    responses: Mutex<HashMap<String, NluResult>>,
}

impl MockNlu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result returned for an exact utterance.
    pub fn script(&self, utterance: &str, result: NluResult) {
        self.responses
            .lock()
            .unwrap()
            .insert(utterance.to_string(), result);
    }
}

#[async_trait]
impl PluginAdapter for MockNlu {
    fn name(&self) -> &str {
        "mock-nlu"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Nlu
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl NluAdapter for MockNlu {
    async fn parse(&self, text: &str) -> Result<Option<NluResult>, ParleyError> {
        Ok(self.responses.lock().unwrap().get(text).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_utterances_return_none() {
        let nlu = MockNlu::new();
        assert!(nlu.parse("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scripted_utterances_return_the_script() {
        let nlu = MockNlu::new();
        nlu.script(
            "book a room",
            NluResult {
                intent: "book".into(),
                confidence: 0.95,
                entities: Vec::new(),
            },
        );

        let result = nlu.parse("book a room").await.unwrap().unwrap();
        assert_eq!(result.intent, "book");
    }
}
