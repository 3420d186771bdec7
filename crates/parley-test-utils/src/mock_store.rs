// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory credential store for auth-gate tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use parley_core::types::{AdapterType, HealthStatus};
use parley_core::{CredentialStore, Credentials, Identity, ParleyError, PluginAdapter};

/// A credential store backed by a plain map. Login URLs are deterministic so
/// tests can assert on them.
#[derive(Default)]
pub struct MockCredentialStore {
    creds: Mutex<HashMap<(String, String), Credentials>>,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed credentials without going through a login.
    pub fn seed(&self, integration: &str, identity: &Identity, credentials: Credentials) {
        self.creds
            .lock()
            .unwrap()
            .insert((integration.to_string(), identity.0.clone()), credentials);
    }

    /// Number of stored credential entries.
    pub fn len(&self) -> usize {
        self.creds.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.creds.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl PluginAdapter for MockCredentialStore {
    fn name(&self) -> &str {
        "mock-credential-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CredentialStore
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn get(
        &self,
        integration: &str,
        identity: &Identity,
    ) -> Result<Option<Credentials>, ParleyError> {
        Ok(self
            .creds
            .lock()
            .unwrap()
            .get(&(integration.to_string(), identity.0.clone()))
            .cloned())
    }

    async fn put(
        &self,
        integration: &str,
        identity: &Identity,
        credentials: Credentials,
    ) -> Result<(), ParleyError> {
        self.seed(integration, identity, credentials);
        Ok(())
    }

    fn login_url(&self, integration: &str, login_id: &str) -> String {
        format!("https://mock.test/{integration}/login/{login_id}")
    }
}
