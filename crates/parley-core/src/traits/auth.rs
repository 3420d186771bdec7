// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential store trait backing the router's authentication gate.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Credentials, Identity};

/// Per-integration credential cache and login-URL generator.
///
/// The router consults the store before invoking an auth-gated command
/// handler. Login completion happens out of band: an external HTTP callback
/// supplies credentials through [`CommandRouter::complete_login`], which
/// writes them back here via [`put`].
///
/// [`CommandRouter::complete_login`]: ../../parley_router/struct.CommandRouter.html
/// [`put`]: CredentialStore::put
#[async_trait]
pub trait CredentialStore: PluginAdapter {
    /// Looks up cached credentials for `(integration, identity)`.
    async fn get(&self, integration: &str, identity: &Identity)
        -> Result<Option<Credentials>, ParleyError>;

    /// Caches credentials for `(integration, identity)`.
    async fn put(
        &self,
        integration: &str,
        identity: &Identity,
        credentials: Credentials,
    ) -> Result<(), ParleyError>;

    /// Formats the one-time login URL for a pending login session.
    fn login_url(&self, integration: &str, login_id: &str) -> String;
}
