// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-to-command routing for the Parley gateway.
//!
//! Resolution is deterministic: integrations in name order, commands in
//! registration order, first match wins. Auth-gated commands pass through a
//! two-phase gate backed by a [`CredentialStore`]; messages arriving without
//! valid credentials are parked as pending logins and replayed when the
//! login callback fires.
//!
//! [`CredentialStore`]: parley_core::traits::CredentialStore

pub mod pending;
pub mod router;

pub use pending::{PendingLogin, PendingLogins};
pub use router::{CommandRouter, Dispatch, Resolution};
