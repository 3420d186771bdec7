// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles for the Parley workspace.
//!
//! Everything here is deterministic: the mock channel replays injected
//! messages, the mock credential store is a plain map, and the mock NLU
//! adapter answers from a script.

pub mod mock_channel;
pub mod mock_nlu;
pub mod mock_store;

pub use mock_channel::MockChannel;
pub use mock_nlu::MockNlu;
pub use mock_store::MockCredentialStore;
