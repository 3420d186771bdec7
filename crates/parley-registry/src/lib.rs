// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command registration and matcher compilation for the Parley gateway.
//!
//! An integration registers a namespace once at startup, then registers
//! verb/entity commands under it. Each command compiles to an anchored
//! case-insensitive matcher; duplicate or conflicting registrations abort
//! startup with [`RegistryError`].

pub mod command;
pub mod error;
pub mod registry;

pub use command::{CommandContext, CommandDescriptor, CommandHandler, CommandSpec, SuffixSpec};
pub use error::RegistryError;
pub use registry::{AuthRequirement, CommandRegistry, Integration, IntegrationMeta};
