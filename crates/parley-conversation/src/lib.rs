// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dialog engine: schema compilation, per-identity conversation state
//! machines, and the manager that tracks every live conversation.
//!
//! The flow is: an integration registers a schema spec (static TOML,
//! built at runtime, a JSON Schema object, or an NLU slot schema), the
//! manager compiles it into steps when a conversation begins, and inbound
//! messages for that identity are routed through the conversation until it
//! ends, closes, or idles out.

pub mod conversation;
pub mod manager;
pub mod schema;

pub use conversation::{
    AnswerFragment, Answers, ChoiceHandler, Conversation, Lifecycle, Status,
};
pub use manager::{ConversationManager, ConversationSummary, ManagerDenial, TurnOutput};
pub use schema::{
    AnswerKind, AnswerSpec, ChoiceOption, ConversationSchema, SchemaError, SchemaKind, SchemaSpec,
    Step, StepSpec,
};
