// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-dialog FSM that sequences question/answer steps for one user.
//!
//! A conversation is `Active` or `Paused`; the terminal outcomes (`End`,
//! `Close`, expiry) are events, not states. Steps run strictly in order:
//! each step registers its own one-shot choices and the next step is only
//! asked once the current one resolves. All mutation happens synchronously
//! within a single message turn; outbound text accumulates in an outbox the
//! caller drains after each call.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use parley_core::{
    types::{ActionKind, MessageAction},
    ConversationId, Identity, InboundMessage, OutboundMessage, ParleyError,
};

use crate::schema::{self, AnswerKind, ConversationSchema, SchemaKind};

/// States a conversation can occupy between turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Receiving messages for its identity.
    Active,
    /// Shelved behind a newer conversation; not receiving messages.
    Paused,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Active => write!(f, "active"),
            Status::Paused => write!(f, "paused"),
        }
    }
}

/// Terminal outcome of a conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    /// Normal completion with the collected answers.
    End(Answers),
    /// Abnormal termination (user declined the confirmation).
    Close,
}

/// One recorded answer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum AnswerFragment {
    /// A bare value appended without a name.
    Bare(Value),
    /// A named value.
    Keyed(String, Value),
}

/// Ordered answer accumulation. Insertion order matters: the final summary
/// walks fragments in the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Answers(pub Vec<AnswerFragment>);

impl Answers {
    /// All values in insertion order, names dropped.
    pub fn values(&self) -> Vec<&Value> {
        self.0
            .iter()
            .map(|f| match f {
                AnswerFragment::Bare(v) => v,
                AnswerFragment::Keyed(_, v) => v,
            })
            .collect()
    }

    /// Keyed fragments merged into a map, in insertion order.
    pub fn merged(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        for fragment in &self.0 {
            if let AnswerFragment::Keyed(key, value) = fragment {
                map.insert(key.clone(), value.clone());
            }
        }
        map
    }

    /// Number of recorded fragments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Synchronous handler for a manually registered choice.
pub type ChoiceHandler =
    Arc<dyn Fn(&regex::Captures<'_>, &mut Conversation) -> Option<Lifecycle> + Send + Sync>;

/// What happens when a registered choice matches.
#[derive(Clone)]
enum ChoiceAction {
    /// Advance past a non-required step, recording its default if present.
    Skip,
    /// Record a chosen option's value and advance.
    SelectOption { value: Value },
    /// Validate and record free text.
    CaptureText,
    /// Merge `key: value` input into the running partial object.
    CaptureObject,
    /// NLU confirmation accepted.
    ConfirmYes,
    /// NLU confirmation declined.
    ConfirmNo,
    /// Integration-registered handler.
    Custom(ChoiceHandler),
}

/// A transient regex-to-action binding, valid until the next matched message.
#[derive(Clone)]
struct Choice {
    pattern: Regex,
    action: ChoiceAction,
}

/// One running dialog instance.
pub struct Conversation {
    id: ConversationId,
    name: String,
    integration: String,
    identity: Identity,
    status: Status,
    schema: Option<ConversationSchema>,
    cursor: usize,
    answers: Answers,
    partial_object: serde_json::Map<String, Value>,
    last_question: Option<String>,
    started_at: chrono::DateTime<chrono::Utc>,
    pause_seq: Option<u64>,
    expiry: Duration,
    deadline: Instant,
    choices: Vec<Choice>,
    skip_pattern: Regex,
    confirming: bool,
    // Addressing for everything this conversation says.
    channel: String,
    room_id: String,
    outbox: Vec<OutboundMessage>,
}

impl Conversation {
    /// Create a conversation bound to the identity and room of its
    /// triggering message. Does not ask anything until [`start`] is called.
    ///
    /// [`start`]: Conversation::start
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ConversationId,
        name: impl Into<String>,
        integration: impl Into<String>,
        identity: Identity,
        schema: Option<ConversationSchema>,
        trigger: &InboundMessage,
        expiry: Duration,
        skip_keyword: &str,
    ) -> Self {
        // An unparseable keyword falls back to the built-in default rather
        // than failing conversation creation.
        let skip_pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(skip_keyword)))
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| Regex::new(r"\bskip\b").unwrap());

        Self {
            id,
            name: name.into(),
            integration: integration.into(),
            identity,
            status: Status::Active,
            schema,
            cursor: 0,
            answers: Answers::default(),
            partial_object: serde_json::Map::new(),
            last_question: None,
            started_at: chrono::Utc::now(),
            pause_seq: None,
            expiry,
            deadline: Instant::now() + expiry,
            choices: Vec::new(),
            skip_pattern,
            confirming: false,
            channel: trigger.channel.clone(),
            room_id: trigger.room_id.clone(),
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn integration(&self) -> &str {
        &self.integration
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Answers collected so far.
    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    /// The question most recently asked, if any.
    pub fn last_question(&self) -> Option<&str> {
        self.last_question.as_deref()
    }

    /// When the conversation was created.
    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    /// Pause ordering key; set only while paused.
    pub fn pause_seq(&self) -> Option<u64> {
        self.pause_seq
    }

    /// Instant at which the idle expiry fires unless the deadline moves.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Push the idle deadline out by the configured expiry.
    pub fn touch(&mut self) {
        self.deadline = Instant::now() + self.expiry;
    }

    /// Mark paused with the given ordering sequence.
    ///
    /// Pausing does not clear the expiry deadline; a paused conversation can
    /// still expire.
    pub fn pause(&mut self, seq: u64) {
        debug!(id = %self.id, seq, "conversation paused");
        self.status = Status::Paused;
        self.pause_seq = Some(seq);
    }

    /// Return to active duty.
    pub fn resume(&mut self) {
        debug!(id = %self.id, "conversation resumed");
        self.status = Status::Active;
        self.pause_seq = None;
    }

    /// Queue a plain-text message addressed to the conversation's room.
    pub fn say(&mut self, text: impl Into<String>) {
        self.outbox.push(OutboundMessage {
            channel: self.channel.clone(),
            room_id: self.room_id.clone(),
            text: text.into(),
            actions: Vec::new(),
            reply_to: None,
        });
    }

    fn say_with_actions(&mut self, text: impl Into<String>, actions: Vec<MessageAction>) {
        self.outbox.push(OutboundMessage {
            channel: self.channel.clone(),
            room_id: self.room_id.clone(),
            text: text.into(),
            actions,
            reply_to: None,
        });
    }

    /// Drain everything the conversation wants to send this turn.
    pub fn drain_outbox(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Append a bare answer value.
    pub fn update_answers(&mut self, value: Value) {
        self.answers.0.push(AnswerFragment::Bare(value));
    }

    /// Append a named answer fragment.
    pub fn update_answers_keyed(&mut self, key: impl Into<String>, value: Value) {
        self.answers.0.push(AnswerFragment::Keyed(key.into(), value));
    }

    /// Register a custom choice. Every registration extends the idle
    /// deadline.
    pub fn add_choice(&mut self, pattern: &str, handler: ChoiceHandler) -> Result<(), ParleyError> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ParleyError::Config(format!("invalid choice pattern `{pattern}`: {e}")))?;
        self.push_choice(compiled, ChoiceAction::Custom(handler));
        Ok(())
    }

    fn push_choice(&mut self, pattern: Regex, action: ChoiceAction) {
        self.choices.push(Choice { pattern, action });
        self.touch();
    }

    /// Begin the dialog: record any prefilled slot answers, then ask the
    /// first step. Schema-less conversations wait for manual choices.
    ///
    /// Returns a lifecycle outcome immediately when an NLU schema had every
    /// slot pre-extracted (the dialog goes straight to confirmation).
    pub fn start(&mut self) -> Option<Lifecycle> {
        let Some(schema) = self.schema.clone() else {
            return None;
        };

        for (key, value) in &schema.prefilled {
            self.update_answers_keyed(key.clone(), value.clone());
        }

        if schema.steps.is_empty() {
            return self.complete(&schema);
        }
        self.ask_step(&schema, 0);
        None
    }

    /// Process one inbound message.
    ///
    /// Choices are tested in registration order and the first match wins. On
    /// a match the transient choice list is cleared before the action runs
    /// (actions re-register what they still need). With no match the idle
    /// deadline is reset and nothing is sent -- noise keeps the session
    /// alive but gets no reply.
    pub fn receive_message(&mut self, msg: &InboundMessage) -> Option<Lifecycle> {
        let text = msg.text.trim().to_string();

        let matched = self
            .choices
            .iter()
            .position(|c| c.pattern.is_match(&text));

        let Some(index) = matched else {
            debug!(id = %self.id, "no choice matched; deadline reset");
            self.touch();
            return None;
        };

        let choices = std::mem::take(&mut self.choices);
        let choice = &choices[index];
        let action = choice.action.clone();
        let pattern = choice.pattern.clone();
        self.touch();

        match action {
            ChoiceAction::Skip => self.handle_skip(),
            ChoiceAction::SelectOption { value } => self.handle_select(value),
            ChoiceAction::CaptureText => self.handle_text(&text),
            ChoiceAction::CaptureObject => self.handle_object(&text),
            ChoiceAction::ConfirmYes => Some(Lifecycle::End(self.answers.clone())),
            ChoiceAction::ConfirmNo => {
                self.say("Okay, discarding this.");
                Some(Lifecycle::Close)
            }
            ChoiceAction::Custom(handler) => match pattern.captures(&text) {
                Some(caps) => handler(&caps, self),
                None => None,
            },
        }
    }

    fn current_step_entity(&self) -> Option<String> {
        self.schema
            .as_ref()
            .and_then(|s| s.steps.get(self.cursor))
            .and_then(|s| s.answer.entity_name.clone())
    }

    fn handle_skip(&mut self) -> Option<Lifecycle> {
        let schema = self.schema.clone()?;
        let step = schema.steps.get(self.cursor)?;
        if let Some(default) = &step.answer.default {
            match &step.answer.entity_name {
                Some(key) => self.update_answers_keyed(key.clone(), default.clone()),
                None => self.update_answers(default.clone()),
            }
        }
        self.advance(&schema)
    }

    fn handle_select(&mut self, value: Value) -> Option<Lifecycle> {
        let schema = self.schema.clone()?;
        match self.current_step_entity() {
            Some(key) => self.update_answers_keyed(key, value),
            None => self.update_answers(value),
        }
        self.advance(&schema)
    }

    fn handle_text(&mut self, text: &str) -> Option<Lifecycle> {
        let schema = self.schema.clone()?;
        let step = &schema.steps[self.cursor];
        let value = parse_scalar(text);

        if let Some(validator) = &step.validator {
            let result = schema::validate(&value, validator);
            if !result.ok {
                let detail = result.message.unwrap_or_else(|| "invalid value".into());
                self.say(format!("That doesn't look right: {detail}. Please try again."));
                self.register_step_choices(&schema, self.cursor);
                return None;
            }
        }

        match self.current_step_entity() {
            Some(key) => self.update_answers_keyed(key, value),
            None => self.update_answers(value),
        }
        self.advance(&schema)
    }

    fn handle_object(&mut self, text: &str) -> Option<Lifecycle> {
        let schema = self.schema.clone()?;

        let pairs = match parse_key_values(text) {
            Ok(pairs) => pairs,
            Err(bad) => {
                self.say(format!(
                    "I couldn't read `{bad}` -- use `key: value, key: value`. So far I have: {}.",
                    render_partial(&self.partial_object)
                ));
                self.register_step_choices(&schema, self.cursor);
                return None;
            }
        };

        for (key, value) in pairs {
            self.partial_object.insert(key, value);
        }

        // Only `object` schemas emit object steps, and they always compile a
        // full-schema validator. Without one there is nothing to check.
        let Some(validator) = schema.object_validator.as_ref() else {
            let complete = std::mem::take(&mut self.partial_object);
            self.update_answers(Value::Object(complete));
            return self.advance(&schema);
        };
        let candidate = Value::Object(self.partial_object.clone());
        let result = schema::validate_all(&candidate, validator);

        if !result.ok {
            let detail = result.message.unwrap_or_default();
            self.say(format!(
                "Still missing or invalid:\n{detail}\nSo far I have: {}.",
                render_partial(&self.partial_object)
            ));
            self.register_step_choices(&schema, self.cursor);
            return None;
        }

        let complete = std::mem::take(&mut self.partial_object);
        self.update_answers(Value::Object(complete));
        self.advance(&schema)
    }

    /// Ask step `index`: send its question and register its choices.
    fn ask_step(&mut self, schema: &ConversationSchema, index: usize) {
        let step = &schema.steps[index];
        self.last_question = Some(step.question.clone());

        let actions: Vec<MessageAction> = if step.answer.kind == AnswerKind::Choice {
            step.answer
                .options
                .iter()
                .map(|o| MessageAction {
                    name: o.pattern.clone(),
                    kind: ActionKind::Button,
                    value: o.recorded_value().to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let question = step.question.clone();
        if actions.is_empty() {
            self.say(question);
        } else {
            self.say_with_actions(question, actions);
        }

        self.register_step_choices(schema, index);
    }

    /// Register the transient choices for step `index` without re-asking.
    fn register_step_choices(&mut self, schema: &ConversationSchema, index: usize) {
        let step = schema.steps[index].clone();

        // Skip is offered for non-required steps outside object mode, and is
        // registered first so it wins over a catch-all text choice.
        if !step.required && step.answer.kind != AnswerKind::Object {
            let pattern = self.skip_pattern.clone();
            self.push_choice(pattern, ChoiceAction::Skip);
        }

        match step.answer.kind {
            AnswerKind::Choice => {
                for option in &step.answer.options {
                    match RegexBuilder::new(&format!(r"\b{}\b", option.pattern))
                        .case_insensitive(true)
                        .build()
                    {
                        Ok(compiled) => self.push_choice(
                            compiled,
                            ChoiceAction::SelectOption {
                                value: option.recorded_value(),
                            },
                        ),
                        Err(e) => {
                            warn!(id = %self.id, pattern = option.pattern.as_str(), error = %e,
                                "unusable option pattern skipped");
                        }
                    }
                }
            }
            AnswerKind::Text => {
                self.push_choice(Regex::new(r"\S").unwrap(), ChoiceAction::CaptureText);
            }
            AnswerKind::Object => {
                self.push_choice(Regex::new(r"\S").unwrap(), ChoiceAction::CaptureObject);
            }
        }
    }

    /// Move past the current step; ask the next one or finish.
    fn advance(&mut self, schema: &ConversationSchema) -> Option<Lifecycle> {
        self.cursor += 1;
        if self.cursor < schema.steps.len() {
            self.ask_step(schema, self.cursor);
            None
        } else {
            self.complete(schema)
        }
    }

    /// All steps answered. NLU dialogs confirm interactively; everything
    /// else ends immediately.
    fn complete(&mut self, schema: &ConversationSchema) -> Option<Lifecycle> {
        if schema.kind == SchemaKind::Nlu {
            self.begin_confirmation();
            None
        } else {
            self.say(format!("All done -- `{}` complete.", self.name));
            Some(Lifecycle::End(self.answers.clone()))
        }
    }

    fn begin_confirmation(&mut self) {
        self.confirming = true;
        let summary = self.render_summary();
        let actions = vec![
            MessageAction {
                name: "yes".into(),
                kind: ActionKind::Button,
                value: "yes".into(),
            },
            MessageAction {
                name: "no".into(),
                kind: ActionKind::Button,
                value: "no".into(),
            },
        ];
        self.say_with_actions(
            format!("{summary}\nIs this correct? (yes/no)"),
            actions,
        );
        self.last_question = Some("Is this correct? (yes/no)".into());

        let yes = RegexBuilder::new(r"\byes\b")
            .case_insensitive(true)
            .build()
            .unwrap();
        let no = RegexBuilder::new(r"\bno\b")
            .case_insensitive(true)
            .build()
            .unwrap();
        self.push_choice(yes, ChoiceAction::ConfirmYes);
        self.push_choice(no, ChoiceAction::ConfirmNo);
    }

    /// Render collected answers in insertion order.
    fn render_summary(&self) -> String {
        let mut lines = vec![format!("Here's what I have for `{}`:", self.name)];
        for fragment in &self.answers.0 {
            match fragment {
                AnswerFragment::Keyed(key, value) => {
                    lines.push(format!("  {key}: {}", render_value(value)));
                }
                AnswerFragment::Bare(value) => lines.push(format!("  {}", render_value(value))),
            }
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("integration", &self.integration)
            .field("identity", &self.identity)
            .field("status", &self.status)
            .field("cursor", &self.cursor)
            .field("choices", &self.choices.len())
            .finish_non_exhaustive()
    }
}

/// Parse free text into a scalar: numbers and booleans become typed values,
/// everything else stays a string.
fn parse_scalar(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
        _ => Value::String(text.to_string()),
    }
}

/// Parse `key: value, key: value` input. Returns the offending fragment on
/// malformed syntax.
fn parse_key_values(text: &str) -> Result<Vec<(String, Value)>, String> {
    let mut pairs = Vec::new();
    for fragment in text.split(',') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        let Some((key, value)) = fragment.split_once(':') else {
            return Err(fragment.to_string());
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(fragment.to_string());
        }
        pairs.push((key.to_string(), parse_scalar(value.trim())));
    }
    if pairs.is_empty() {
        return Err(text.trim().to_string());
    }
    Ok(pairs)
}

fn render_partial(partial: &serde_json::Map<String, Value>) -> String {
    if partial.is_empty() {
        return "nothing yet".to_string();
    }
    partial
        .iter()
        .map(|(k, v)| format!("{k}: {}", render_value(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AnswerSpec, ChoiceOption, SchemaSpec, StepSpec};
    use serde_json::json;

    fn trigger() -> InboundMessage {
        InboundMessage {
            id: "m0".into(),
            channel: "mock".into(),
            user_id: "u1".into(),
            room_id: "general".into(),
            text: "start".into(),
            nlu: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            text: text.into(),
            ..trigger()
        }
    }

    fn new_conversation(schema: Option<ConversationSchema>) -> Conversation {
        Conversation::new(
            ConversationId(1),
            "test",
            "ops",
            Identity("u1&general".into()),
            schema,
            &trigger(),
            Duration::from_secs(600),
            "skip",
        )
    }

    fn dynamic_schema(steps: Vec<StepSpec>) -> ConversationSchema {
        ConversationSchema::compile(
            SchemaSpec::Dynamic {
                name: "test".into(),
                steps,
            },
            &[],
        )
        .unwrap()
    }

    fn text_step(question: &str, required: bool) -> StepSpec {
        StepSpec {
            question: question.into(),
            required,
            answer: AnswerSpec {
                kind: AnswerKind::Text,
                options: Vec::new(),
                validation: None,
                entity_name: None,
                default: None,
            },
        }
    }

    fn choice_step(question: &str, options: &[&str]) -> StepSpec {
        StepSpec {
            question: question.into(),
            required: true,
            answer: AnswerSpec {
                kind: AnswerKind::Choice,
                options: options
                    .iter()
                    .map(|o| ChoiceOption {
                        pattern: o.to_string(),
                        value: None,
                    })
                    .collect(),
                validation: None,
                entity_name: None,
                default: None,
            },
        }
    }

    #[tokio::test]
    async fn linear_dialog_collects_answers_in_order() {
        let schema = dynamic_schema(vec![
            text_step("Your name?", true),
            choice_step("Confirm? yes/no", &["yes", "no"]),
        ]);
        let mut conv = new_conversation(Some(schema));

        assert!(conv.start().is_none());
        let out = conv.drain_outbox();
        assert_eq!(out[0].text, "Your name?");

        assert!(conv.receive_message(&message("Bob")).is_none());
        let out = conv.drain_outbox();
        assert_eq!(out[0].text, "Confirm? yes/no");
        assert!(!out[0].actions.is_empty(), "choice step renders actions");

        let outcome = conv.receive_message(&message("yes"));
        let Some(Lifecycle::End(answers)) = outcome else {
            panic!("expected End, got {outcome:?}");
        };
        assert_eq!(answers.values(), vec![&json!("Bob"), &json!("yes")]);
    }

    #[tokio::test]
    async fn skip_without_default_records_nothing() {
        let schema = dynamic_schema(vec![text_step("Nickname?", false), text_step("Name?", true)]);
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.drain_outbox();

        assert!(conv.receive_message(&message("skip")).is_none());
        assert!(conv.answers().is_empty());
        // Advanced to the second step.
        assert_eq!(conv.last_question(), Some("Name?"));
    }

    #[tokio::test]
    async fn skip_with_default_records_the_default() {
        let mut step = text_step("Which room?", false);
        step.answer.entity_name = Some("room".into());
        step.answer.default = Some(json!("R1"));
        let schema = dynamic_schema(vec![step, text_step("Name?", true)]);
        let mut conv = new_conversation(Some(schema));
        conv.start();

        conv.receive_message(&message("skip"));
        assert_eq!(
            conv.answers().0,
            vec![AnswerFragment::Keyed("room".into(), json!("R1"))]
        );
    }

    #[tokio::test]
    async fn text_validation_failure_reprompts_without_advancing() {
        let mut step = text_step("Your age?", true);
        step.answer.validation = Some(json!({"type": "number"}));
        let schema = dynamic_schema(vec![step]);
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.drain_outbox();

        assert!(conv.receive_message(&message("old")).is_none());
        let out = conv.drain_outbox();
        assert!(out[0].text.contains("try again"));
        assert_eq!(conv.last_question(), Some("Your age?"));

        let outcome = conv.receive_message(&message("30"));
        assert!(matches!(outcome, Some(Lifecycle::End(_))));
        assert_eq!(conv.answers().values(), vec![&json!(30)]);
    }

    #[tokio::test]
    async fn object_step_accumulates_across_turns() {
        let schema = ConversationSchema::compile(
            SchemaSpec::Object {
                name: "person".into(),
                schema: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "age": {"type": "number"}
                    },
                    "required": ["name", "age"]
                }),
            },
            &[],
        )
        .unwrap();
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.drain_outbox();

        // First turn: partial -- must not complete.
        assert!(conv.receive_message(&message("name: Alice")).is_none());
        let out = conv.drain_outbox();
        assert!(out[0].text.contains("age"));
        assert!(out[0].text.contains("name: Alice"));

        // Second turn completes.
        let outcome = conv.receive_message(&message("age: 30"));
        let Some(Lifecycle::End(answers)) = outcome else {
            panic!("expected End");
        };
        assert_eq!(answers.values(), vec![&json!({"name": "Alice", "age": 30})]);
    }

    #[tokio::test]
    async fn malformed_object_input_reprompts_with_partial() {
        let schema = ConversationSchema::compile(
            SchemaSpec::Object {
                name: "person".into(),
                schema: json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                }),
            },
            &[],
        )
        .unwrap();
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.drain_outbox();

        assert!(conv.receive_message(&message("just words")).is_none());
        let out = conv.drain_outbox();
        assert!(out[0].text.contains("key: value"));
        assert!(out[0].text.contains("nothing yet"));
    }

    #[tokio::test]
    async fn nlu_dialog_confirms_before_ending() {
        let schema = ConversationSchema::compile(
            SchemaSpec::Nlu {
                name: "book".into(),
                schema: json!({
                    "properties": {"room": {"description": "Which room?"}},
                    "required": ["room"]
                }),
            },
            &[],
        )
        .unwrap();
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.drain_outbox();

        assert!(conv.receive_message(&message("R42")).is_none());
        let out = conv.drain_outbox();
        assert!(out[0].text.contains("Is this correct?"));
        assert!(out[0].text.contains("room: R42"));

        let outcome = conv.receive_message(&message("yes"));
        let Some(Lifecycle::End(answers)) = outcome else {
            panic!("expected End");
        };
        assert_eq!(answers.merged().get("room"), Some(&json!("R42")));
    }

    #[tokio::test]
    async fn nlu_confirmation_declined_closes() {
        let schema = ConversationSchema::compile(
            SchemaSpec::Nlu {
                name: "book".into(),
                schema: json!({"properties": {"room": {}}}),
            },
            &[],
        )
        .unwrap();
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.receive_message(&message("R42"));
        conv.drain_outbox();

        let outcome = conv.receive_message(&message("no"));
        assert_eq!(outcome, Some(Lifecycle::Close));
        let out = conv.drain_outbox();
        assert!(out[0].text.contains("discarding"));
    }

    #[tokio::test]
    async fn fully_prefilled_nlu_goes_straight_to_confirmation() {
        let schema = ConversationSchema::compile(
            SchemaSpec::Nlu {
                name: "book".into(),
                schema: json!({"properties": {"room": {}}}),
            },
            &[parley_core::types::NluEntity {
                entity: "room".into(),
                value: json!("R7"),
            }],
        )
        .unwrap();
        let mut conv = new_conversation(Some(schema));

        assert!(conv.start().is_none());
        let out = conv.drain_outbox();
        assert!(out[0].text.contains("R7"));
        assert!(out[0].text.contains("Is this correct?"));
    }

    #[tokio::test]
    async fn no_match_resets_deadline_silently() {
        let schema = dynamic_schema(vec![choice_step("Pick one", &["alpha", "beta"])]);
        let mut conv = new_conversation(Some(schema));
        conv.start();
        conv.drain_outbox();
        let before = conv.deadline();

        tokio::time::pause();
        tokio::time::advance(std::time::Duration::from_secs(5)).await;

        assert!(conv.receive_message(&message("gamma")).is_none());
        assert!(conv.drain_outbox().is_empty(), "no reply on no match");
        assert!(conv.deadline() > before, "deadline was pushed out");
        // Choices survive: a later valid answer still works.
        assert!(matches!(
            conv.receive_message(&message("alpha")),
            Some(Lifecycle::End(_))
        ));
    }

    #[tokio::test]
    async fn first_matching_choice_wins() {
        let mut conv = new_conversation(None);
        conv.add_choice(
            "ye?s",
            Arc::new(|_caps, conv: &mut Conversation| {
                conv.update_answers(json!("first"));
                None
            }),
        )
        .unwrap();
        conv.add_choice(
            "yes",
            Arc::new(|_caps, conv: &mut Conversation| {
                conv.update_answers(json!("second"));
                None
            }),
        )
        .unwrap();

        conv.receive_message(&message("yes"));
        assert_eq!(conv.answers().values(), vec![&json!("first")]);
    }

    #[tokio::test]
    async fn custom_choices_drive_schema_less_conversations() {
        let mut conv = new_conversation(None);
        assert!(conv.start().is_none());

        conv.add_choice(
            r"done",
            Arc::new(|_caps, conv: &mut Conversation| {
                conv.say("finishing up");
                Some(Lifecycle::End(conv.answers().clone()))
            }),
        )
        .unwrap();

        let outcome = conv.receive_message(&message("done"));
        assert!(matches!(outcome, Some(Lifecycle::End(_))));
        assert_eq!(conv.drain_outbox()[0].text, "finishing up");
    }

    #[tokio::test]
    async fn match_clears_transient_choices() {
        let mut conv = new_conversation(None);
        conv.add_choice(
            "ping",
            Arc::new(|_caps, conv: &mut Conversation| {
                conv.say("pong");
                None
            }),
        )
        .unwrap();

        conv.receive_message(&message("ping"));
        conv.drain_outbox();

        // Choice was one-shot; the same text now matches nothing.
        conv.receive_message(&message("ping"));
        assert!(conv.drain_outbox().is_empty());
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::Active.to_string(), "active");
        assert_eq!(Status::Paused.to_string(), "paused");
    }

    #[test]
    fn parse_key_values_handles_spacing_and_types() {
        let pairs = parse_key_values("name: Alice , age: 30").unwrap();
        assert_eq!(pairs[0], ("name".to_string(), json!("Alice")));
        assert_eq!(pairs[1], ("age".to_string(), json!(30)));
    }

    #[test]
    fn parse_key_values_rejects_missing_colon() {
        assert!(parse_key_values("no colon here").is_err());
        assert!(parse_key_values("").is_err());
    }
}
