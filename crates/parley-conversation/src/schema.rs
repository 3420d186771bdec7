// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative conversation schemas and their compilation.
//!
//! A [`SchemaSpec`] is the declarative input an integration hands to the
//! conversation manager. Compilation turns it into an ordered list of
//! [`Step`]s:
//!
//! - `dynamic` / `custom`: the step list is taken as declared
//! - `object`: one synthetic step collecting `key: value` input validated
//!   against a full JSON schema
//! - `nlu`: one step per schema property, minus any slots already extracted
//!   by the NLU parse (those answers are pre-recorded)
//!
//! Compilation failures are fatal and raised before any conversation exists.

use std::sync::Arc;

use jsonschema::Validator;
use parley_core::types::NluEntity;
use serde::Deserialize;
use strum::Display;
use thiserror::Error;

/// Errors raised while compiling a schema spec.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The step list is missing or empty.
    #[error("schema `{name}` has no steps")]
    EmptySteps { name: String },

    /// The JSON schema has no usable properties.
    #[error("schema `{name}` declares no properties")]
    NoProperties { name: String },

    /// The embedded JSON schema failed to compile.
    #[error("schema `{name}` is not a valid JSON schema: {detail}")]
    InvalidJsonSchema { name: String, detail: String },

    /// A step's validation spec failed to compile.
    #[error("step {index} of schema `{name}` has an invalid validation spec: {detail}")]
    InvalidStepValidation {
        name: String,
        index: usize,
        detail: String,
    },

    /// A declared step asks for an object answer; only `object` schemas
    /// carry the full-schema validator that answer needs.
    #[error("step {index} of schema `{name}` asks for an object answer; use an `object` schema instead")]
    ObjectStep { name: String, index: usize },
}

impl From<SchemaError> for parley_core::ParleyError {
    fn from(err: SchemaError) -> Self {
        parley_core::ParleyError::Schema(err.to_string())
    }
}

/// Declarative schema input, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum SchemaSpec {
    /// Scripted step list driven by the engine.
    Dynamic {
        name: String,
        #[serde(default)]
        steps: Vec<StepSpec>,
    },
    /// Step list driven by integration code via manual choices.
    Custom {
        name: String,
        #[serde(default)]
        steps: Vec<StepSpec>,
    },
    /// Single free-form `key: value` step validated against a JSON schema.
    Object {
        name: String,
        schema: serde_json::Value,
    },
    /// One slot-filling step per JSON-schema property, with an interactive
    /// confirmation at the end.
    Nlu {
        name: String,
        schema: serde_json::Value,
    },
}

impl SchemaSpec {
    /// The schema's display name.
    pub fn name(&self) -> &str {
        match self {
            SchemaSpec::Dynamic { name, .. }
            | SchemaSpec::Custom { name, .. }
            | SchemaSpec::Object { name, .. }
            | SchemaSpec::Nlu { name, .. } => name,
        }
    }
}

/// One declared step.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    /// Question text sent to the user.
    pub question: String,
    /// Whether the step may be skipped.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Expected answer shape.
    pub answer: AnswerSpec,
}

fn default_required() -> bool {
    true
}

/// Expected answer for one step.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerSpec {
    /// Answer kind.
    #[serde(rename = "type")]
    pub kind: AnswerKind,
    /// Options for `choice` steps.
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    /// JSON-schema validation spec for `text` steps.
    #[serde(default)]
    pub validation: Option<serde_json::Value>,
    /// Name the answer is recorded under (NLU slot binding).
    #[serde(default)]
    pub entity_name: Option<String>,
    /// Default recorded when a non-required step is skipped.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Kind of answer a step expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnswerKind {
    Text,
    Choice,
    Object,
}

/// One selectable option of a `choice` step.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceOption {
    /// Pattern the user's reply must match (a regex fragment).
    #[serde(rename = "match")]
    pub pattern: String,
    /// Value recorded on match; defaults to the pattern text.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl ChoiceOption {
    /// The value recorded when this option matches.
    pub fn recorded_value(&self) -> serde_json::Value {
        self.value
            .clone()
            .unwrap_or_else(|| serde_json::Value::String(self.pattern.clone()))
    }
}

/// Compiled schema kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SchemaKind {
    Dynamic,
    Custom,
    Object,
    Nlu,
}

/// One compiled step, ready for the conversation engine.
#[derive(Debug, Clone)]
pub struct Step {
    /// Question text.
    pub question: String,
    /// Whether the step may be skipped.
    pub required: bool,
    /// Answer shape.
    pub answer: AnswerSpec,
    /// Compiled per-step validator, for `text` steps with a validation spec.
    pub validator: Option<Arc<Validator>>,
}

/// A compiled, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct ConversationSchema {
    /// Display name.
    pub name: String,
    /// Compiled kind.
    pub kind: SchemaKind,
    /// Ordered steps. May be empty only for `nlu` schemas whose slots were
    /// all pre-extracted.
    pub steps: Vec<Step>,
    /// Answers pre-recorded by the NLU slot-filling short-circuit.
    pub prefilled: Vec<(String, serde_json::Value)>,
    /// Full-schema validator for `object` steps.
    pub object_validator: Option<Arc<Validator>>,
}

impl ConversationSchema {
    /// Compile a declarative spec.
    ///
    /// `extracted` carries slot values the NLU parse already produced for the
    /// triggering message; matching `nlu` steps are removed up front and
    /// their answers pre-recorded.
    pub fn compile(spec: SchemaSpec, extracted: &[NluEntity]) -> Result<Self, SchemaError> {
        match spec {
            SchemaSpec::Dynamic { name, steps } => {
                Self::compile_steps(name, SchemaKind::Dynamic, steps)
            }
            SchemaSpec::Custom { name, steps } => {
                Self::compile_steps(name, SchemaKind::Custom, steps)
            }
            SchemaSpec::Object { name, schema } => Self::compile_object(name, schema),
            SchemaSpec::Nlu { name, schema } => Self::compile_nlu(name, schema, extracted),
        }
    }

    fn compile_steps(
        name: String,
        kind: SchemaKind,
        specs: Vec<StepSpec>,
    ) -> Result<Self, SchemaError> {
        if specs.is_empty() {
            return Err(SchemaError::EmptySteps { name });
        }

        let mut steps = Vec::with_capacity(specs.len());
        for (index, spec) in specs.into_iter().enumerate() {
            if spec.answer.kind == AnswerKind::Object {
                return Err(SchemaError::ObjectStep { name, index });
            }

            let validator = spec
                .answer
                .validation
                .as_ref()
                .map(|v| {
                    jsonschema::validator_for(v).map_err(|e| {
                        SchemaError::InvalidStepValidation {
                            name: name.clone(),
                            index,
                            detail: e.to_string(),
                        }
                    })
                })
                .transpose()?
                .map(Arc::new);

            steps.push(Step {
                question: spec.question,
                required: spec.required,
                answer: spec.answer,
                validator,
            });
        }

        Ok(Self {
            name,
            kind,
            steps,
            prefilled: Vec::new(),
            object_validator: None,
        })
    }

    fn compile_object(name: String, raw: serde_json::Value) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(&raw).map_err(|e| SchemaError::InvalidJsonSchema {
                name: name.clone(),
                detail: e.to_string(),
            })?;

        let (required, optional) = property_names(&raw);
        if required.is_empty() && optional.is_empty() {
            return Err(SchemaError::NoProperties { name });
        }

        let mut question = String::from("Please provide values as `key: value` pairs.");
        if !required.is_empty() {
            question.push_str(&format!(" Required: {}.", required.join(", ")));
        }
        if !optional.is_empty() {
            question.push_str(&format!(" Optional: {}.", optional.join(", ")));
        }

        let step = Step {
            question,
            required: true,
            answer: AnswerSpec {
                kind: AnswerKind::Object,
                options: Vec::new(),
                validation: None,
                entity_name: None,
                default: None,
            },
            validator: None,
        };

        Ok(Self {
            name,
            kind: SchemaKind::Object,
            steps: vec![step],
            prefilled: Vec::new(),
            object_validator: Some(Arc::new(validator)),
        })
    }

    fn compile_nlu(
        name: String,
        raw: serde_json::Value,
        extracted: &[NluEntity],
    ) -> Result<Self, SchemaError> {
        let properties = raw
            .get("properties")
            .and_then(|p| p.as_object())
            .ok_or_else(|| SchemaError::NoProperties { name: name.clone() })?;
        if properties.is_empty() {
            return Err(SchemaError::NoProperties { name });
        }

        let required: Vec<&str> = raw
            .get("required")
            .and_then(|r| r.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut steps = Vec::new();
        let mut prefilled = Vec::new();

        for (key, prop) in properties {
            // Slot-filling short-circuit: a slot the NLU parse already
            // extracted never becomes a step.
            if let Some(found) = extracted.iter().find(|e| &e.entity == key) {
                prefilled.push((key.clone(), found.value.clone()));
                continue;
            }

            let question = prop
                .get("description")
                .and_then(|d| d.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Please provide `{key}`."));

            steps.push(Step {
                question,
                required: required.contains(&key.as_str()),
                answer: AnswerSpec {
                    kind: AnswerKind::Text,
                    options: Vec::new(),
                    validation: None,
                    entity_name: Some(key.clone()),
                    default: prop.get("default").cloned(),
                },
                validator: None,
            });
        }

        Ok(Self {
            name,
            kind: SchemaKind::Nlu,
            steps,
            prefilled,
            object_validator: None,
        })
    }
}

/// Outcome of validating one value against a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepValidation {
    /// Whether the value passed.
    pub ok: bool,
    /// Failure description; `None` on success.
    pub message: Option<String>,
}

impl StepValidation {
    fn pass() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            ok: false,
            message: Some(message),
        }
    }
}

/// Validate a value against a compiled spec, surfacing the first error only.
pub fn validate(value: &serde_json::Value, validator: &Validator) -> StepValidation {
    match validator.validate(value) {
        Ok(()) => StepValidation::pass(),
        Err(err) => StepValidation::fail(err.to_string()),
    }
}

/// Validate a value against a compiled spec, surfacing a newline-joined
/// aggregate of every error.
pub fn validate_all(value: &serde_json::Value, validator: &Validator) -> StepValidation {
    let messages: Vec<String> = validator
        .iter_errors(value)
        .map(|e| e.to_string())
        .collect();
    if messages.is_empty() {
        StepValidation::pass()
    } else {
        StepValidation::fail(messages.join("\n"))
    }
}

/// Split a JSON schema's property names into (required, optional) lists.
fn property_names(schema: &serde_json::Value) -> (Vec<String>, Vec<String>) {
    let required: Vec<String> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let optional: Vec<String> = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| {
            props
                .keys()
                .filter(|k| !required.contains(k))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    (required, optional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_step(question: &str) -> StepSpec {
        StepSpec {
            question: question.to_string(),
            required: true,
            answer: AnswerSpec {
                kind: AnswerKind::Text,
                options: Vec::new(),
                validation: None,
                entity_name: None,
                default: None,
            },
        }
    }

    #[test]
    fn dynamic_schema_keeps_declared_steps() {
        let spec = SchemaSpec::Dynamic {
            name: "onboard".into(),
            steps: vec![text_step("Your name?"), text_step("Your team?")],
        };
        let schema = ConversationSchema::compile(spec, &[]).unwrap();
        assert_eq!(schema.kind, SchemaKind::Dynamic);
        assert_eq!(schema.steps.len(), 2);
        assert_eq!(schema.steps[0].question, "Your name?");
    }

    #[test]
    fn empty_steps_are_rejected() {
        let spec = SchemaSpec::Dynamic {
            name: "empty".into(),
            steps: vec![],
        };
        let err = ConversationSchema::compile(spec, &[]).unwrap_err();
        assert!(matches!(err, SchemaError::EmptySteps { .. }));
    }

    #[test]
    fn unknown_kind_fails_deserialization() {
        let raw = json!({"type": "wizard", "name": "x", "steps": []});
        assert!(serde_json::from_value::<SchemaSpec>(raw).is_err());
    }

    #[test]
    fn object_answer_inside_a_step_list_is_rejected() {
        let spec = SchemaSpec::Dynamic {
            name: "freeform".into(),
            steps: vec![StepSpec {
                question: "Describe it as key: value pairs.".into(),
                required: true,
                answer: AnswerSpec {
                    kind: AnswerKind::Object,
                    options: Vec::new(),
                    validation: None,
                    entity_name: None,
                    default: None,
                },
            }],
        };
        let err = ConversationSchema::compile(spec, &[]).unwrap_err();
        assert!(matches!(err, SchemaError::ObjectStep { index: 0, .. }));
    }

    #[test]
    fn object_schema_produces_one_synthetic_step() {
        let spec = SchemaSpec::Object {
            name: "person".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "number"},
                    "nickname": {"type": "string"}
                },
                "required": ["name", "age"]
            }),
        };
        let schema = ConversationSchema::compile(spec, &[]).unwrap();
        assert_eq!(schema.kind, SchemaKind::Object);
        assert_eq!(schema.steps.len(), 1);
        let q = &schema.steps[0].question;
        assert!(q.contains("name, age"), "required first, got: {q}");
        assert!(q.contains("nickname"));
        assert!(schema.object_validator.is_some());
        assert_eq!(schema.steps[0].answer.kind, AnswerKind::Object);
    }

    #[test]
    fn object_schema_without_properties_is_rejected() {
        let spec = SchemaSpec::Object {
            name: "nothing".into(),
            schema: json!({"type": "object"}),
        };
        let err = ConversationSchema::compile(spec, &[]).unwrap_err();
        assert!(matches!(err, SchemaError::NoProperties { .. }));
    }

    #[test]
    fn nlu_schema_emits_one_step_per_property() {
        let spec = SchemaSpec::Nlu {
            name: "book-room".into(),
            schema: json!({
                "properties": {
                    "date": {"description": "Which day?"},
                    "room": {"description": "Which room?"}
                },
                "required": ["room"]
            }),
        };
        let schema = ConversationSchema::compile(spec, &[]).unwrap();
        assert_eq!(schema.steps.len(), 2);
        let room = schema
            .steps
            .iter()
            .find(|s| s.answer.entity_name.as_deref() == Some("room"))
            .unwrap();
        assert!(room.required);
        assert_eq!(room.question, "Which room?");
        let date = schema
            .steps
            .iter()
            .find(|s| s.answer.entity_name.as_deref() == Some("date"))
            .unwrap();
        assert!(!date.required);
    }

    #[test]
    fn nlu_prefilled_slots_are_removed_and_recorded() {
        let spec = SchemaSpec::Nlu {
            name: "book-room".into(),
            schema: json!({
                "properties": {
                    "date": {},
                    "room": {}
                }
            }),
        };
        let extracted = vec![NluEntity {
            entity: "room".into(),
            value: json!("R42"),
        }];
        let schema = ConversationSchema::compile(spec, &extracted).unwrap();
        assert_eq!(schema.steps.len(), 1);
        assert_eq!(schema.steps[0].answer.entity_name.as_deref(), Some("date"));
        assert_eq!(schema.prefilled, vec![("room".to_string(), json!("R42"))]);
    }

    #[test]
    fn validate_surfaces_first_error_only() {
        let validator = jsonschema::validator_for(&json!({"type": "number"})).unwrap();
        let result = validate(&json!("not a number"), &validator);
        assert!(!result.ok);
        assert!(result.message.is_some());
    }

    #[test]
    fn validate_all_aggregates_errors() {
        let validator = jsonschema::validator_for(&json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "number"}
            },
            "required": ["name", "age"]
        }))
        .unwrap();

        let result = validate_all(&json!({"age": "old"}), &validator);
        assert!(!result.ok);
        let msg = result.message.unwrap();
        // Missing `name` and mistyped `age` both appear.
        assert!(msg.contains("name"));
        assert!(msg.contains("age") || msg.contains("old"));
    }

    #[test]
    fn bad_step_validation_spec_is_rejected() {
        let spec = SchemaSpec::Dynamic {
            name: "bad".into(),
            steps: vec![StepSpec {
                question: "q".into(),
                required: true,
                answer: AnswerSpec {
                    kind: AnswerKind::Text,
                    options: Vec::new(),
                    validation: Some(json!({"type": "no-such-type"})),
                    entity_name: None,
                    default: None,
                },
            }],
        };
        let err = ConversationSchema::compile(spec, &[]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidStepValidation { .. }));
    }
}
