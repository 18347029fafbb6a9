//! Structured-output schemas, one per task type.
//!
//! [`SchemaCatalog::schema`] is the single dispatch point; it is pure and
//! always returns a complete descriptor.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::task::TaskType;

/// Dynamic inputs that shape a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaContext {
    /// Subject tags seen on earlier questions. Advisory only.
    pub known_tags: BTreeSet<String>,
}

impl SchemaContext {
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known_tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { known_tags }
    }

    /// Comma-separated tag list, or `None` when no tags are known.
    pub fn tag_hint(&self) -> Option<String> {
        if self.known_tags.is_empty() {
            return None;
        }
        Some(
            self.known_tags
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaKind {
    Object,
    String,
    Boolean,
}

/// One node of the OpenAPI-subset schema dialect accepted by `responseSchema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: SchemaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_ordering: Vec<String>,
}

impl SchemaNode {
    fn leaf(kind: SchemaKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: Some(description.into()),
            properties: BTreeMap::new(),
            required: Vec::new(),
            property_ordering: Vec::new(),
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::leaf(SchemaKind::String, description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::leaf(SchemaKind::Boolean, description)
    }

    /// Object whose properties are all required, emitted in the given order.
    pub fn object(properties: Vec<(&str, Self)>) -> Self {
        let property_ordering: Vec<String> =
            properties.iter().map(|(name, _)| (*name).to_string()).collect();
        Self {
            kind: SchemaKind::Object,
            description: None,
            properties: properties
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            required: property_ordering.clone(),
            property_ordering,
        }
    }
}

/// Schema for one task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    task_type: TaskType,
    root: SchemaNode,
}

impl SchemaDescriptor {
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub const fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Wire form for `generationConfig.responseSchema`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.root).unwrap_or(serde_json::Value::Null)
    }
}

pub struct SchemaCatalog;

impl SchemaCatalog {
    pub fn schema(task_type: TaskType, context: &SchemaContext) -> SchemaDescriptor {
        let root = match task_type {
            TaskType::Ocr => ocr_schema(),
            TaskType::Solve => solve_schema(context, true),
            TaskType::TurboSolve => solve_schema(context, false),
            TaskType::TitleGen => title_schema(),
        };
        SchemaDescriptor { task_type, root }
    }
}

fn ocr_schema() -> SchemaNode {
    SchemaNode::object(vec![
        (
            "text",
            SchemaNode::string(
                "The full question text exactly as shown, including every answer option. Empty if there is no question.",
            ),
        ),
        (
            "hasText",
            SchemaNode::boolean("False when the image contains no readable question."),
        ),
    ])
}

fn lecture_description(context: &SchemaContext) -> String {
    let base = "Short subject label for the question, such as Math, Physics or History.";
    match context.tag_hint() {
        Some(hint) => format!("{base} Prefer one of these existing labels when it fits: {hint}."),
        None => base.to_string(),
    }
}

fn solve_schema(context: &SchemaContext, with_explanation: bool) -> SchemaNode {
    let mut properties = vec![
        ("lecture", SchemaNode::string(lecture_description(context))),
        (
            "title",
            SchemaNode::string("A short title (at most six words) summarizing the question."),
        ),
    ];
    if with_explanation {
        properties.push((
            "explanation",
            SchemaNode::string("Step-by-step solution in Markdown."),
        ));
    }
    properties.push((
        "solved",
        SchemaNode::boolean("True only if a definite answer was found."),
    ));
    properties.push((
        "answers",
        SchemaNode::string(
            "The letter(s) of the correct option(s), comma separated (e.g. \"B\" or \"A, C\"). For open questions, the final answer. Empty if unsolved.",
        ),
    ));
    SchemaNode::object(properties)
}

fn title_schema() -> SchemaNode {
    SchemaNode::object(vec![(
        "title",
        SchemaNode::string("A short title (at most six words) summarizing the question."),
    )])
}
