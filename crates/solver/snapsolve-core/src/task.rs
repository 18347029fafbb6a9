//! Task requests sent through the orchestrator and the results they produce.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorKind;
use crate::prompts;
use crate::schema::{SchemaCatalog, SchemaContext, SchemaDescriptor};

/// Kind of work requested from the model. Each kind has its own schema and
/// structured result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Ocr,
    Solve,
    TurboSolve,
    TitleGen,
}

impl TaskType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Solve => "solve",
            Self::TurboSolve => "turbo_solve",
            Self::TitleGen => "title_gen",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image bytes attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl InlineImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/png")
    }
}

impl fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A request for one orchestrator call.
///
/// Constructors always attach the task's schema, so a request that expects
/// structured output can never be built without one.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    task_type: TaskType,
    text_prompt: String,
    inline_image: Option<InlineImage>,
    response_schema: SchemaDescriptor,
}

impl TaskRequest {
    fn build(
        task_type: TaskType,
        text_prompt: String,
        inline_image: Option<InlineImage>,
        context: &SchemaContext,
    ) -> Self {
        Self {
            task_type,
            text_prompt,
            inline_image,
            response_schema: SchemaCatalog::schema(task_type, context),
        }
    }

    /// Extract the question text from a screenshot.
    pub fn ocr(image: InlineImage) -> Self {
        Self::build(
            TaskType::Ocr,
            prompts::ocr_prompt(),
            Some(image),
            &SchemaContext::default(),
        )
    }

    /// Solve an already-extracted question.
    pub fn solve(question: &str, context: &SchemaContext) -> Self {
        Self::build(
            TaskType::Solve,
            prompts::solve_prompt(question, context),
            None,
            context,
        )
    }

    /// Read and solve the question straight from the screenshot.
    pub fn turbo_solve(image: InlineImage, context: &SchemaContext) -> Self {
        Self::build(
            TaskType::TurboSolve,
            prompts::turbo_prompt(context),
            Some(image),
            context,
        )
    }

    /// Produce a short history title for a question.
    pub fn title(question: &str) -> Self {
        Self::build(
            TaskType::TitleGen,
            prompts::title_prompt(question),
            None,
            &SchemaContext::default(),
        )
    }

    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn text_prompt(&self) -> &str {
        &self.text_prompt
    }

    pub const fn inline_image(&self) -> Option<&InlineImage> {
        self.inline_image.as_ref()
    }

    pub const fn response_schema(&self) -> &SchemaDescriptor {
        &self.response_schema
    }
}

/// Result classification of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "kind")]
pub enum TaskOutcome {
    Success,
    /// The model explicitly reported that there was nothing to read.
    Empty,
    Error(ErrorKind),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrFields {
    pub text: String,
    pub has_text: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveFields {
    pub lecture: String,
    pub title: String,
    pub explanation: String,
    pub solved: bool,
    pub answers: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurboSolveFields {
    pub lecture: String,
    pub title: String,
    pub solved: bool,
    pub answers: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleFields {
    pub title: String,
}

/// Task-specific structured payload, already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "task")]
pub enum StructuredFields {
    Ocr(OcrFields),
    Solve(SolveFields),
    TurboSolve(TurboSolveFields),
    Title(TitleFields),
    None,
}

/// Borrowed view over the answer-bearing fields shared by Solve and TurboSolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerView<'a> {
    pub answers: &'a str,
    pub lecture: &'a str,
    pub title: &'a str,
    pub explanation: Option<&'a str>,
    pub solved: bool,
}

impl AnswerView<'_> {
    /// Unsolved flag set, or no usable answer.
    pub const fn is_ambiguous(&self) -> bool {
        !self.solved || self.answers.is_empty()
    }
}

impl StructuredFields {
    pub fn answer_view(&self) -> Option<AnswerView<'_>> {
        match self {
            Self::Solve(f) => Some(AnswerView {
                answers: f.answers.as_str(),
                lecture: f.lecture.as_str(),
                title: f.title.as_str(),
                explanation: Some(f.explanation.as_str()),
                solved: f.solved,
            }),
            Self::TurboSolve(f) => Some(AnswerView {
                answers: f.answers.as_str(),
                lecture: f.lecture.as_str(),
                title: f.title.as_str(),
                explanation: None,
                solved: f.solved,
            }),
            _ => None,
        }
    }
}

/// What one orchestrator call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task_type: TaskType,
    pub raw_text: String,
    pub fields: StructuredFields,
    pub outcome: TaskOutcome,
    pub model_id: String,
    /// Display name of the credential that produced the result.
    pub credential: Option<String>,
}

impl TaskResult {
    pub fn is_empty(&self) -> bool {
        self.outcome == TaskOutcome::Empty
    }

    /// Solve-type result whose answer is missing or flagged unsolved.
    pub fn is_unsolved(&self) -> bool {
        self.fields
            .answer_view()
            .is_some_and(|view| view.is_ambiguous())
    }

    pub fn ocr_text(&self) -> Option<&str> {
        match &self.fields {
            StructuredFields::Ocr(f) if f.has_text => Some(f.text.as_str()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        let title = match &self.fields {
            StructuredFields::Title(f) => Some(f.title.as_str()),
            other => other.answer_view().map(|v| v.title),
        };
        title.filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_always_attach_matching_schema() {
        let ctx = SchemaContext::default();
        let image = InlineImage::png(vec![1]);
        for req in [
            TaskRequest::ocr(image.clone()),
            TaskRequest::solve("1+1", &ctx),
            TaskRequest::turbo_solve(image, &ctx),
            TaskRequest::title("1+1"),
        ] {
            assert_eq!(req.response_schema().task_type(), req.task_type());
        }
    }

    #[test]
    fn only_image_tasks_carry_images() {
        let ctx = SchemaContext::default();
        assert!(TaskRequest::ocr(InlineImage::png(vec![1])).inline_image().is_some());
        assert!(TaskRequest::solve("q", &ctx).inline_image().is_none());
        assert!(TaskRequest::title("q").inline_image().is_none());
    }

    #[test]
    fn inline_image_debug_hides_bytes() {
        let dbg = format!("{:?}", InlineImage::png(vec![0; 2048]));
        assert!(dbg.contains("len: 2048"));
    }

    #[test]
    fn ambiguity_rules() {
        let mut fields = SolveFields {
            solved: true,
            answers: "B".into(),
            ..Default::default()
        };
        assert!(!StructuredFields::Solve(fields.clone()).answer_view().unwrap().is_ambiguous());

        fields.answers.clear();
        assert!(StructuredFields::Solve(fields.clone()).answer_view().unwrap().is_ambiguous());

        fields.answers = "B".into();
        fields.solved = false;
        assert!(StructuredFields::Solve(fields).answer_view().unwrap().is_ambiguous());

        assert!(StructuredFields::None.answer_view().is_none());
    }
}
