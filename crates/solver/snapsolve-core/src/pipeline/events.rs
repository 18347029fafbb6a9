//! Messages into the controller and lifecycle events out of it.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorKind, OrchestratorError};
use crate::task::TaskResult;

/// Why a session went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Cancelled,
    AutoClose,
    SurfaceClosed,
    /// A new capture replaced a finished session.
    Replaced,
}

/// Ordered lifecycle stream for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    SessionStarted {
        session_id: Uuid,
        turbo: bool,
    },
    AnalysisStarted {
        session_id: Uuid,
    },
    /// `text` is the extracted question, or a readable error message when
    /// `error` is set.
    AnalysisCompleted {
        session_id: Uuid,
        text: String,
        error: Option<ErrorKind>,
    },
    SolveStarted {
        session_id: Uuid,
        attempt: u8,
    },
    SolveCompleted {
        session_id: Uuid,
        answer: String,
        lecture: String,
        explanation: String,
        solved: bool,
        error: Option<ErrorKind>,
    },
    QuestionNotFound {
        session_id: Uuid,
        message: String,
    },
    QuestionEdited {
        session_id: Uuid,
        text: String,
    },
    SessionClosed {
        session_id: Uuid,
        reason: CloseReason,
    },
}

impl PipelineEvent {
    pub const fn session_id(&self) -> Uuid {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::AnalysisStarted { session_id }
            | Self::AnalysisCompleted { session_id, .. }
            | Self::SolveStarted { session_id, .. }
            | Self::SolveCompleted { session_id, .. }
            | Self::QuestionNotFound { session_id, .. }
            | Self::QuestionEdited { session_id, .. }
            | Self::SessionClosed { session_id, .. } => *session_id,
        }
    }
}

pub type TaskOutput = Result<TaskResult, OrchestratorError>;

/// Results posted back by background work. Only the owner loop applies them,
/// via [`PipelineController::handle`](super::PipelineController::handle).
#[derive(Debug)]
pub enum PipelineMessage {
    AnalysisFinished {
        session_id: Uuid,
        result: TaskOutput,
    },
    SolveFinished {
        session_id: Uuid,
        attempt: u8,
        result: TaskOutput,
    },
    TitleFinished {
        session_id: Uuid,
        title: Option<String>,
    },
    AutoClose {
        session_id: Uuid,
    },
}

impl PipelineMessage {
    pub const fn session_id(&self) -> Uuid {
        match self {
            Self::AnalysisFinished { session_id, .. }
            | Self::SolveFinished { session_id, .. }
            | Self::TitleFinished { session_id, .. }
            | Self::AutoClose { session_id } => *session_id,
        }
    }
}
