//! Session state and the forward-only transition graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::task::InlineImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Analyzing,
    Analyzed,
    Solving,
    Solved,
    /// Terminal: OCR found no question. The session auto-closes.
    NotFound,
}

impl PipelineState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Solving => "solving",
            Self::Solved => "solved",
            Self::NotFound => "not_found",
        }
    }

    /// Edges of the session graph. There is no way back except destroying
    /// the session.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Analyzing | Self::Solving)
                | (Self::Analyzing, Self::Analyzed | Self::NotFound)
                | (Self::Analyzed, Self::Solving)
                | (Self::Solving, Self::Solved)
        )
    }

    /// No further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Solved | Self::NotFound)
    }

    /// Cancellation is only offered before solving starts.
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Analyzing | Self::Analyzed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capture-to-answer session, owned by a single controller.
#[derive(Debug, Clone)]
pub struct PipelineSession {
    pub session_id: Uuid,
    state: PipelineState,
    pub question_text: String,
    pub solution_text: String,
    pub answer_label: String,
    pub lecture_tag: String,
    pub used_model_id: String,
    pub title: String,
    pub turbo_mode: bool,
    pub solve_failed: bool,
    pub screenshot: InlineImage,
    pub created_at: DateTime<Utc>,
}

impl PipelineSession {
    pub fn new(screenshot: InlineImage, turbo_mode: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: PipelineState::Idle,
            question_text: String::new(),
            solution_text: String::new(),
            answer_label: String::new(),
            lecture_tag: String::new(),
            used_model_id: String::new(),
            title: String::new(),
            turbo_mode,
            solve_failed: false,
            screenshot,
            created_at: Utc::now(),
        }
    }

    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Moves to `next` if the graph allows it.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidTransition`] for any edge not in the graph.
    pub fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::info!(session_id = %self.session_id, from = %self.state, to = %next, "state transition");
        self.state = next;
        Ok(())
    }

    /// The question text may be edited before solving, or after a failed solve.
    pub const fn is_editable(&self) -> bool {
        match self.state {
            PipelineState::Analyzed => true,
            PipelineState::Solved => self.solve_failed,
            _ => false,
        }
    }
}

/// Field updates applied to a session from the owner loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMutation {
    SetQuestion(String),
    SetSolution {
        answer_label: String,
        solution_text: String,
        lecture_tag: String,
        used_model_id: String,
    },
    SetSolveFailed {
        answer_label: String,
        solution_text: String,
    },
    SetTitle(String),
}

impl SessionMutation {
    pub fn apply(self, session: &mut PipelineSession) {
        match self {
            Self::SetQuestion(text) => session.question_text = text,
            Self::SetSolution {
                answer_label,
                solution_text,
                lecture_tag,
                used_model_id,
            } => {
                session.answer_label = answer_label;
                session.solution_text = solution_text;
                session.lecture_tag = lecture_tag;
                session.used_model_id = used_model_id;
                session.solve_failed = false;
            }
            Self::SetSolveFailed {
                answer_label,
                solution_text,
            } => {
                session.answer_label = answer_label;
                session.solution_text = solution_text;
                session.solve_failed = true;
            }
            Self::SetTitle(title) => session.title = title,
        }
    }
}
