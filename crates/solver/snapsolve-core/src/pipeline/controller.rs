//! Drives one session at a time through capture → analyze → solve.
//!
//! The controller lives on the owner loop. Network calls run on the tokio
//! runtime it was given, and their results come back as [`PipelineMessage`]s
//! that the owner loop feeds to [`PipelineController::handle`]. Session
//! fields are only ever touched from `&mut self`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{CloseReason, PipelineEvent, PipelineMessage, TaskOutput};
use super::state::{PipelineSession, PipelineState, SessionMutation};
use crate::error::{ErrorKind, PipelineError};
use crate::history::{HistoryRecord, HistoryRecorder, NoopHistory};
use crate::messages::{EnglishMessages, Localizer, MessageKey};
use crate::orchestrator::TaskExecutor;
use crate::schema::SchemaContext;
use crate::tags::{SharedTags, SubjectTagProvider, canonicalize_lecture};
use crate::task::{InlineImage, TaskRequest, TaskResult};

pub const DEFAULT_AUTO_CLOSE: Duration = Duration::from_millis(2500);

const TITLE_FALLBACK_CHARS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Read and solve in one request, skipping the analyze step.
    pub turbo: bool,
    /// Delay before a "question not found" session closes itself.
    pub auto_close: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            turbo: false,
            auto_close: DEFAULT_AUTO_CLOSE,
        }
    }
}

/// Receiving ends handed to the owner loop.
pub struct PipelineChannels {
    pub messages: UnboundedReceiver<PipelineMessage>,
    pub events: UnboundedReceiver<PipelineEvent>,
}

#[derive(Default)]
struct InFlight {
    ocr: Option<AbortHandle>,
    solve_request: Option<TaskRequest>,
    first_unsolved: Option<TaskResult>,
}

pub struct PipelineController {
    executor: Arc<dyn TaskExecutor>,
    settings: PipelineSettings,
    tags: Arc<dyn SubjectTagProvider>,
    history: Arc<dyn HistoryRecorder>,
    localizer: Arc<dyn Localizer>,
    runtime: Handle,
    messages_tx: UnboundedSender<PipelineMessage>,
    events_tx: UnboundedSender<PipelineEvent>,
    session: Option<PipelineSession>,
    in_flight: InFlight,
    /// Finished sessions waiting for a generated title. Outlives the session.
    pending_history: HashMap<Uuid, HistoryRecord>,
}

impl PipelineController {
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        settings: PipelineSettings,
        runtime: Handle,
    ) -> (Self, PipelineChannels) {
        let (messages_tx, messages) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let controller = Self {
            executor,
            settings,
            tags: Arc::new(SharedTags::default()),
            history: Arc::new(NoopHistory),
            localizer: Arc::new(EnglishMessages),
            runtime,
            messages_tx,
            events_tx,
            session: None,
            in_flight: InFlight::default(),
            pending_history: HashMap::new(),
        };
        (controller, PipelineChannels { messages, events })
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Arc<dyn SubjectTagProvider>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn HistoryRecorder>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub const fn session(&self) -> Option<&PipelineSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PipelineState {
        self.session
            .as_ref()
            .map_or(PipelineState::Idle, PipelineSession::state)
    }

    /// Sessions whose history record still waits for a title.
    pub fn pending_history(&self) -> usize {
        self.pending_history.len()
    }

    /// Starts a session for a freshly captured image.
    ///
    /// A finished session is replaced; an active one is left alone.
    ///
    /// # Errors
    ///
    /// [`PipelineError::SessionBusy`] while a session is analyzing, waiting
    /// for confirmation, or solving.
    pub fn capture(&mut self, image: InlineImage) -> Result<Uuid, PipelineError> {
        if let Some(current) = &self.session {
            if !current.state().is_terminal() {
                return Err(PipelineError::SessionBusy);
            }
            self.destroy(CloseReason::Replaced);
        }

        let turbo = self.settings.turbo;
        let mut session = PipelineSession::new(image, turbo);
        let session_id = session.session_id;
        self.emit(PipelineEvent::SessionStarted { session_id, turbo });

        if turbo {
            session.advance(PipelineState::Solving)?;
            let request =
                TaskRequest::turbo_solve(session.screenshot.clone(), &self.schema_context());
            self.session = Some(session);
            self.start_solve(session_id, request);
        } else {
            session.advance(PipelineState::Analyzing)?;
            let request = TaskRequest::ocr(session.screenshot.clone());
            self.session = Some(session);
            self.emit(PipelineEvent::AnalysisStarted { session_id });
            let handle = self.spawn(request, move |result| PipelineMessage::AnalysisFinished {
                session_id,
                result,
            });
            self.in_flight.ocr = Some(handle);
        }
        Ok(session_id)
    }

    /// User accepted the extracted question; start solving it.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoSession`] without a session,
    /// [`PipelineError::InvalidTransition`] outside `Analyzed`.
    pub fn confirm(&mut self) -> Result<(), PipelineError> {
        let context = self.schema_context();
        let session = self.session.as_mut().ok_or(PipelineError::NoSession)?;
        session.advance(PipelineState::Solving)?;
        let request = TaskRequest::solve(&session.question_text, &context);
        let session_id = session.session_id;
        self.start_solve(session_id, request);
        Ok(())
    }

    /// Replaces the question text without changing state.
    ///
    /// In `Analyzed` the next [`confirm`](Self::confirm) solves the edited
    /// text. After a failed solve there is no edge back to `Solving`: the
    /// edit only corrects the displayed question and the history record,
    /// and solving it again takes a new capture.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoSession`] without a session,
    /// [`PipelineError::NotEditable`] outside `Analyzed` or a failed `Solved`.
    pub fn edit_question(&mut self, text: impl Into<String>) -> Result<(), PipelineError> {
        let session = self.session.as_mut().ok_or(PipelineError::NoSession)?;
        if !session.is_editable() {
            return Err(PipelineError::NotEditable(session.state()));
        }
        let text = text.into();
        SessionMutation::SetQuestion(text.clone()).apply(session);
        let session_id = session.session_id;
        if let Some(record) = self.pending_history.get_mut(&session_id) {
            record.question.clone_from(&text);
        }
        self.emit(PipelineEvent::QuestionEdited { session_id, text });
        Ok(())
    }

    /// Abandons the session before solving starts.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoSession`] without a session,
    /// [`PipelineError::NotCancellable`] once solving has begun.
    pub fn cancel(&mut self) -> Result<(), PipelineError> {
        let state = self
            .session
            .as_ref()
            .ok_or(PipelineError::NoSession)?
            .state();
        if !state.is_cancellable() {
            return Err(PipelineError::NotCancellable(state));
        }
        self.destroy(CloseReason::Cancelled);
        Ok(())
    }

    /// Presentation surface closed.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoSession`] without a session,
    /// [`PipelineError::SessionBusy`] while solving.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        let state = self
            .session
            .as_ref()
            .ok_or(PipelineError::NoSession)?
            .state();
        if state == PipelineState::Solving {
            return Err(PipelineError::SessionBusy);
        }
        self.destroy(CloseReason::SurfaceClosed);
        Ok(())
    }

    /// Applies a result posted by background work.
    pub fn handle(&mut self, message: PipelineMessage) {
        if let PipelineMessage::TitleFinished { session_id, title } = message {
            self.finish_title(session_id, title);
            return;
        }

        let active = self.session.as_ref().map(|s| s.session_id);
        if active != Some(message.session_id()) {
            debug!(session_id = %message.session_id(), "dropping message for inactive session");
            return;
        }

        match message {
            PipelineMessage::AnalysisFinished { result, .. } => self.on_analysis(result),
            PipelineMessage::SolveFinished {
                attempt, result, ..
            } => self.on_solve(attempt, result),
            PipelineMessage::AutoClose { .. } => {
                if self.state() == PipelineState::NotFound {
                    self.destroy(CloseReason::AutoClose);
                }
            }
            PipelineMessage::TitleFinished { .. } => {}
        }
    }

    fn on_analysis(&mut self, result: TaskOutput) {
        self.in_flight.ocr = None;
        match result {
            Ok(task) => match task.ocr_text() {
                Some(text) if !task.is_empty() => {
                    let text = text.to_string();
                    self.analyzed(text, None);
                }
                _ => self.not_found(),
            },
            Err(err) => {
                let kind = err.root_kind();
                error!(error = %err, kind = ?kind, "question extraction failed");
                let text = self.localizer.message(MessageKey::Error(kind));
                self.analyzed(text, Some(kind));
            }
        }
    }

    fn analyzed(&mut self, text: String, error: Option<ErrorKind>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.advance(PipelineState::Analyzed) {
            warn!(error = %e, "ignoring analysis result");
            return;
        }
        SessionMutation::SetQuestion(text.clone()).apply(session);
        let session_id = session.session_id;
        self.emit(PipelineEvent::AnalysisCompleted {
            session_id,
            text,
            error,
        });
    }

    fn not_found(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.advance(PipelineState::NotFound) {
            warn!(error = %e, "ignoring empty analysis result");
            return;
        }
        let session_id = session.session_id;
        let message = self.localizer.message(MessageKey::QuestionNotFound);
        self.emit(PipelineEvent::QuestionNotFound {
            session_id,
            message,
        });

        let tx = self.messages_tx.clone();
        let delay = self.settings.auto_close;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // The owner loop may already be gone.
            let _ = tx.send(PipelineMessage::AutoClose { session_id });
        });
    }

    fn start_solve(&mut self, session_id: Uuid, request: TaskRequest) {
        self.in_flight.solve_request = Some(request.clone());
        self.in_flight.first_unsolved = None;
        self.spawn_solve_attempt(session_id, request, 1);
    }

    fn spawn_solve_attempt(&self, session_id: Uuid, request: TaskRequest, attempt: u8) {
        self.emit(PipelineEvent::SolveStarted {
            session_id,
            attempt,
        });
        self.spawn(request, move |result| PipelineMessage::SolveFinished {
            session_id,
            attempt,
            result,
        });
    }

    fn on_solve(&mut self, attempt: u8, result: TaskOutput) {
        match result {
            Ok(task) if attempt == 1 && task.is_unsolved() => {
                let Some(session_id) = self.session.as_ref().map(|s| s.session_id) else {
                    return;
                };
                let Some(request) = self.in_flight.solve_request.clone() else {
                    self.finish_solve(Ok(task));
                    return;
                };
                info!(session_id = %session_id, "answer ambiguous; retrying once");
                self.in_flight.first_unsolved = Some(task);
                self.spawn_solve_attempt(session_id, request, 2);
            }
            Ok(task) => {
                if task.is_unsolved() {
                    debug!(kind = ?ErrorKind::AmbiguousAnswerExhausted, "accepting unsolved retry result");
                }
                self.finish_solve(Ok(task));
            }
            Err(err) => match self.in_flight.first_unsolved.take() {
                Some(first) => {
                    warn!(error = %err, "retry failed; keeping first unsolved answer");
                    self.finish_solve(Ok(first));
                }
                None => self.finish_solve(Err(err)),
            },
        }
    }

    fn finish_solve(&mut self, result: TaskOutput) {
        self.in_flight.solve_request = None;
        self.in_flight.first_unsolved = None;

        let known = self.tags.known_tags();
        let mut solved = false;
        let mut title = None;
        let (mutation, error) = match &result {
            Ok(task) => match task.fields.answer_view() {
                Some(view) => {
                    solved = !view.is_ambiguous();
                    title = task.title().map(ToString::to_string);
                    (
                        SessionMutation::SetSolution {
                            answer_label: view.answers.to_string(),
                            solution_text: view.explanation.unwrap_or_default().to_string(),
                            lecture_tag: canonicalize_lecture(view.lecture, &known),
                            used_model_id: task.model_id.clone(),
                        },
                        None,
                    )
                }
                None => {
                    error!(task = %task.task_type, "solve result carried no answer fields");
                    self.solve_failure(ErrorKind::MalformedResponse)
                }
            },
            Err(err) => {
                let kind = err.root_kind();
                error!(error = %err, kind = ?kind, "solve failed");
                self.solve_failure(kind)
            }
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.advance(PipelineState::Solved) {
            warn!(error = %e, "ignoring solve result");
            return;
        }
        mutation.apply(session);
        if let Some(title) = title {
            SessionMutation::SetTitle(title).apply(session);
        }

        let event = PipelineEvent::SolveCompleted {
            session_id: session.session_id,
            answer: session.answer_label.clone(),
            lecture: session.lecture_tag.clone(),
            explanation: session.solution_text.clone(),
            solved,
            error,
        };
        let record = history_record(session);
        self.emit(event);
        self.queue_history(record);
    }

    fn solve_failure(&self, kind: ErrorKind) -> (SessionMutation, Option<ErrorKind>) {
        (
            SessionMutation::SetSolveFailed {
                answer_label: self.localizer.message(MessageKey::SolveFailed),
                solution_text: self.localizer.message(MessageKey::Error(kind)),
            },
            Some(kind),
        )
    }

    /// Records immediately when a title is known, otherwise asks the model
    /// for one first.
    fn queue_history(&mut self, mut record: HistoryRecord) {
        if !record.title.is_empty() {
            self.write_history(&record);
            return;
        }
        if record.question.trim().is_empty() {
            record.title = self.localizer.message(MessageKey::Untitled);
            self.write_history(&record);
            return;
        }

        let session_id = record.session_id;
        let request = TaskRequest::title(&record.question);
        self.pending_history.insert(session_id, record);
        self.spawn(request, move |result| PipelineMessage::TitleFinished {
            session_id,
            title: result
                .ok()
                .and_then(|task| task.title().map(ToString::to_string)),
        });
    }

    fn finish_title(&mut self, session_id: Uuid, title: Option<String>) {
        let Some(mut record) = self.pending_history.remove(&session_id) else {
            debug!(session_id = %session_id, "no pending history for title");
            return;
        };
        record.title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                fallback_title(&record.question)
                    .unwrap_or_else(|| self.localizer.message(MessageKey::Untitled))
            });
        if let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.session_id == session_id)
        {
            SessionMutation::SetTitle(record.title.clone()).apply(session);
        }
        self.write_history(&record);
    }

    fn write_history(&self, record: &HistoryRecord) {
        match self.history.record(record) {
            Ok(()) => debug!(session_id = %record.session_id, "history recorded"),
            Err(e) => warn!(session_id = %record.session_id, error = %e, "failed to record history"),
        }
    }

    fn destroy(&mut self, reason: CloseReason) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(ocr) = self.in_flight.ocr.take() {
            ocr.abort();
        }
        self.in_flight = InFlight::default();
        info!(session_id = %session.session_id, state = %session.state(), reason = ?reason, "session closed");
        self.emit(PipelineEvent::SessionClosed {
            session_id: session.session_id,
            reason,
        });
    }

    fn schema_context(&self) -> SchemaContext {
        SchemaContext {
            known_tags: self.tags.known_tags(),
        }
    }

    fn spawn<F>(&self, request: TaskRequest, wrap: F) -> AbortHandle
    where
        F: FnOnce(TaskOutput) -> PipelineMessage + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        let tx = self.messages_tx.clone();
        let task = request.task_type();
        self.runtime
            .spawn(async move {
                let result = executor.execute(request).await;
                if tx.send(wrap(result)).is_err() {
                    debug!(task = %task, "owner loop gone; dropping result");
                }
            })
            .abort_handle()
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

fn history_record(session: &PipelineSession) -> HistoryRecord {
    HistoryRecord {
        session_id: session.session_id,
        created_at: session.created_at,
        title: session.title.clone(),
        question: session.question_text.clone(),
        answer: session.answer_label.clone(),
        lecture: session.lecture_tag.clone(),
        explanation: session.solution_text.clone(),
        model_id: session.used_model_id.clone(),
        turbo: session.turbo_mode,
        solve_failed: session.solve_failed,
        screenshot_mime: session.screenshot.mime_type.clone(),
        screenshot: session.screenshot.bytes.clone(),
    }
}

/// First line of the question, shortened for a history list.
fn fallback_title(question: &str) -> Option<String> {
    let line = question.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() <= TITLE_FALLBACK_CHARS {
        return Some(line.to_string());
    }
    let cut: String = line.chars().take(TITLE_FALLBACK_CHARS).collect();
    Some(format!("{}…", cut.trim_end()))
}
