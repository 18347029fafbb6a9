use async_trait::async_trait;
use serde_json::json;
use snapsolve_core::error::AttemptFailure;
use snapsolve_core::pipeline::{PipelineChannels, TaskOutput};
use snapsolve_core::task::{OcrFields, SolveFields, StructuredFields, TurboSolveFields};
use snapsolve_core::{
    CloseReason, EnglishMessages, ErrorKind, InlineImage, Localizer, MemoryHistory, MessageKey,
    OrchestratorError, PipelineController, PipelineError, PipelineEvent, PipelineSettings,
    PipelineState, RequestOrchestrator, SharedCredentialPool, SharedTags, TaskExecutor,
    TaskOutcome, TaskRequest, TaskResult, TaskType,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays canned results per task type and records every request.
#[derive(Default)]
struct Scripted {
    replies: Mutex<HashMap<TaskType, VecDeque<TaskOutput>>>,
    calls: Mutex<Vec<(TaskType, String)>>,
}

impl Scripted {
    fn reply(self, task: TaskType, output: TaskOutput) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(task)
            .or_default()
            .push_back(output);
        self
    }

    fn calls(&self) -> Vec<TaskType> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn prompts(&self, task: TaskType) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == task)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl TaskExecutor for Scripted {
    async fn execute(&self, request: TaskRequest) -> Result<TaskResult, OrchestratorError> {
        let task = request.task_type();
        self.calls
            .lock()
            .unwrap()
            .push((task, request.text_prompt().to_string()));
        let scripted = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&task)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(output) => output,
            None if task == TaskType::TitleGen => Ok(title("Generated title")),
            None => Err(OrchestratorError::NoCredentials),
        }
    }
}

fn result(task_type: TaskType, fields: StructuredFields, outcome: TaskOutcome) -> TaskResult {
    TaskResult {
        task_type,
        raw_text: String::new(),
        fields,
        outcome,
        model_id: format!("model-{task_type}"),
        credential: Some("key#1".into()),
    }
}

fn ocr(text: &str) -> TaskOutput {
    let has_text = !text.is_empty();
    Ok(result(
        TaskType::Ocr,
        StructuredFields::Ocr(OcrFields {
            text: text.into(),
            has_text,
        }),
        if has_text {
            TaskOutcome::Success
        } else {
            TaskOutcome::Empty
        },
    ))
}

fn solve(answers: &str, solved: bool, title: &str) -> TaskOutput {
    Ok(result(
        TaskType::Solve,
        StructuredFields::Solve(SolveFields {
            lecture: "arithmetic".into(),
            title: title.into(),
            explanation: format!("The answer is {answers}."),
            solved,
            answers: answers.into(),
        }),
        TaskOutcome::Success,
    ))
}

fn turbo(answers: &str) -> TaskOutput {
    Ok(result(
        TaskType::TurboSolve,
        StructuredFields::TurboSolve(TurboSolveFields {
            lecture: "Geometry".into(),
            title: String::new(),
            solved: true,
            answers: answers.into(),
        }),
        TaskOutcome::Success,
    ))
}

fn title(text: &str) -> TaskResult {
    result(
        TaskType::TitleGen,
        StructuredFields::Title(snapsolve_core::task::TitleFields { title: text.into() }),
        TaskOutcome::Success,
    )
}

fn exhausted() -> TaskOutput {
    Err(OrchestratorError::AllCredentialsExhausted {
        attempts: 2,
        last: AttemptFailure::RateLimited {
            status: 429,
            message: "Quota exceeded".into(),
        },
    })
}

fn screenshot() -> InlineImage {
    InlineImage::png(b"\x89PNG".to_vec())
}

struct Harness {
    controller: PipelineController,
    channels: PipelineChannels,
    executor: Arc<Scripted>,
    history: Arc<MemoryHistory>,
}

impl Harness {
    fn new(executor: Scripted, settings: PipelineSettings) -> Self {
        let executor = Arc::new(executor);
        let history = Arc::new(MemoryHistory::default());
        let (controller, channels) = PipelineController::new(
            Arc::clone(&executor) as Arc<dyn TaskExecutor>,
            settings,
            Handle::current(),
        );
        let controller = controller
            .with_history(Arc::clone(&history) as _)
            .with_tags(Arc::new(SharedTags::new(["Arithmetic"])));
        Self {
            controller,
            channels,
            executor,
            history,
        }
    }

    fn normal(executor: Scripted) -> Self {
        Self::new(executor, PipelineSettings::default())
    }

    /// Waits for the next background result and applies it.
    async fn pump(&mut self) {
        let message = tokio::time::timeout(Duration::from_secs(5), self.channels.messages.recv())
            .await
            .expect("background result in time")
            .expect("message channel open");
        self.controller.handle(message);
    }

    fn events(&mut self) -> Vec<PipelineEvent> {
        let mut events = vec![];
        while let Ok(event) = self.channels.events.try_recv() {
            events.push(event);
        }
        events
    }
}

#[tokio::test]
async fn capture_analyze_confirm_solve() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("2+2=? a) 3 b) 4"))
            .reply(TaskType::Solve, solve("B", true, "Adding two numbers")),
    );

    let id = h.controller.capture(screenshot()).unwrap();
    assert_eq!(h.controller.state(), PipelineState::Analyzing);
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Analyzed);
    assert_eq!(
        h.controller.session().unwrap().question_text,
        "2+2=? a) 3 b) 4"
    );

    h.controller.confirm().unwrap();
    assert_eq!(h.controller.state(), PipelineState::Solving);
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Solved);

    let session = h.controller.session().unwrap();
    assert_eq!(session.answer_label, "B");
    assert_eq!(session.lecture_tag, "Arithmetic");
    assert_eq!(session.used_model_id, "model-solve");
    assert!(!session.solve_failed);

    assert_eq!(h.executor.calls(), vec![TaskType::Ocr, TaskType::Solve]);
    assert!(h.executor.prompts(TaskType::Solve)[0].contains("2+2=? a) 3 b) 4"));

    let events = h.events();
    assert_eq!(
        events[0],
        PipelineEvent::SessionStarted {
            session_id: id,
            turbo: false
        }
    );
    assert!(events.contains(&PipelineEvent::SolveCompleted {
        session_id: id,
        answer: "B".into(),
        lecture: "Arithmetic".into(),
        explanation: "The answer is B.".into(),
        solved: true,
        error: None,
    }));

    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Adding two numbers");
    assert_eq!(records[0].screenshot, b"\x89PNG".to_vec());
}

#[tokio::test]
async fn ambiguous_answer_is_retried_exactly_once() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("Which is prime?"))
            .reply(TaskType::Solve, solve("", false, "Primes"))
            .reply(TaskType::Solve, solve("", false, "Primes again")),
    );

    h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Solving);
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Solved);

    let solves = h
        .executor
        .calls()
        .into_iter()
        .filter(|t| *t == TaskType::Solve)
        .count();
    assert_eq!(solves, 2);

    let attempts: Vec<u8> = h
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::SolveStarted { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);

    assert_eq!(h.controller.session().unwrap().title, "Primes again");
}

#[tokio::test]
async fn retry_answer_replaces_ambiguous_one() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("2+2=? a) 3 b) 4"))
            .reply(TaskType::Solve, solve("", false, "Sum"))
            .reply(TaskType::Solve, solve("B", true, "Sum")),
    );

    h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();
    h.pump().await;
    h.pump().await;

    let session = h.controller.session().unwrap();
    assert_eq!(session.answer_label, "B");
    assert!(!session.solve_failed);
}

#[tokio::test]
async fn failed_retry_keeps_first_answer() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("Pick one"))
            .reply(TaskType::Solve, solve("C", false, "Guess"))
            .reply(TaskType::Solve, exhausted()),
    );

    h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();
    h.pump().await;
    h.pump().await;

    let session = h.controller.session().unwrap();
    assert_eq!(session.state(), PipelineState::Solved);
    assert_eq!(session.answer_label, "C");
    assert!(!session.solve_failed);
}

#[tokio::test]
async fn turbo_never_runs_ocr() {
    let settings = PipelineSettings {
        turbo: true,
        ..PipelineSettings::default()
    };
    let mut h = Harness::new(
        Scripted::default().reply(TaskType::TurboSolve, turbo("D")),
        settings,
    );

    let id = h.controller.capture(screenshot()).unwrap();
    assert_eq!(h.controller.state(), PipelineState::Solving);
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Solved);

    assert_eq!(h.executor.calls(), vec![TaskType::TurboSolve]);
    let session = h.controller.session().unwrap();
    assert_eq!(session.answer_label, "D");
    assert!(session.turbo_mode);
    assert!(session.question_text.is_empty());

    let events = h.events();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PipelineEvent::AnalysisStarted { .. }))
    );
    assert!(events.contains(&PipelineEvent::SessionStarted {
        session_id: id,
        turbo: true
    }));

    // No question text and no model title: recorded as untitled.
    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Untitled");
    assert!(records[0].turbo);
}

#[tokio::test]
async fn solving_cannot_be_interrupted() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("x + 1 = 3"))
            .reply(TaskType::Solve, solve("2", true, "Linear equation")),
    );

    h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();

    assert_eq!(
        h.controller.cancel(),
        Err(PipelineError::NotCancellable(PipelineState::Solving))
    );
    assert_eq!(h.controller.close(), Err(PipelineError::SessionBusy));
    assert_eq!(
        h.controller.capture(screenshot()),
        Err(PipelineError::SessionBusy)
    );
    assert_eq!(
        h.controller.edit_question("other"),
        Err(PipelineError::NotEditable(PipelineState::Solving))
    );
    assert_eq!(
        h.controller.confirm(),
        Err(PipelineError::InvalidTransition {
            from: PipelineState::Solving,
            to: PipelineState::Solving
        })
    );

    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Solved);
    assert_eq!(h.controller.session().unwrap().answer_label, "2");
}

#[tokio::test]
async fn cancel_while_analyzing_discards_result() {
    let mut h = Harness::normal(Scripted::default().reply(TaskType::Ocr, ocr("late text")));

    let id = h.controller.capture(screenshot()).unwrap();
    h.controller.cancel().unwrap();
    assert_eq!(h.controller.state(), PipelineState::Idle);

    tokio::task::yield_now().await;
    while let Ok(message) = h.channels.messages.try_recv() {
        h.controller.handle(message);
    }
    assert_eq!(h.controller.state(), PipelineState::Idle);

    let events = h.events();
    assert!(events.contains(&PipelineEvent::SessionClosed {
        session_id: id,
        reason: CloseReason::Cancelled
    }));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PipelineEvent::AnalysisCompleted { .. }))
    );
}

#[tokio::test]
async fn no_question_closes_itself() {
    let settings = PipelineSettings {
        turbo: false,
        auto_close: Duration::from_millis(10),
    };
    let mut h = Harness::new(Scripted::default().reply(TaskType::Ocr, ocr("")), settings);

    let id = h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::NotFound);
    assert_eq!(
        h.controller.confirm(),
        Err(PipelineError::InvalidTransition {
            from: PipelineState::NotFound,
            to: PipelineState::Solving
        })
    );

    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Idle);

    let events = h.events();
    assert!(events.contains(&PipelineEvent::QuestionNotFound {
        session_id: id,
        message: EnglishMessages.message(MessageKey::QuestionNotFound),
    }));
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::SessionClosed {
            session_id: id,
            reason: CloseReason::AutoClose
        })
    );
    assert!(h.history.records().is_empty());
}

#[tokio::test]
async fn analysis_error_shows_readable_text() {
    let mut h = Harness::normal(Scripted::default().reply(TaskType::Ocr, exhausted()));

    let id = h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    assert_eq!(h.controller.state(), PipelineState::Analyzed);

    let expected = EnglishMessages.message(MessageKey::Error(ErrorKind::RateLimited));
    assert_eq!(h.controller.session().unwrap().question_text, expected);
    assert!(h.events().contains(&PipelineEvent::AnalysisCompleted {
        session_id: id,
        text: expected,
        error: Some(ErrorKind::RateLimited),
    }));
}

#[tokio::test]
async fn edited_question_is_what_gets_solved() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("2+2=7?"))
            .reply(TaskType::Solve, solve("4", true, "Sum")),
    );

    h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.edit_question("2+2=?").unwrap();
    assert_eq!(h.controller.state(), PipelineState::Analyzed);
    h.controller.confirm().unwrap();
    h.pump().await;

    let prompt = &h.executor.prompts(TaskType::Solve)[0];
    assert!(prompt.contains("2+2=?"));
    assert!(!prompt.contains("2+2=7?"));
    assert_eq!(h.history.records()[0].question, "2+2=?");
}

#[tokio::test]
async fn solve_failure_is_shown_and_editable() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("Integrate x dx"))
            .reply(TaskType::Solve, exhausted()),
    );

    let id = h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();
    h.pump().await;

    let session = h.controller.session().unwrap();
    assert_eq!(session.state(), PipelineState::Solved);
    assert!(session.solve_failed);
    assert_eq!(
        session.answer_label,
        EnglishMessages.message(MessageKey::SolveFailed)
    );
    assert!(h.events().iter().any(|e| matches!(
        e,
        PipelineEvent::SolveCompleted { session_id, solved: false, error: Some(ErrorKind::RateLimited), .. }
            if *session_id == id
    )));

    h.controller.edit_question("Integrate 2x dx").unwrap();
    assert_eq!(
        h.controller.session().unwrap().question_text,
        "Integrate 2x dx"
    );
    // The correction is kept for the record; it does not re-solve.
    assert_eq!(
        h.controller.confirm(),
        Err(PipelineError::InvalidTransition {
            from: PipelineState::Solved,
            to: PipelineState::Solving
        })
    );

    // Titles for failed sessions are generated like any other.
    h.pump().await;
    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].solve_failed);
    assert_eq!(records[0].question, "Integrate 2x dx");
    assert_eq!(h.executor.prompts(TaskType::Solve).len(), 1);
}

#[tokio::test]
async fn missing_title_is_generated_before_recording() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("Capital of France?"))
            .reply(TaskType::Solve, solve("Paris", true, "")),
    );

    let first = h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();
    h.pump().await;
    assert!(h.history.records().is_empty());
    assert_eq!(h.controller.pending_history(), 1);

    // Replacing the finished session does not lose the pending record.
    let second = h.controller.capture(screenshot()).unwrap();
    assert_ne!(first, second);
    assert!(h.events().contains(&PipelineEvent::SessionClosed {
        session_id: first,
        reason: CloseReason::Replaced
    }));

    let mut seen_title = false;
    for _ in 0..2 {
        h.pump().await;
        if !h.history.records().is_empty() {
            seen_title = true;
            break;
        }
    }
    assert!(seen_title);
    let records = h.history.records();
    assert_eq!(records[0].session_id, first);
    assert_eq!(records[0].title, "Generated title");
    assert_eq!(h.controller.pending_history(), 0);
}

#[tokio::test]
async fn failed_title_falls_back_to_question() {
    let mut h = Harness::normal(
        Scripted::default()
            .reply(TaskType::Ocr, ocr("What is the derivative of x^2?\nA) x\nB) 2x"))
            .reply(TaskType::Solve, solve("B", true, ""))
            .reply(TaskType::TitleGen, Err(OrchestratorError::NoCredentials)),
    );

    h.controller.capture(screenshot()).unwrap();
    h.pump().await;
    h.controller.confirm().unwrap();
    h.pump().await;
    h.pump().await;

    let records = h.history.records();
    assert_eq!(records[0].title, "What is the derivative of x^2?");
    assert_eq!(h.controller.session().unwrap().title, records[0].title);
}

#[tokio::test]
async fn rotated_key_feeds_the_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "k1"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "k2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"text\":\"2+2=?\",\"hasText\":true}"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = gemini_async::GeminiConfig::new()
        .with_api_base(format!("{}/v1beta/models", server.uri()));
    let orchestrator = RequestOrchestrator::new(
        gemini_async::Client::with_config(config),
        Arc::new(SharedCredentialPool::from_tokens(["k1", "k2"])),
    );
    let (mut controller, mut channels) = PipelineController::new(
        Arc::new(orchestrator),
        PipelineSettings::default(),
        Handle::current(),
    );

    controller.capture(screenshot()).unwrap();
    let message = tokio::time::timeout(Duration::from_secs(5), channels.messages.recv())
        .await
        .unwrap()
        .unwrap();
    controller.handle(message);

    assert_eq!(controller.state(), PipelineState::Analyzed);
    assert_eq!(controller.session().unwrap().question_text, "2+2=?");
}
