//! Executes task requests against the Gemini API, rotating through the
//! credential pool.
//!
//! Every credential is tried at most once per call, in pool order. Any
//! failure (rate limit, transport, non-2xx, undecodable body) is soft and
//! moves on to the next credential; the first fully decoded response wins.

use async_trait::async_trait;
use gemini_async::types::{GenerateContentRequest, Part};
use gemini_async::{Client, GeminiConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::credentials::{Credential, CredentialPool};
use crate::decoder::{Decoded, ResponseDecoder};
use crate::error::{AttemptFailure, OrchestratorError};
use crate::task::{TaskRequest, TaskResult, TaskType};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Model id per task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub ocr: String,
    pub solve: String,
    pub turbo: String,
    pub title: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            ocr: "gemini-2.5-flash".into(),
            solve: "gemini-2.5-pro".into(),
            turbo: "gemini-2.5-flash".into(),
            title: "gemini-2.5-flash-lite".into(),
        }
    }
}

impl ModelSelection {
    pub fn for_task(&self, task: TaskType) -> &str {
        match task {
            TaskType::Ocr => &self.ocr,
            TaskType::Solve => &self.solve,
            TaskType::TurboSolve => &self.turbo,
            TaskType::TitleGen => &self.title,
        }
    }
}

/// Anything that can run a [`TaskRequest`] to completion.
///
/// The pipeline controller only depends on this trait.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, request: TaskRequest) -> Result<TaskResult, OrchestratorError>;
}

pub struct RequestOrchestrator {
    client: Client<GeminiConfig>,
    pool: Arc<dyn CredentialPool>,
    models: ModelSelection,
    call_timeout: Duration,
    preferred: Mutex<Option<Credential>>,
}

impl RequestOrchestrator {
    /// `client` supplies base URL and per-request timeout; its own key, if
    /// any, is replaced by each pool credential in turn.
    pub fn new(client: Client<GeminiConfig>, pool: Arc<dyn CredentialPool>) -> Self {
        Self {
            client,
            pool,
            models: ModelSelection::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            preferred: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = models;
        self
    }

    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Credential that last produced a successful result.
    pub fn preferred_credential(&self) -> Option<Credential> {
        self.preferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Idle default: the preferred credential if it is still pooled, else a
    /// random one.
    pub fn default_credential(&self) -> Option<Credential> {
        let pooled = self.pool.list_all();
        self.preferred_credential()
            .filter(|preferred| pooled.iter().any(|c| c.same_token(preferred)))
            .or_else(|| self.pool.pick_one())
    }

    /// Runs `request`, bounded by the call timeout.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::NoCredentials`] if the pool is empty.
    /// - [`OrchestratorError::AllCredentialsExhausted`] if every credential failed.
    /// - [`OrchestratorError::Timeout`] if the whole call ran past the limit.
    pub async fn execute(&self, request: &TaskRequest) -> Result<TaskResult, OrchestratorError> {
        if let Ok(result) = tokio::time::timeout(self.call_timeout, self.rotate(request)).await {
            result
        } else {
            warn!(
                task = %request.task_type(),
                timeout_ms = u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX),
                "call timed out"
            );
            Err(OrchestratorError::Timeout(self.call_timeout))
        }
    }

    async fn rotate(&self, request: &TaskRequest) -> Result<TaskResult, OrchestratorError> {
        let credentials = self.pool.list_all();
        if credentials.is_empty() {
            warn!(task = %request.task_type(), "no credentials configured");
            return Err(OrchestratorError::NoCredentials);
        }

        let task = request.task_type();
        let model = self.models.for_task(task);
        let body = wire_request(request);
        let mut last_failure = None;

        for (position, credential) in credentials.iter().enumerate() {
            let name = credential.display_name();
            debug!(task = %task, credential = %name, position, model, "attempt");
            match self.attempt(model, &body, task, credential).await {
                Ok(decoded) => {
                    info!(task = %task, credential = %name, outcome = ?decoded.outcome, "task completed");
                    self.remember(credential);
                    return Ok(TaskResult {
                        task_type: task,
                        raw_text: decoded.raw_text,
                        fields: decoded.fields,
                        outcome: decoded.outcome,
                        model_id: model.to_string(),
                        credential: Some(name),
                    });
                }
                Err(failure) => {
                    warn!(
                        task = %task,
                        credential = %name,
                        position,
                        kind = ?failure.kind(),
                        error = %failure,
                        "attempt failed; trying next credential"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let Some(last) = last_failure else {
            return Err(OrchestratorError::NoCredentials);
        };
        let err = OrchestratorError::AllCredentialsExhausted {
            attempts: credentials.len(),
            last,
        };
        error!(task = %task, error = %err, "all credentials exhausted");
        Err(err)
    }

    async fn attempt(
        &self,
        model: &str,
        body: &GenerateContentRequest,
        task: TaskType,
        credential: &Credential,
    ) -> Result<Decoded, AttemptFailure> {
        let client = self.client.with_credential(credential.secret().clone());
        let payload = client.models().generate_content_raw(model, body).await?;
        Ok(ResponseDecoder::decode(task, &payload)?)
    }

    fn remember(&self, credential: &Credential) {
        *self.preferred.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
    }
}

#[async_trait]
impl TaskExecutor for RequestOrchestrator {
    async fn execute(&self, request: TaskRequest) -> Result<TaskResult, OrchestratorError> {
        Self::execute(self, &request).await
    }
}

/// Builds the `generateContent` body: image first, then the prompt, with the
/// task schema as structured-output constraint.
pub fn wire_request(request: &TaskRequest) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = request.inline_image() {
        parts.push(Part::inline(image.mime_type.clone(), &image.bytes));
    }
    parts.push(Part::text(request.text_prompt()));
    GenerateContentRequest::from_parts(parts)
        .with_response_schema(request.response_schema().to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SharedCredentialPool;
    use crate::schema::SchemaContext;
    use crate::task::InlineImage;

    #[test]
    fn wire_request_carries_image_prompt_and_schema() {
        let req = TaskRequest::ocr(InlineImage::png(vec![1, 2, 3]));
        let json = serde_json::to_value(wire_request(&req)).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[0]["inline_data"]["data"], "AQID");
        assert!(parts[1]["text"].as_str().unwrap().contains("screenshot"));
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            json["generationConfig"]["responseSchema"]["required"][1],
            "hasText"
        );
    }

    #[test]
    fn text_only_tasks_have_one_part() {
        let req = TaskRequest::solve("1+1?", &SchemaContext::default());
        let json = serde_json::to_value(wire_request(&req)).unwrap();
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn models_by_task() {
        let models = ModelSelection {
            ocr: "o".into(),
            solve: "s".into(),
            turbo: "t".into(),
            title: "n".into(),
        };
        assert_eq!(models.for_task(TaskType::Ocr), "o");
        assert_eq!(models.for_task(TaskType::TurboSolve), "t");
        assert_eq!(models.for_task(TaskType::TitleGen), "n");
    }

    #[tokio::test]
    async fn empty_pool_fails_fast() {
        let orch = RequestOrchestrator::new(
            Client::with_config(GeminiConfig::new().with_api_base("http://127.0.0.1:9")),
            Arc::new(SharedCredentialPool::new()),
        );
        let err = orch
            .execute(&TaskRequest::title("q"))
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::NoCredentials);
        assert!(orch.default_credential().is_none());
    }

    #[test]
    fn default_credential_falls_back_to_pool() {
        let pool = SharedCredentialPool::from_tokens(["only-key-0001"]);
        let orch = RequestOrchestrator::new(Client::new(), Arc::new(pool.clone()));
        assert!(orch.preferred_credential().is_none());
        assert_eq!(orch.default_credential().unwrap().display_name(), "…0001");

        orch.remember(&Credential::new("gone-key-0002"));
        assert_eq!(orch.default_credential().unwrap().display_name(), "…0001");
        pool.add(Credential::new("gone-key-0002"));
        assert_eq!(orch.default_credential().unwrap().display_name(), "…0002");
    }
}
