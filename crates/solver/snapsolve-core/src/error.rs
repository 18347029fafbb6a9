//! Error taxonomy for orchestration, decoding and the pipeline.

use gemini_async::GeminiError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::PipelineState;

/// Flat classification of every failure the pipeline can observe.
///
/// Used in [`TaskOutcome::Error`](crate::task::TaskOutcome) and to pick the
/// localized message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoCredentials,
    TransportFailure,
    RateLimited,
    MalformedResponse,
    AllCredentialsExhausted,
    AmbiguousAnswerExhausted,
    Timeout,
}

/// Why a single credential attempt failed.
///
/// Every variant is a soft failure: the orchestrator records it and moves on
/// to the next credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl AttemptFailure {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::Timeout => ErrorKind::Timeout,
            Self::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<GeminiError> for AttemptFailure {
    fn from(e: GeminiError) -> Self {
        if e.is_rate_limited() {
            let message = match &e {
                GeminiError::Api(obj) => obj.message.clone(),
                other => other.to_string(),
            };
            return Self::RateLimited {
                status: e.status_code().unwrap_or(429),
                message,
            };
        }
        if e.is_timeout() {
            return Self::Timeout;
        }
        match e {
            GeminiError::Serde(msg) => Self::Malformed(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<DecodeError> for AttemptFailure {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Malformed(msg) => Self::Malformed(msg),
        }
    }
}

/// Failure of a whole [`RequestOrchestrator::execute`](crate::orchestrator::RequestOrchestrator) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("no credentials configured")]
    NoCredentials,

    #[error("all {attempts} credential(s) failed; last error: {last}")]
    AllCredentialsExhausted {
        attempts: usize,
        #[source]
        last: AttemptFailure,
    },

    #[error("request did not complete within {0:?}")]
    Timeout(Duration),
}

impl OrchestratorError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCredentials => ErrorKind::NoCredentials,
            Self::AllCredentialsExhausted { .. } => ErrorKind::AllCredentialsExhausted,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Classification of the last underlying failure, when there was one.
    pub const fn root_kind(&self) -> ErrorKind {
        match self {
            Self::AllCredentialsExhausted { last, .. } => last.kind(),
            other => other.kind(),
        }
    }
}

/// Payload could not be turned into the task's structured fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Malformed(String),
}

/// Rejected pipeline operation. The session is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("a session is already in progress")]
    SessionBusy,

    #[error("no active session")]
    NoSession,

    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("session cannot be cancelled while {0}")]
    NotCancellable(PipelineState),

    #[error("question cannot be edited while {0}")]
    NotEditable(PipelineState),
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_async::ApiErrorObject;

    #[test]
    fn gemini_429_maps_to_rate_limited() {
        let err = GeminiError::Api(ApiErrorObject {
            code: Some(429),
            message: "Quota exceeded".into(),
            status: Some("RESOURCE_EXHAUSTED".into()),
        });
        let failure = AttemptFailure::from(err);
        assert_eq!(
            failure,
            AttemptFailure::RateLimited {
                status: 429,
                message: "Quota exceeded".into()
            }
        );
        assert_eq!(failure.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn gemini_5xx_maps_to_transport() {
        let err = GeminiError::Api(ApiErrorObject {
            code: Some(500),
            message: "boom".into(),
            status: None,
        });
        assert_eq!(
            AttemptFailure::from(err).kind(),
            ErrorKind::TransportFailure
        );
    }

    #[test]
    fn gemini_serde_maps_to_malformed() {
        let failure = AttemptFailure::from(GeminiError::Serde("bad json".into()));
        assert_eq!(failure, AttemptFailure::Malformed("bad json".into()));
    }

    #[test]
    fn exhausted_exposes_last_kind() {
        let err = OrchestratorError::AllCredentialsExhausted {
            attempts: 2,
            last: AttemptFailure::Timeout,
        };
        assert_eq!(err.kind(), ErrorKind::AllCredentialsExhausted);
        assert_eq!(err.root_kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("2 credential(s)"));
    }
}
