//! User-facing strings. The pipeline never shows raw technical errors; it
//! asks a [`Localizer`] for a message instead.

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Error(ErrorKind),
    QuestionNotFound,
    /// Answer label shown when solving failed.
    SolveFailed,
    Untitled,
}

pub trait Localizer: Send + Sync {
    fn message(&self, key: MessageKey) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishMessages;

impl Localizer for EnglishMessages {
    fn message(&self, key: MessageKey) -> String {
        let text = match key {
            MessageKey::Error(kind) => match kind {
                ErrorKind::NoCredentials => {
                    "No API key is configured. Add a Gemini API key in the settings."
                }
                ErrorKind::TransportFailure => {
                    "Could not reach the Gemini service. Check your connection and try again."
                }
                ErrorKind::RateLimited => "Every API key is rate limited right now. Try again shortly.",
                ErrorKind::MalformedResponse => "The model returned an unreadable answer. Try again.",
                ErrorKind::AllCredentialsExhausted => {
                    "All API keys failed for this request. Check your keys or try again later."
                }
                ErrorKind::AmbiguousAnswerExhausted => "The model could not settle on an answer.",
                ErrorKind::Timeout => "The request took too long and was stopped.",
            },
            MessageKey::QuestionNotFound => "No question was found in the captured area.",
            MessageKey::SolveFailed => "Error",
            MessageKey::Untitled => "Untitled",
        };
        text.to_string()
    }
}
