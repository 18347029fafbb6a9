//! API credentials and the shared, ordered credential pool.

use rand::seq::SliceRandom;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, PoisonError, RwLock};

/// Shortest token whose last four characters may be shown.
const MIN_TAIL_TOKEN_LEN: usize = 8;

/// A single API key with an optional human label.
///
/// `Debug` output never contains the token.
#[derive(Clone, Debug)]
pub struct Credential {
    token: SecretString,
    label: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into().trim().to_string()),
            label: None,
        }
    }

    pub fn from_secret(token: &SecretString) -> Self {
        Self::new(token.expose_secret())
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub const fn secret(&self) -> &SecretString {
        &self.token
    }

    pub(crate) fn same_token(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
    }

    fn is_blank(&self) -> bool {
        self.token.expose_secret().is_empty()
    }

    /// Label if set, otherwise the last four characters of the token.
    ///
    /// Tokens too short for a tail to hide the rest are fully masked.
    pub fn display_name(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let token = self.token.expose_secret();
        if token.chars().count() <= MIN_TAIL_TOKEN_LEN {
            return "…****".to_string();
        }
        let tail: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{tail}")
    }
}

/// Source of credentials for the orchestrator.
///
/// `list_all` returns the pool in insertion order; callers must handle an
/// empty pool themselves.
pub trait CredentialPool: Send + Sync {
    fn list_all(&self) -> Vec<Credential>;

    /// A random credential, for picking an idle default. Never used to order
    /// attempts within a call.
    fn pick_one(&self) -> Option<Credential>;
}

/// Process-wide pool shared by every orchestrator that holds a clone.
///
/// Reads take a snapshot; writers replace entries in place. Overlapping
/// readers see last-writer-wins.
#[derive(Clone, Debug, Default)]
pub struct SharedCredentialPool {
    inner: Arc<RwLock<Vec<Credential>>>,
}

impl SharedCredentialPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pool from raw tokens, skipping blanks and duplicates.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = Self::new();
        for token in tokens {
            pool.add(Credential::new(token));
        }
        pool
    }

    /// Appends `credential` unless it is blank or already present.
    ///
    /// Returns whether the pool changed.
    pub fn add(&self, credential: Credential) -> bool {
        if credential.is_blank() {
            return false;
        }
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if guard.iter().any(|c| c.same_token(&credential)) {
            return false;
        }
        guard.push(credential);
        true
    }

    /// Removes every credential whose token equals `token`.
    pub fn remove(&self, token: &str) -> bool {
        let token = token.trim();
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|c| c.token.expose_secret() != token);
        guard.len() != before
    }

    /// Replaces the whole pool, keeping the given order.
    pub fn replace_all(&self, credentials: Vec<Credential>) {
        let fresh = Self::new();
        for credential in credentials {
            fresh.add(credential);
        }
        let deduped = fresh.list_all();
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = deduped;
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialPool for SharedCredentialPool {
    fn list_all(&self) -> Vec<Credential> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pick_one(&self) -> Option<Credential> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.choose(&mut rand::thread_rng()).cloned()
    }
}

/// Splits a `GEMINI_API_KEYS`-style value on commas, semicolons and newlines.
pub fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n', '\r'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}
