//! Subject tags ("lectures") used to classify solved questions.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Advisory source of previously seen subject tags.
pub trait SubjectTagProvider: Send + Sync {
    fn known_tags(&self) -> BTreeSet<String>;
}

/// Tag set that grows as sessions finish. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SharedTags {
    inner: Arc<RwLock<BTreeSet<String>>>,
}

impl SharedTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::default();
        for tag in tags {
            set.insert(tag.as_ref());
        }
        set
    }

    /// Adds `tag` unless it is blank or already known under any casing.
    pub fn insert(&self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if guard.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
        guard.insert(tag.to_string())
    }
}

impl SubjectTagProvider for SharedTags {
    fn known_tags(&self) -> BTreeSet<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Adopts the spelling of a known tag that matches `lecture` case-insensitively.
pub fn canonicalize_lecture(lecture: &str, known: &BTreeSet<String>) -> String {
    let lecture = lecture.trim();
    known
        .iter()
        .find(|t| t.eq_ignore_ascii_case(lecture))
        .map_or_else(|| lecture.to_string(), Clone::clone)
}
