use serde::{Deserialize, Serialize};
use std::fmt;

/// Trim a categorical value and collapse blanks to `None`.
fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Categorical labels attached to a question, used for filtering.
///
/// Each field is optional; blank values are normalized to `None` so that
/// "missing" and "empty" mean the same thing everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty: Option<String>,
}

impl QuestionTags {
    #[must_use]
    pub fn new(
        subject: Option<String>,
        chapter: Option<String>,
        topic: Option<String>,
        difficulty: Option<String>,
    ) -> Self {
        Self {
            subject: normalize(subject),
            chapter: normalize(chapter),
            topic: normalize(topic),
            difficulty: normalize(difficulty),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = normalize(Some(subject.into()));
        self
    }

    #[must_use]
    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = normalize(Some(chapter.into()));
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = normalize(Some(topic.into()));
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = normalize(Some(difficulty.into()));
        self
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn chapter(&self) -> Option<&str> {
        self.chapter.as_deref()
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }
}

/// Equality constraints used to select questions from the bank.
///
/// Every field is independently optional. An absent (or blank) constraint
/// places no restriction on that tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty: Option<String>,
}

impl QuestionFilter {
    /// A filter that matches every question.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(
        subject: Option<String>,
        chapter: Option<String>,
        topic: Option<String>,
        difficulty: Option<String>,
    ) -> Self {
        Self {
            subject: normalize(subject),
            chapter: normalize(chapter),
            topic: normalize(topic),
            difficulty: normalize(difficulty),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = normalize(Some(subject.into()));
        self
    }

    #[must_use]
    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = normalize(Some(chapter.into()));
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = normalize(Some(topic.into()));
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = normalize(Some(difficulty.into()));
        self
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn chapter(&self) -> Option<&str> {
        self.chapter.as_deref()
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    /// Returns true when no constraint is set.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.subject.is_none()
            && self.chapter.is_none()
            && self.topic.is_none()
            && self.difficulty.is_none()
    }

    /// Returns true if every supplied constraint equals the matching tag.
    #[must_use]
    pub fn matches(&self, tags: &QuestionTags) -> bool {
        fn field_ok(wanted: Option<&str>, actual: Option<&str>) -> bool {
            match wanted {
                None => true,
                Some(w) => actual == Some(w),
            }
        }

        field_ok(self.subject(), tags.subject())
            && field_ok(self.chapter(), tags.chapter())
            && field_ok(self.topic(), tags.topic())
            && field_ok(self.difficulty(), tags.difficulty())
    }
}

impl fmt::Display for QuestionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            return f.write_str("any");
        }
        let parts = [
            ("subject", self.subject()),
            ("chapter", self.chapter()),
            ("topic", self.topic()),
            ("difficulty", self.difficulty()),
        ];
        let mut first = true;
        for (name, value) in parts {
            if let Some(value) = value {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{name}={value}")?;
                first = false;
            }
        }
        Ok(())
    }
}
