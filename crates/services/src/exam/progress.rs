/// Position within a loaded exam, useful for UI.
///
/// `current` is 1-based; both fields are 0 when nothing is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExamProgress {
    pub current: usize,
    pub total: usize,
    pub answered: usize,
}

impl ExamProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}
