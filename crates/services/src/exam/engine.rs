use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::sync::Arc;

use exam_core::model::{ExamResult, ExamResultId, Question, QuestionFilter, QuestionId};
use storage::repository::{ExamHistoryRepository, QuestionRepository};

use super::progress::ExamProgress;
use super::selection::{ExamBuilder, ExamPlan, candidate_pool};
use super::session::ExamSession;
use crate::Clock;
use crate::attempts::AttemptTracker;
use crate::error::ExamError;

/// Passes over the bank before giving up: the first with the tracker as-is,
/// the second after resetting it.
const MAX_SELECTION_PASSES: usize = 2;

/// Drives one candidate's exams: selection, navigation, answers and scoring.
///
/// The engine owns its attempt tracker and the live session exclusively.
/// Async operations take `&mut self`, so a load or submit can never overlap
/// another engine call.
pub struct ExamEngine {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    history: Arc<dyn ExamHistoryRepository>,
    tracker: Box<dyn AttemptTracker>,
    rng: StdRng,
    session: Option<ExamSession>,
}

impl ExamEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        history: Arc<dyn ExamHistoryRepository>,
        tracker: Box<dyn AttemptTracker>,
    ) -> Self {
        Self {
            clock,
            questions,
            history,
            tracker,
            rng: StdRng::from_rng(&mut rand::rng()),
            session: None,
        }
    }

    /// Replace the random source, e.g. with a seeded one for tests.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&ExamSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn tracker(&self) -> &dyn AttemptTracker {
        self.tracker.as_ref()
    }

    /// Forget every question served so far in this session.
    pub fn reset_attempts(&mut self) {
        self.tracker.reset();
    }

    //
    // ─── LOADING ───────────────────────────────────────────────────────────────
    //

    /// Draw up to `total_questions` unseen questions matching `filter` and
    /// start a fresh exam over them.
    ///
    /// When every matching question was already served, the tracker is reset
    /// and the draw is repeated once. The previous session, submitted or not,
    /// is replaced.
    ///
    /// Returns the number of questions actually loaded, which may be fewer
    /// than requested.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::InvalidQuestionCount` for a zero count,
    /// `ExamError::NoMatch` if nothing in the bank satisfies the filter, and
    /// `ExamError::Storage` on repository failures.
    pub async fn load_questions(
        &mut self,
        filter: &QuestionFilter,
        total_questions: usize,
    ) -> Result<usize, ExamError> {
        if total_questions == 0 {
            return Err(ExamError::InvalidQuestionCount);
        }

        let plan = self.select(filter, total_questions).await?;
        let ids: Vec<QuestionId> = plan.questions.iter().map(|q| q.id().clone()).collect();
        self.tracker.mark_all(&ids);

        let loaded = plan.total();
        let session = ExamSession::new(plan.questions, self.clock.now())?;
        self.session = Some(session);

        tracing::info!(
            %filter,
            requested = total_questions,
            matched = plan.matched,
            pool = plan.pool,
            loaded,
            "exam loaded"
        );
        Ok(loaded)
    }

    async fn select(
        &mut self,
        filter: &QuestionFilter,
        total_questions: usize,
    ) -> Result<ExamPlan, ExamError> {
        for pass in 0..MAX_SELECTION_PASSES {
            let matched = self.questions.find_questions(filter).await?;
            if matched.is_empty() {
                return Err(ExamError::NoMatch {
                    filter: filter.clone(),
                });
            }

            let pool = candidate_pool(&matched, &self.tracker.attempted());
            if !pool.is_empty() {
                return Ok(ExamBuilder::new(&mut self.rng, total_questions).build(matched.len(), pool));
            }

            if pass + 1 < MAX_SELECTION_PASSES {
                tracing::info!(%filter, matched = matched.len(), "all matching questions attempted; recycling");
                self.tracker.reset();
            }
        }

        // The tracker still covers every match after its reset.
        Err(ExamError::NoMatch {
            filter: filter.clone(),
        })
    }

    //
    // ─── NAVIGATION & ANSWERS ──────────────────────────────────────────────────
    //

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.session.as_ref().and_then(ExamSession::current)
    }

    pub fn next(&mut self) -> Option<&Question> {
        self.session.as_mut().and_then(ExamSession::next)
    }

    pub fn previous(&mut self) -> Option<&Question> {
        self.session.as_mut().and_then(ExamSession::previous)
    }

    pub fn go_to(&mut self, index: usize) -> Option<&Question> {
        self.session.as_mut().and_then(|s| s.go_to(index))
    }

    /// Record the chosen option for a question. No-op before the first load.
    pub fn save_answer(&mut self, question_id: QuestionId, option_index: usize) {
        if let Some(session) = self.session.as_mut() {
            session.save_answer(question_id, option_index);
        }
    }

    #[must_use]
    pub fn answer(&self, question_id: &QuestionId) -> Option<usize> {
        self.session.as_ref().and_then(|s| s.answer(question_id))
    }

    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        self.session
            .as_ref()
            .map(ExamSession::progress)
            .unwrap_or_default()
    }

    /// Whole seconds since the current exam started; 0 when nothing is loaded.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |s| self.clock.seconds_since(s.started_at()))
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Score the loaded exam and append the result to history.
    ///
    /// Scoring happens once per session; a repeated submit returns the same
    /// result and only writes history if the earlier write did not succeed.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotLoaded` before the first load, and
    /// `ExamError::Persistence` if the history write fails. In that case the
    /// result is kept on the session and [`Self::finalize_result`] can retry.
    pub async fn submit_exam(&mut self) -> Result<ExamResult, ExamError> {
        let completed_at = self.clock.now();
        let session = self.session.as_mut().ok_or(ExamError::NotLoaded)?;
        let result = session.score(completed_at)?.clone();

        tracing::info!(
            total = result.total_questions(),
            correct = result.correct_count(),
            percentage = result.percentage(),
            elapsed_seconds = result.elapsed_seconds(),
            "exam submitted"
        );

        self.persist_result().await?;
        Ok(result)
    }

    /// Retry the history write for an already-scored exam.
    ///
    /// Returns the existing id without writing when the result was already
    /// saved.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotLoaded` with no session,
    /// `ExamError::NotSubmitted` if the exam was not scored yet, and
    /// `ExamError::Persistence` if the write fails again.
    pub async fn finalize_result(&mut self) -> Result<ExamResultId, ExamError> {
        let session = self.session.as_ref().ok_or(ExamError::NotLoaded)?;
        if !session.is_submitted() {
            return Err(ExamError::NotSubmitted);
        }
        self.persist_result().await
    }

    async fn persist_result(&mut self) -> Result<ExamResultId, ExamError> {
        let session = self.session.as_mut().ok_or(ExamError::NotLoaded)?;
        if let Some(id) = session.result_id() {
            return Ok(id);
        }
        let result = session.result().ok_or(ExamError::NotSubmitted)?;

        match self.history.append_result(result).await {
            Ok(id) => {
                session.set_result_id(id);
                tracing::debug!(result_id = id, "exam result saved");
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to save exam result");
                Err(ExamError::Persistence(err))
            }
        }
    }
}

impl fmt::Debug for ExamEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamEngine")
            .field("clock", &self.clock)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use exam_core::model::{QuestionDraft, QuestionTags};
    use exam_core::time::{fixed_clock, fixed_now};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use storage::repository::{ExamResultRow, InMemoryRepository, StorageError};

    use crate::attempts::InMemoryAttemptTracker;

    fn build_question(id: &str, subject: &str) -> Question {
        QuestionDraft::new(
            id,
            format!("Prompt {id}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            2,
        )
        .with_tags(QuestionTags::default().with_subject(subject))
        .validate(fixed_now())
        .unwrap()
    }

    async fn seeded_repo() -> Arc<InMemoryRepository> {
        let repo = Arc::new(InMemoryRepository::new());
        let mut batch: Vec<Question> = (1..=5)
            .map(|i| build_question(&format!("m{i}"), "math"))
            .collect();
        batch.push(build_question("s1", "science"));
        batch.push(build_question("s2", "science"));
        repo.insert_questions(&batch).await.unwrap();
        repo
    }

    fn engine_over(repo: &Arc<InMemoryRepository>, clock: Clock) -> ExamEngine {
        ExamEngine::new(
            clock,
            repo.clone(),
            repo.clone(),
            Box::new(InMemoryAttemptTracker::new()),
        )
        .with_rng(StdRng::seed_from_u64(11))
    }

    fn math() -> QuestionFilter {
        QuestionFilter::any().with_subject("math")
    }

    fn loaded_ids(engine: &ExamEngine) -> Vec<QuestionId> {
        engine
            .session()
            .unwrap()
            .questions()
            .iter()
            .map(|q| q.id().clone())
            .collect()
    }

    #[tokio::test]
    async fn load_takes_min_of_request_and_pool() {
        let repo = seeded_repo().await;
        let mut engine = engine_over(&repo, fixed_clock());

        assert_eq!(engine.load_questions(&math(), 3).await.unwrap(), 3);
        let ids = loaded_ids(&engine);
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(unique.len(), 3);
        assert!(ids.iter().all(|id| id.as_str().starts_with('m')));

        let progress = engine.progress();
        assert_eq!((progress.current, progress.total, progress.answered), (1, 3, 0));
    }

    #[tokio::test]
    async fn loads_do_not_repeat_until_pool_is_exhausted() {
        let repo = seeded_repo().await;
        let mut engine = engine_over(&repo, fixed_clock());

        assert_eq!(engine.load_questions(&math(), 3).await.unwrap(), 3);
        let first: HashSet<_> = loaded_ids(&engine).into_iter().collect();

        assert_eq!(engine.load_questions(&math(), 3).await.unwrap(), 2);
        let second: HashSet<_> = loaded_ids(&engine).into_iter().collect();
        assert!(first.is_disjoint(&second));
        assert_eq!(engine.tracker().attempted().len(), 5);

        // Exhausted: the tracker resets and the draw succeeds again.
        assert_eq!(engine.load_questions(&math(), 10).await.unwrap(), 5);
        assert_eq!(engine.tracker().attempted().len(), 5);
    }

    #[tokio::test]
    async fn no_match_and_zero_count_are_rejected() {
        let repo = seeded_repo().await;
        let mut engine = engine_over(&repo, fixed_clock());

        let filter = QuestionFilter::any().with_subject("history");
        let err = engine.load_questions(&filter, 5).await.unwrap_err();
        assert!(matches!(err, ExamError::NoMatch { filter: f } if f == filter));

        let err = engine.load_questions(&math(), 0).await.unwrap_err();
        assert!(matches!(err, ExamError::InvalidQuestionCount));
        assert!(engine.session().is_none());
        assert!(engine.tracker().attempted().is_empty());
    }

    #[tokio::test]
    async fn unloaded_engine_is_inert() {
        let repo = seeded_repo().await;
        let mut engine = engine_over(&repo, fixed_clock());

        assert!(engine.current().is_none());
        assert!(engine.next().is_none());
        assert!(engine.previous().is_none());
        assert!(engine.go_to(0).is_none());
        engine.save_answer(QuestionId::new("m1"), 1);
        assert_eq!(engine.answer(&QuestionId::new("m1")), None);
        assert_eq!(engine.progress(), ExamProgress::default());
        assert_eq!(engine.elapsed_seconds(), 0);

        assert!(matches!(engine.submit_exam().await, Err(ExamError::NotLoaded)));
        assert!(matches!(engine.finalize_result().await, Err(ExamError::NotLoaded)));
    }

    #[tokio::test]
    async fn end_to_end_math_exam_scores_sixty_percent() {
        let repo = seeded_repo().await;
        let clock = Clock::fixed(fixed_now());
        let mut engine = engine_over(&repo, clock.clone());

        assert_eq!(engine.load_questions(&math(), 10).await.unwrap(), 5);
        let ids = loaded_ids(&engine);
        for (i, id) in ids.iter().enumerate() {
            let choice = if i < 3 { 2 } else { 0 };
            engine.save_answer(id.clone(), choice);
        }
        assert_eq!(engine.progress().answered, 5);

        clock.advance(Duration::milliseconds(95_900));
        assert_eq!(engine.elapsed_seconds(), 95);

        let result = engine.submit_exam().await.unwrap();
        assert_eq!(result.total_questions(), 5);
        assert_eq!(result.correct_count(), 3);
        assert_eq!(result.wrong_count(), 2);
        assert!((result.percentage() - 60.0).abs() < f64::EPSILON);
        assert_eq!(result.elapsed_seconds(), 95);

        let session = engine.session().unwrap();
        assert!(session.is_submitted());
        let id = session.result_id().unwrap();
        assert_eq!(repo.get_result(id).await.unwrap(), result);

        // Submitting again neither re-scores nor writes a second row.
        let again = engine.submit_exam().await.unwrap();
        assert_eq!(again, result);
        assert_eq!(repo.list_results(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn navigation_through_engine_clamps() {
        let repo = seeded_repo().await;
        let mut engine = engine_over(&repo, fixed_clock());
        engine.load_questions(&math(), 3).await.unwrap();
        let ids = loaded_ids(&engine);

        assert_eq!(engine.previous().unwrap().id(), &ids[0]);
        assert_eq!(engine.next().unwrap().id(), &ids[1]);
        assert_eq!(engine.go_to(7).unwrap().id(), &ids[1]);
        assert_eq!(engine.go_to(2).unwrap().id(), &ids[2]);
        assert_eq!(engine.next().unwrap().id(), &ids[2]);
        assert_eq!(engine.progress().current, 3);
    }

    #[tokio::test]
    async fn reload_replaces_session_and_clears_answers() {
        let repo = seeded_repo().await;
        let mut engine = engine_over(&repo, fixed_clock());
        engine.load_questions(&math(), 2).await.unwrap();
        let first = loaded_ids(&engine);
        engine.save_answer(first[0].clone(), 2);
        engine.next();

        engine.load_questions(&QuestionFilter::any(), 2).await.unwrap();
        assert_eq!(engine.progress().current, 1);
        assert_eq!(engine.progress().answered, 0);
        assert_eq!(engine.answer(&first[0]), None);
    }

    #[tokio::test]
    async fn seeded_rng_makes_selection_deterministic() {
        let repo = seeded_repo().await;
        let mut a = engine_over(&repo, fixed_clock());
        let mut b = engine_over(&repo, fixed_clock());

        a.load_questions(&QuestionFilter::any(), 4).await.unwrap();
        b.load_questions(&QuestionFilter::any(), 4).await.unwrap();
        assert_eq!(loaded_ids(&a), loaded_ids(&b));
    }

    //
    // ─── PERSISTENCE FAILURE ───────────────────────────────────────────────────
    //

    /// History repository that fails while `failing` is set.
    struct FlakyHistory {
        inner: InMemoryRepository,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ExamHistoryRepository for FlakyHistory {
        async fn append_result(&self, result: &ExamResult) -> Result<ExamResultId, StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("disk unavailable".into()));
            }
            self.inner.append_result(result).await
        }

        async fn get_result(&self, id: ExamResultId) -> Result<ExamResult, StorageError> {
            self.inner.get_result(id).await
        }

        async fn list_results(&self, limit: u32) -> Result<Vec<ExamResultRow>, StorageError> {
            self.inner.list_results(limit).await
        }

        async fn clear_history(&self) -> Result<u64, StorageError> {
            self.inner.clear_history().await
        }
    }

    #[tokio::test]
    async fn persistence_failure_keeps_result_and_finalize_retries() {
        let repo = seeded_repo().await;
        let history = Arc::new(FlakyHistory {
            inner: InMemoryRepository::new(),
            failing: AtomicBool::new(true),
        });
        let mut engine = ExamEngine::new(
            fixed_clock(),
            repo.clone(),
            history.clone(),
            Box::new(InMemoryAttemptTracker::new()),
        )
        .with_rng(StdRng::seed_from_u64(3));

        engine.load_questions(&math(), 2).await.unwrap();
        assert!(matches!(engine.finalize_result().await, Err(ExamError::NotSubmitted)));

        let err = engine.submit_exam().await.unwrap_err();
        assert!(matches!(err, ExamError::Persistence(StorageError::Connection(_))));

        let session = engine.session().unwrap();
        assert!(session.is_submitted());
        assert!(session.result_id().is_none());
        let scored = session.result().unwrap().clone();
        assert_eq!(scored.wrong_count(), 2);

        history.failing.store(false, Ordering::SeqCst);
        let id = engine.finalize_result().await.unwrap();
        assert_eq!(history.get_result(id).await.unwrap(), scored);

        // Already saved: no second row.
        assert_eq!(engine.finalize_result().await.unwrap(), id);
        assert_eq!(history.list_results(10).await.unwrap().len(), 1);
    }

    /// Serves `inner` for a fixed number of lookups, then matches nothing.
    struct VanishingBank {
        inner: InMemoryRepository,
        lookups_left: AtomicUsize,
    }

    #[async_trait]
    impl QuestionRepository for VanishingBank {
        async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
            self.inner.upsert_question(question).await
        }

        async fn insert_questions(&self, questions: &[Question]) -> Result<u64, StorageError> {
            self.inner.insert_questions(questions).await
        }

        async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
            self.inner.get_question(id).await
        }

        async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError> {
            self.inner.delete_question(id).await
        }

        async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
            self.inner.list_questions().await
        }

        async fn find_questions(
            &self,
            filter: &QuestionFilter,
        ) -> Result<Vec<Question>, StorageError> {
            let left = self.lookups_left.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(Vec::new());
            }
            self.lookups_left.store(left - 1, Ordering::SeqCst);
            self.inner.find_questions(filter).await
        }
    }

    #[tokio::test]
    async fn bank_emptied_between_passes_is_no_match() {
        let inner = InMemoryRepository::new();
        inner
            .insert_questions(&[build_question("m1", "math"), build_question("m2", "math")])
            .await
            .unwrap();
        // One lookup for the first exam, one for the exhausted first pass.
        let bank = Arc::new(VanishingBank {
            inner,
            lookups_left: AtomicUsize::new(2),
        });
        let mut engine = ExamEngine::new(
            fixed_clock(),
            bank,
            Arc::new(InMemoryRepository::new()),
            Box::new(InMemoryAttemptTracker::new()),
        );

        assert_eq!(engine.load_questions(&math(), 5).await.unwrap(), 2);
        let err = engine.load_questions(&math(), 5).await.unwrap_err();
        assert!(matches!(err, ExamError::NoMatch { .. }));
        assert!(engine.tracker().attempted().is_empty());
    }

    /// Ignores resets, so the pool stays exhausted on every pass.
    struct StickyTracker(InMemoryAttemptTracker);

    impl AttemptTracker for StickyTracker {
        fn attempted(&self) -> HashSet<QuestionId> {
            self.0.attempted()
        }

        fn mark_attempted(&mut self, id: &QuestionId) {
            self.0.mark_attempted(id);
        }

        fn reset(&mut self) {}
    }

    #[tokio::test]
    async fn pool_still_empty_after_reset_is_no_match() {
        let repo = seeded_repo().await;
        let mut engine = ExamEngine::new(
            fixed_clock(),
            repo.clone(),
            repo.clone(),
            Box::new(StickyTracker(InMemoryAttemptTracker::new())),
        );

        assert_eq!(engine.load_questions(&math(), 10).await.unwrap(), 5);
        let err = engine.load_questions(&math(), 10).await.unwrap_err();
        assert!(matches!(err, ExamError::NoMatch { .. }));
        assert_eq!(engine.tracker().attempted().len(), 5);
    }
}
