use std::sync::Arc;

use storage::repository::{ExamHistoryRepository, Storage};
use storage::session_store::{InMemorySessionStore, SessionStore};

use crate::Clock;
use crate::attempts::SessionAttemptTracker;
use crate::bank_service::QuestionBankService;
use crate::error::AppServicesError;
use crate::exam::ExamEngine;
use crate::history_service::HistoryService;

/// Assembles app-facing services over one `Storage` and one session store.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    session_store: Arc<dyn SessionStore>,
    question_bank: Arc<QuestionBankService>,
    history: Arc<HistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let question_bank = Arc::new(QuestionBankService::new(
            clock.clone(),
            Arc::clone(&storage.questions),
        ));
        let history = Arc::new(HistoryService::new(Arc::clone(&storage.history)));
        Self {
            clock,
            storage,
            session_store: Arc::new(InMemorySessionStore::new()),
            question_bank,
            history,
        }
    }

    /// Use a different session store for attempt tracking.
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = store;
        self
    }

    /// A fresh engine for one candidate.
    ///
    /// Engines built from the same `AppServices` share the session store, so
    /// questions served by one are not re-served by the next.
    #[must_use]
    pub fn exam_engine(&self) -> ExamEngine {
        ExamEngine::new(
            self.clock.clone(),
            Arc::clone(&self.storage.questions),
            Arc::clone(&self.storage.history),
            Box::new(SessionAttemptTracker::new(Arc::clone(&self.session_store))),
        )
    }

    #[must_use]
    pub fn question_bank(&self) -> Arc<QuestionBankService> {
        Arc::clone(&self.question_bank)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn history_repository(&self) -> Arc<dyn ExamHistoryRepository> {
        Arc::clone(&self.storage.history)
    }
}
