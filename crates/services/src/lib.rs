#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempts;
pub mod bank_service;
pub mod error;
pub mod exam;
pub mod history_service;
pub mod timer;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use attempts::{ATTEMPTED_KEY, AttemptTracker, InMemoryAttemptTracker, SessionAttemptTracker};
pub use bank_service::{BankSnapshot, QuestionBankService, RestoreSummary};
pub use error::{AppServicesError, ExamError, HistoryError, QuestionBankError};
pub use exam::{ExamEngine, ExamProgress, ExamSession};
pub use history_service::{HistoryListItem, HistoryService};
pub use timer::ExamTimer;
