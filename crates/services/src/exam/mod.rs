mod engine;
mod progress;
mod selection;
mod session;

pub use engine::ExamEngine;
pub use progress::ExamProgress;
pub use selection::{ExamBuilder, ExamPlan, candidate_pool, shuffle};
pub use session::ExamSession;
