mod ids;
mod question;
mod result;
mod tag;

pub use ids::{ExamResultId, ParseIdError, QuestionId};
pub use question::{MIN_OPTIONS, Question, QuestionDraft, QuestionError};
pub use result::{AnswerSheet, ExamResult, ExamResultError, QuestionReview, round2};
pub use tag::{QuestionFilter, QuestionTags};
