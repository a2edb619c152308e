use thiserror::Error;

use crate::model::{ExamResultError, QuestionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    ExamResult(#[from] ExamResultError),
}
