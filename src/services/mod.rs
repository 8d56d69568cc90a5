pub mod analysis;
pub mod fusion;
pub mod mastery;
pub mod review;

use thiserror::Error;

use crate::db::StoreError;
use crate::types::ValidationError;

pub use analysis::{
    AnalysisError, AnalysisOutcome, AnalysisProvider, CardPrompt, SubmissionOutcome,
    SubmissionPipeline,
};
pub use fusion::{fuse_scores, CapabilityProgress, VectorFusionEngine};
pub use mastery::{blend_mastery, candidate_score, MasteryTracker};
pub use review::{apply_grade, new_card, ReviewScheduler, MAX_INTERVAL_DAYS};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StoreFailure,
    Analysis,
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Store(_) => ErrorKind::StoreFailure,
            EngineError::Analysis(_) => ErrorKind::Analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: EngineError = ValidationError::GradeOutOfRange(6).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(EngineError::not_found("review_card", "c1").kind(), ErrorKind::NotFound);
        let err: EngineError = StoreError::conflict("review_card", "c1").into();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert_eq!(
            EngineError::not_found("review_card", "c1").to_string(),
            "review_card `c1` not found"
        );
    }
}
