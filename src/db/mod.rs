pub mod config;
pub mod memory;
pub mod migrate;
pub mod operations;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::db::migrate::MigrationError;
use crate::types::{Assessment, CapabilityVector, ConceptMastery, ReviewCard};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("concurrent write conflict on {entity} `{key}`")]
    Conflict { entity: &'static str, key: String },
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error("failed to prepare database location: {0}")]
    Io(String),
}

impl StoreError {
    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            key: key.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Durable keyed storage for every entity the engine owns.
///
/// Implementations must make `append_assessment` atomic and must enforce the
/// optimistic checks (`expected_parent`, `expected_version`) inside the same
/// write that applies the change.
#[async_trait]
pub trait Store: Send + Sync {
    async fn latest_vector(&self, learner_id: &str) -> StoreResult<Option<CapabilityVector>>;

    /// Chronological, oldest first.
    async fn vector_history(&self, learner_id: &str) -> StoreResult<Vec<CapabilityVector>>;

    async fn first_vector_since(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<CapabilityVector>>;

    async fn get_assessment(&self, assessment_id: &str) -> StoreResult<Option<Assessment>>;

    /// Appends one assessment and its vector. Fails with `Conflict` when the
    /// learner's latest vector id is no longer `expected_parent`.
    async fn append_assessment(
        &self,
        assessment: &Assessment,
        vector: &CapabilityVector,
        expected_parent: Option<&str>,
    ) -> StoreResult<()>;

    async fn get_mastery(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> StoreResult<Option<ConceptMastery>>;

    async fn list_mastery(&self, learner_id: &str) -> StoreResult<Vec<ConceptMastery>>;

    async fn insert_mastery(&self, record: &ConceptMastery) -> StoreResult<()>;

    async fn update_mastery(&self, record: &ConceptMastery, expected_version: i64)
        -> StoreResult<()>;

    async fn get_card(&self, card_id: &str) -> StoreResult<Option<ReviewCard>>;

    async fn insert_card(&self, card: &ReviewCard) -> StoreResult<()>;

    async fn update_card(&self, card: &ReviewCard, expected_version: i64) -> StoreResult<()>;

    async fn list_cards(&self, learner_id: &str) -> StoreResult<Vec<ReviewCard>>;

    /// Cards whose next review date is on or before `on`, earliest first.
    async fn due_cards(
        &self,
        learner_id: &str,
        on: NaiveDate,
        limit: i64,
    ) -> StoreResult<Vec<ReviewCard>>;
}
