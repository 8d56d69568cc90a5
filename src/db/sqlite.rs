use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::db::config::{DbConfig, SqliteJournalMode};
use crate::db::migrate::run_migrations;
use crate::db::operations::{capability, mastery, review};
use crate::db::{Store, StoreError, StoreResult};
use crate::types::{Assessment, CapabilityVector, ConceptMastery, ReviewCard};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DbConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let journal_mode = match config.journal_mode {
            SqliteJournalMode::Wal => sqlx::sqlite::SqliteJournalMode::Wal,
            SqliteJournalMode::Delete => sqlx::sqlite::SqliteJournalMode::Delete,
        };

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(journal_mode)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(config.foreign_keys);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        tracing::info!(path = %config.path.display(), "SQLite store opened");
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, applying any pending migrations.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn latest_vector(&self, learner_id: &str) -> StoreResult<Option<CapabilityVector>> {
        capability::get_latest_vector(&self.pool, learner_id).await
    }

    async fn vector_history(&self, learner_id: &str) -> StoreResult<Vec<CapabilityVector>> {
        capability::get_vector_history(&self.pool, learner_id).await
    }

    async fn first_vector_since(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<CapabilityVector>> {
        capability::get_first_vector_since(&self.pool, learner_id, since).await
    }

    async fn get_assessment(&self, assessment_id: &str) -> StoreResult<Option<Assessment>> {
        capability::get_assessment(&self.pool, assessment_id).await
    }

    async fn append_assessment(
        &self,
        assessment: &Assessment,
        vector: &CapabilityVector,
        expected_parent: Option<&str>,
    ) -> StoreResult<()> {
        capability::insert_assessment_with_vector(&self.pool, assessment, vector, expected_parent)
            .await
    }

    async fn get_mastery(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> StoreResult<Option<ConceptMastery>> {
        mastery::get_concept_mastery(&self.pool, learner_id, concept_id).await
    }

    async fn list_mastery(&self, learner_id: &str) -> StoreResult<Vec<ConceptMastery>> {
        mastery::list_concept_mastery(&self.pool, learner_id).await
    }

    async fn insert_mastery(&self, record: &ConceptMastery) -> StoreResult<()> {
        mastery::insert_concept_mastery(&self.pool, record).await
    }

    async fn update_mastery(
        &self,
        record: &ConceptMastery,
        expected_version: i64,
    ) -> StoreResult<()> {
        mastery::update_concept_mastery(&self.pool, record, expected_version).await
    }

    async fn get_card(&self, card_id: &str) -> StoreResult<Option<ReviewCard>> {
        review::get_review_card(&self.pool, card_id).await
    }

    async fn insert_card(&self, card: &ReviewCard) -> StoreResult<()> {
        review::insert_review_card(&self.pool, card).await
    }

    async fn update_card(&self, card: &ReviewCard, expected_version: i64) -> StoreResult<()> {
        review::update_review_card(&self.pool, card, expected_version).await
    }

    async fn list_cards(&self, learner_id: &str) -> StoreResult<Vec<ReviewCard>> {
        review::list_review_cards(&self.pool, learner_id).await
    }

    async fn due_cards(
        &self,
        learner_id: &str,
        on: NaiveDate,
        limit: i64,
    ) -> StoreResult<Vec<ReviewCard>> {
        review::list_due_review_cards(&self.pool, learner_id, on, limit).await
    }
}
