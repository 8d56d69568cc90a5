use std::sync::Arc;

use crate::config::Config;
use crate::core::KeyedMutex;
use crate::db::{SqliteStore, Store, StoreResult};
use crate::services::{
    AnalysisProvider, MasteryTracker, ReviewScheduler, SubmissionPipeline, VectorFusionEngine,
};

/// Wires one store and one lock table into every service. Each state owns
/// its own lock table, so build one per process and share it.
#[derive(Clone)]
pub struct EngineState {
    store: Arc<dyn Store>,
    locks: Arc<KeyedMutex>,
    fusion: Arc<VectorFusionEngine>,
    mastery: Arc<MasteryTracker>,
    review: Arc<ReviewScheduler>,
}

impl EngineState {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        let locks = Arc::new(KeyedMutex::new());
        let fusion = Arc::new(VectorFusionEngine::new(Arc::clone(&store), Arc::clone(&locks)));
        let mastery = Arc::new(MasteryTracker::new(Arc::clone(&store), Arc::clone(&locks)));
        let review = Arc::new(ReviewScheduler::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            config.review.due_cards_limit,
        ));

        Self {
            store,
            locks,
            fusion,
            mastery,
            review,
        }
    }

    /// Opens the SQLite store described by `config.database`.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let store = SqliteStore::connect(&config.database).await?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    pub fn locks(&self) -> Arc<KeyedMutex> {
        Arc::clone(&self.locks)
    }

    pub fn fusion(&self) -> &VectorFusionEngine {
        &self.fusion
    }

    pub fn mastery(&self) -> &MasteryTracker {
        &self.mastery
    }

    pub fn review(&self) -> &ReviewScheduler {
        &self.review
    }

    pub fn submission_pipeline(&self, provider: Arc<dyn AnalysisProvider>) -> SubmissionPipeline {
        SubmissionPipeline::new(
            provider,
            Arc::clone(&self.fusion),
            Arc::clone(&self.mastery),
            Arc::clone(&self.review),
        )
    }
}
