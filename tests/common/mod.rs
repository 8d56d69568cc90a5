#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use pacer_core::config::{Config, ReviewConfig};
use pacer_core::db::config::DbConfig;
use pacer_core::services::{AnalysisError, AnalysisOutcome, AnalysisProvider, CardPrompt};
use pacer_core::types::RawEstimate;
use pacer_core::{EngineState, MemoryStore, SqliteStore};

pub fn test_config(db: DbConfig) -> Config {
    Config {
        log_level: "debug".to_string(),
        database: db,
        review: ReviewConfig::default(),
    }
}

pub fn memory_state() -> EngineState {
    let config = test_config(DbConfig::at_path("unused.db"));
    EngineState::new(Arc::new(MemoryStore::new()), &config)
}

/// A SQLite-backed state in a throwaway directory. Keep the `TempDir` alive.
pub async fn sqlite_state() -> (EngineState, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(DbConfig::at_path(dir.path().join("nested").join("pacer.db")));
    let state = EngineState::connect(&config).await.expect("open engine state");
    (state, dir)
}

pub async fn sqlite_store() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = DbConfig::at_path(dir.path().join("pacer.db"));
    let store = SqliteStore::connect(&config).await.expect("open sqlite store");
    (store, dir)
}

/// Replays queued outcomes in order and records the inputs it saw.
#[derive(Default)]
pub struct ScriptedProvider {
    outcomes: Mutex<Vec<Result<AnalysisOutcome, AnalysisError>>>,
    pub seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<AnalysisOutcome, AnalysisError>>) -> Arc<Self> {
        let mut outcomes = outcomes;
        outcomes.reverse();
        Arc::new(Self {
            outcomes: Mutex::new(outcomes),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    async fn analyze(&self, learner_id: &str, input: &str) -> Result<AnalysisOutcome, AnalysisError> {
        self.seen
            .lock()
            .push((learner_id.to_string(), input.to_string()));
        self.outcomes
            .lock()
            .pop()
            .unwrap_or_else(|| Err(AnalysisError::Unavailable("script exhausted".to_string())))
    }
}

pub fn outcome(concept_id: &str, estimate: RawEstimate, card: Option<(&str, &str)>) -> AnalysisOutcome {
    AnalysisOutcome {
        concept_id: concept_id.to_string(),
        estimate,
        model_version: Some("analyzer-2026-01".to_string()),
        reason_code: Some("SOLVED".to_string()),
        card: card.map(|(question, answer)| CardPrompt {
            question: question.to_string(),
            answer: answer.to_string(),
        }),
    }
}
