use std::sync::Arc;

use chrono::Utc;

use crate::core::{mastery_key, KeyedMutex};
use crate::db::Store;
use crate::services::{EngineError, EngineResult};
use crate::types::{
    clamp_score, div_round, require_non_empty, CapabilityVector, ConceptMastery, MasteryStatus,
};

const RETAINED_WEIGHT: i64 = 7;
const CANDIDATE_WEIGHT: i64 = 3;

/// Mean of the conceptual and procedural knowledge axes.
pub fn candidate_score(vector: &CapabilityVector) -> u8 {
    let conceptual = i64::from(vector.scores.conceptual_knowledge());
    let procedural = i64::from(vector.scores.procedural_knowledge());
    clamp_score(div_round(conceptual + procedural, 2))
}

/// `round(0.7 * existing + 0.3 * candidate)`.
pub fn blend_mastery(existing: u8, candidate: u8) -> u8 {
    let weighted = i64::from(existing) * RETAINED_WEIGHT + i64::from(candidate) * CANDIDATE_WEIGHT;
    clamp_score(div_round(weighted, RETAINED_WEIGHT + CANDIDATE_WEIGHT))
}

pub struct MasteryTracker {
    store: Arc<dyn Store>,
    locks: Arc<KeyedMutex>,
}

impl MasteryTracker {
    pub fn new(store: Arc<dyn Store>, locks: Arc<KeyedMutex>) -> Self {
        Self { store, locks }
    }

    /// Creates or blends the (learner, concept) record from a fused vector.
    /// The status always comes back as `IN_PROGRESS`.
    pub async fn update_mastery(
        &self,
        learner_id: &str,
        concept_id: &str,
        vector: &CapabilityVector,
    ) -> EngineResult<ConceptMastery> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("concept_id", concept_id)?;

        let _guard = self.locks.lock(mastery_key(learner_id, concept_id)).await;

        let candidate = candidate_score(vector);
        let now = Utc::now();

        let record = match self.store.get_mastery(learner_id, concept_id).await? {
            None => {
                let record = ConceptMastery {
                    learner_id: learner_id.to_string(),
                    concept_id: concept_id.to_string(),
                    mastery_score: candidate,
                    status: MasteryStatus::InProgress,
                    version: 1,
                    created_at: now,
                    last_updated: now,
                };
                self.store.insert_mastery(&record).await?;
                record
            }
            Some(existing) => {
                let expected_version = existing.version;
                let record = ConceptMastery {
                    mastery_score: blend_mastery(existing.mastery_score, candidate),
                    status: MasteryStatus::InProgress,
                    version: expected_version + 1,
                    last_updated: now,
                    ..existing
                };
                self.store.update_mastery(&record, expected_version).await?;
                record
            }
        };

        tracing::debug!(
            learner_id,
            concept_id,
            candidate,
            mastery_score = record.mastery_score,
            version = record.version,
            "concept mastery updated"
        );
        Ok(record)
    }

    pub async fn get(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> EngineResult<Option<ConceptMastery>> {
        Ok(self.store.get_mastery(learner_id, concept_id).await?)
    }

    pub async fn list_for_learner(&self, learner_id: &str) -> EngineResult<Vec<ConceptMastery>> {
        Ok(self.store.list_mastery(learner_id).await?)
    }

    /// Manual status override for coaches. The score is left as is.
    pub async fn set_status(
        &self,
        learner_id: &str,
        concept_id: &str,
        status: MasteryStatus,
    ) -> EngineResult<ConceptMastery> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("concept_id", concept_id)?;

        let _guard = self.locks.lock(mastery_key(learner_id, concept_id)).await;

        let existing = self
            .store
            .get_mastery(learner_id, concept_id)
            .await?
            .ok_or_else(|| {
                EngineError::not_found("concept_mastery", format!("{learner_id}/{concept_id}"))
            })?;

        let expected_version = existing.version;
        let record = ConceptMastery {
            status,
            version: expected_version + 1,
            last_updated: Utc::now(),
            ..existing
        };
        self.store.update_mastery(&record, expected_version).await?;

        tracing::info!(
            learner_id,
            concept_id,
            status = status.as_str(),
            "concept mastery status set"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Axis, RawEstimate};

    fn vector_with(conceptual: i64, procedural: i64) -> CapabilityVector {
        CapabilityVector {
            id: "v".into(),
            assessment_id: "a".into(),
            learner_id: "l".into(),
            created_at: Utc::now(),
            scores: RawEstimate::uniform(0)
                .with(Axis::ConceptualKnowledge, conceptual)
                .with(Axis::ProceduralKnowledge, procedural)
                .clamped(),
        }
    }

    #[test]
    fn test_candidate_is_mean_of_knowledge_axes() {
        assert_eq!(candidate_score(&vector_with(80, 60)), 70);
        assert_eq!(candidate_score(&vector_with(71, 70)), 71);
        assert_eq!(candidate_score(&vector_with(100, 100)), 100);
    }

    #[test]
    fn test_blend() {
        assert_eq!(blend_mastery(50, 60), 53);
        assert_eq!(blend_mastery(0, 100), 30);
        assert_eq!(blend_mastery(100, 100), 100);
        // 0.7 * 51 + 0.3 * 52 = 51.3
        assert_eq!(blend_mastery(51, 52), 51);
        // 0.7 * 55 + 0.3 * 50 = 53.5
        assert_eq!(blend_mastery(55, 50), 54);
    }
}
