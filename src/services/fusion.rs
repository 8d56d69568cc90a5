use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{learner_key, KeyedMutex};
use crate::db::Store;
use crate::services::EngineResult;
use crate::types::{
    clamp_score, div_round, require_non_empty, Assessment, AssessmentDraft, Axis, AxisScores,
    CapabilityVector, RawEstimate, AXIS_COUNT,
};

const HISTORY_WEIGHT: i64 = 9;
const EVIDENCE_WEIGHT: i64 = 1;
const FUSION_SCALE: i64 = HISTORY_WEIGHT + EVIDENCE_WEIGHT;

/// Fuses a raw estimate against the previous snapshot. Without history the
/// result is the clamped estimate; otherwise each axis is
/// `round(0.9 * old + 0.1 * clamp(raw))`.
pub fn fuse_scores(previous: Option<&AxisScores>, raw: &RawEstimate) -> AxisScores {
    let evidence = raw.clamped();
    let Some(previous) = previous else {
        return evidence;
    };

    let mut fused = [0i64; AXIS_COUNT];
    for axis in Axis::ALL {
        let old = i64::from(previous.get(axis));
        let new = i64::from(evidence.get(axis));
        let value = div_round(old * HISTORY_WEIGHT + new * EVIDENCE_WEIGHT, FUSION_SCALE);
        fused[axis.index()] = i64::from(clamp_score(value));
    }
    RawEstimate::new(fused).clamped()
}

/// Latest snapshot compared against the first one recorded at or after a cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityProgress {
    pub start: CapabilityVector,
    pub latest: CapabilityVector,
    pub deltas: [i16; AXIS_COUNT],
}

impl CapabilityProgress {
    fn between(start: CapabilityVector, latest: CapabilityVector) -> Self {
        let mut deltas = [0i16; AXIS_COUNT];
        for axis in Axis::ALL {
            deltas[axis.index()] =
                i16::from(latest.scores.get(axis)) - i16::from(start.scores.get(axis));
        }
        Self {
            start,
            latest,
            deltas,
        }
    }

    pub fn delta(&self, axis: Axis) -> i16 {
        self.deltas[axis.index()]
    }
}

pub struct VectorFusionEngine {
    store: Arc<dyn Store>,
    locks: Arc<KeyedMutex>,
}

impl VectorFusionEngine {
    pub fn new(store: Arc<dyn Store>, locks: Arc<KeyedMutex>) -> Self {
        Self { store, locks }
    }

    /// Appends one assessment and its fused vector for `learner_id`.
    pub async fn fuse(
        &self,
        learner_id: &str,
        raw: &RawEstimate,
        draft: AssessmentDraft,
    ) -> EngineResult<CapabilityVector> {
        require_non_empty("learner_id", learner_id)?;

        let _guard = self.locks.lock(learner_key(learner_id)).await;

        let previous = self.store.latest_vector(learner_id).await?;
        let scores = fuse_scores(previous.as_ref().map(|v| &v.scores), raw);
        let now = Utc::now();

        let assessment = Assessment {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            assessment_type: draft.assessment_type,
            source_ref: draft.source_ref,
            notes: draft.notes,
            model_version: draft.model_version,
            reason_code: draft.reason_code,
            created_at: now,
        };
        let vector = CapabilityVector {
            id: Uuid::new_v4().to_string(),
            assessment_id: assessment.id.clone(),
            learner_id: learner_id.to_string(),
            created_at: now,
            scores,
        };

        let parent = previous.as_ref().map(|v| v.id.as_str());
        if let Err(err) = self
            .store
            .append_assessment(&assessment, &vector, parent)
            .await
        {
            if err.is_conflict() {
                tracing::warn!(learner_id, "capability vector append lost the parent check");
            }
            return Err(err.into());
        }

        tracing::debug!(
            learner_id,
            vector_id = %vector.id,
            assessment_type = assessment.assessment_type.as_str(),
            first = previous.is_none(),
            "capability vector fused"
        );
        Ok(vector)
    }

    pub async fn latest(&self, learner_id: &str) -> EngineResult<Option<CapabilityVector>> {
        Ok(self.store.latest_vector(learner_id).await?)
    }

    pub async fn history(&self, learner_id: &str) -> EngineResult<Vec<CapabilityVector>> {
        Ok(self.store.vector_history(learner_id).await?)
    }

    pub async fn progress_since(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
    ) -> EngineResult<Option<CapabilityProgress>> {
        let Some(start) = self.store.first_vector_since(learner_id, since).await? else {
            return Ok(None);
        };
        let Some(latest) = self.store.latest_vector(learner_id).await? else {
            return Ok(None);
        };
        Ok(Some(CapabilityProgress::between(start, latest)))
    }
}
