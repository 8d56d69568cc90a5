use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::fusion::VectorFusionEngine;
use crate::services::mastery::MasteryTracker;
use crate::services::review::ReviewScheduler;
use crate::services::EngineResult;
use crate::types::{
    require_non_empty, AssessmentDraft, AssessmentType, CapabilityVector, ConceptMastery,
    RawEstimate, ReviewCard,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis provider unavailable: {0}")]
    Unavailable(String),
    #[error("analysis provider returned an unusable result: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPrompt {
    pub question: String,
    pub answer: String,
}

/// What the provider extracted from one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub concept_id: String,
    pub estimate: RawEstimate,
    pub model_version: Option<String>,
    pub reason_code: Option<String>,
    pub card: Option<CardPrompt>,
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, learner_id: &str, input: &str) -> Result<AnalysisOutcome, AnalysisError>;
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub vector: CapabilityVector,
    pub mastery: ConceptMastery,
    pub card: Option<ReviewCard>,
}

/// Runs one submission through analysis, fusion, mastery and card creation.
/// Steps commit individually; the first failure stops the rest.
pub struct SubmissionPipeline {
    provider: Arc<dyn AnalysisProvider>,
    fusion: Arc<VectorFusionEngine>,
    mastery: Arc<MasteryTracker>,
    review: Arc<ReviewScheduler>,
}

impl SubmissionPipeline {
    pub fn new(
        provider: Arc<dyn AnalysisProvider>,
        fusion: Arc<VectorFusionEngine>,
        mastery: Arc<MasteryTracker>,
        review: Arc<ReviewScheduler>,
    ) -> Self {
        Self {
            provider,
            fusion,
            mastery,
            review,
        }
    }

    pub async fn process(
        &self,
        learner_id: &str,
        source_ref: &str,
        input: &str,
    ) -> EngineResult<SubmissionOutcome> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("source_ref", source_ref)?;

        let outcome = self.provider.analyze(learner_id, input).await?;
        if outcome.concept_id.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse("empty concept id".to_string()).into());
        }

        let draft = AssessmentDraft {
            assessment_type: AssessmentType::AiAnalysis,
            source_ref: Some(source_ref.to_string()),
            notes: None,
            model_version: outcome.model_version,
            reason_code: outcome.reason_code,
        };
        let vector = self.fusion.fuse(learner_id, &outcome.estimate, draft).await?;

        let mastery = self
            .mastery
            .update_mastery(learner_id, &outcome.concept_id, &vector)
            .await?;

        let card = match outcome.card {
            Some(prompt) => Some(
                self.review
                    .create_card(learner_id, source_ref, &prompt.question, &prompt.answer)
                    .await?,
            ),
            None => None,
        };

        tracing::debug!(
            learner_id,
            source_ref,
            concept_id = %outcome.concept_id,
            card_created = card.is_some(),
            "submission processed"
        );
        Ok(SubmissionOutcome {
            vector,
            mastery,
            card,
        })
    }
}
