mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use pacer_core::services::VectorFusionEngine;
use pacer_core::types::{AssessmentDraft, AssessmentType, Axis, RawEstimate};
use pacer_core::ErrorKind;

fn manual() -> AssessmentDraft {
    AssessmentDraft::new(AssessmentType::Manual)
}

#[tokio::test]
async fn test_first_fusion_stores_clamped_estimate() {
    let state = common::memory_state();
    let raw = RawEstimate::uniform(65).with(Axis::CalculationAccuracy, 150);

    let vector = state.fusion().fuse("learner-1", &raw, manual()).await.unwrap();
    assert_eq!(vector.scores.calculation_accuracy(), 100);
    assert_eq!(vector.scores.geometric_reasoning(), 65);

    let latest = state.fusion().latest("learner-1").await.unwrap().unwrap();
    assert_eq!(latest, vector);

    let assessment = state
        .store()
        .get_assessment(&vector.assessment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assessment.assessment_type, AssessmentType::Manual);
    assert_eq!(assessment.learner_id, "learner-1");
}

#[tokio::test]
async fn test_second_fusion_blends_against_latest() {
    let state = common::memory_state();
    state
        .fusion()
        .fuse("learner-1", &RawEstimate::uniform(50), manual())
        .await
        .unwrap();
    let fused = state
        .fusion()
        .fuse("learner-1", &RawEstimate::uniform(100), manual())
        .await
        .unwrap();

    assert!(fused.scores.iter().all(|(_, v)| v == 55));

    let history = state.fusion().history("learner-1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_ne!(history[0].assessment_id, history[1].assessment_id);
    assert_eq!(history[1].id, fused.id);
}

#[tokio::test]
async fn test_learners_do_not_share_history() {
    let state = common::memory_state();
    state
        .fusion()
        .fuse("learner-a", &RawEstimate::uniform(10), manual())
        .await
        .unwrap();
    let fused = state
        .fusion()
        .fuse("learner-b", &RawEstimate::uniform(90), manual())
        .await
        .unwrap();

    assert_eq!(fused.scores.optimization(), 90);
    assert_eq!(state.fusion().history("learner-a").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_learner_is_rejected() {
    let state = common::memory_state();
    let err = state
        .fusion()
        .fuse("  ", &RawEstimate::uniform(50), manual())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_concurrent_fusions_for_one_learner_form_a_chain() {
    let state = common::memory_state();
    let engine: Arc<VectorFusionEngine> = Arc::new(VectorFusionEngine::new(state.store(), state.locks()));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .fuse("learner-1", &RawEstimate::uniform(i * 10), manual())
                    .await
            })
        })
        .collect();

    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }

    let history = state.fusion().history("learner-1").await.unwrap();
    assert_eq!(history.len(), 8);
}

#[tokio::test]
async fn test_progress_since_reports_deltas() {
    let state = common::memory_state();
    let before = Utc::now() - Duration::seconds(1);

    state
        .fusion()
        .fuse("learner-1", &RawEstimate::uniform(40), manual())
        .await
        .unwrap();
    state
        .fusion()
        .fuse(
            "learner-1",
            &RawEstimate::uniform(40).with(Axis::SelfDiagnosis, 100),
            manual(),
        )
        .await
        .unwrap();

    let progress = state
        .fusion()
        .progress_since("learner-1", before)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progress.delta(Axis::SelfDiagnosis), 6);
    assert_eq!(progress.delta(Axis::Optimization), 0);

    let future = Utc::now() + Duration::days(1);
    assert!(state
        .fusion()
        .progress_since("learner-1", future)
        .await
        .unwrap()
        .is_none());
    assert!(state
        .fusion()
        .progress_since("nobody", before)
        .await
        .unwrap()
        .is_none());
}
