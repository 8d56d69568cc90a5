mod common;

use chrono::{Duration, TimeZone, Utc};
use pacer_core::db::migrate::run_migrations;
use pacer_core::db::Store;
use pacer_core::services::new_card;
use pacer_core::types::{
    Assessment, AssessmentType, Axis, CapabilityVector, ConceptMastery, MasteryStatus, RawEstimate,
};

fn assessment(id: &str, learner: &str, at: chrono::DateTime<Utc>) -> Assessment {
    Assessment {
        id: id.to_string(),
        learner_id: learner.to_string(),
        assessment_type: AssessmentType::AiAnalysis,
        source_ref: Some("log-7".to_string()),
        notes: None,
        model_version: Some("analyzer-2026-01".to_string()),
        reason_code: Some("SOLVED".to_string()),
        created_at: at,
    }
}

fn vector(id: &str, assessment: &Assessment, raw: RawEstimate) -> CapabilityVector {
    CapabilityVector {
        id: id.to_string(),
        assessment_id: assessment.id.clone(),
        learner_id: assessment.learner_id.clone(),
        created_at: assessment.created_at,
        scores: raw.clamped(),
    }
}

#[tokio::test]
async fn test_migrations_create_schema_once() {
    let (store, _dir) = common::sqlite_store().await;

    let tables: Vec<String> = sqlx::query_scalar(
        r#"SELECT "name" FROM sqlite_master WHERE type = 'table' AND "name" NOT LIKE 'sqlite_%' ORDER BY "name""#,
    )
    .fetch_all(store.pool())
    .await
    .unwrap();
    assert_eq!(
        tables,
        vec![
            "_migrations",
            "assessments",
            "capability_vectors",
            "concept_mastery",
            "review_cards"
        ]
    );

    assert_eq!(run_migrations(store.pool()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_vector_round_trip_and_ordering() {
    let (store, _dir) = common::sqlite_store().await;
    let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();

    let a1 = assessment("a1", "learner-1", t0);
    let v1 = vector("v1", &a1, RawEstimate::uniform(40).with(Axis::RetrievalSpeed, 77));
    store.append_assessment(&a1, &v1, None).await.unwrap();

    // Same timestamp: insertion order decides which is latest.
    let a2 = assessment("a2", "learner-1", t0);
    let v2 = vector("v2", &a2, RawEstimate::uniform(41));
    store.append_assessment(&a2, &v2, Some("v1")).await.unwrap();

    let latest = store.latest_vector("learner-1").await.unwrap().unwrap();
    assert_eq!(latest, v2);

    let history = store.vector_history("learner-1").await.unwrap();
    assert_eq!(history, vec![v1.clone(), v2.clone()]);
    assert_eq!(history[0].scores.retrieval_speed(), 77);

    let since = store
        .first_vector_since("learner-1", t0 - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(since, Some(v1));

    assert_eq!(store.get_assessment("a1").await.unwrap(), Some(a1));
}

#[tokio::test]
async fn test_stale_parent_rolls_back_both_rows() {
    let (store, _dir) = common::sqlite_store().await;
    let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();

    let a1 = assessment("a1", "learner-1", t0);
    store
        .append_assessment(&a1, &vector("v1", &a1, RawEstimate::uniform(50)), None)
        .await
        .unwrap();

    let a2 = assessment("a2", "learner-1", t0 + Duration::seconds(5));
    let err = store
        .append_assessment(&a2, &vector("v2", &a2, RawEstimate::uniform(60)), None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    assert!(store.get_assessment("a2").await.unwrap().is_none());
    assert_eq!(store.vector_history("learner-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_mastery_version_check() {
    let (store, _dir) = common::sqlite_store().await;
    let now = Utc::now();
    let record = ConceptMastery {
        learner_id: "learner-1".to_string(),
        concept_id: "limits".to_string(),
        mastery_score: 40,
        status: MasteryStatus::InProgress,
        version: 1,
        created_at: now,
        last_updated: now,
    };
    store.insert_mastery(&record).await.unwrap();
    assert!(store.insert_mastery(&record).await.unwrap_err().is_conflict());

    let next = ConceptMastery {
        mastery_score: 47,
        version: 2,
        ..record.clone()
    };
    store.update_mastery(&next, 1).await.unwrap();
    assert!(store.update_mastery(&next, 1).await.unwrap_err().is_conflict());

    let stored = store.get_mastery("learner-1", "limits").await.unwrap().unwrap();
    assert_eq!(stored.mastery_score, 47);
    assert_eq!(stored.version, 2);
    assert_eq!(store.list_mastery("learner-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_card_persistence_and_due_query() {
    let (store, _dir) = common::sqlite_store().await;
    let created = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();
    let card = new_card("learner-1", "log-1", "q", "a", created);
    store.insert_card(&card).await.unwrap();

    assert_eq!(store.get_card(&card.id).await.unwrap(), Some(card.clone()));

    let on = card.next_review_date;
    assert_eq!(store.due_cards("learner-1", on, 10).await.unwrap().len(), 1);
    assert!(store
        .due_cards("learner-1", created.date_naive(), 10)
        .await
        .unwrap()
        .is_empty());

    let mut graded = card.clone();
    graded.repetitions = 1;
    graded.ease_factor = 2.6;
    graded.interval_days = 1;
    graded.version = 2;
    store.update_card(&graded, 1).await.unwrap();
    assert!(store.update_card(&graded, 1).await.unwrap_err().is_conflict());

    let stored = store.get_card(&card.id).await.unwrap().unwrap();
    assert_eq!(stored.repetitions, 1);
    assert!((stored.ease_factor - 2.6).abs() < 1e-9);
    assert_eq!(store.list_cards("learner-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_engine_over_sqlite() {
    let (state, _dir) = common::sqlite_state().await;
    let card = state
        .review()
        .create_card("learner-1", "log-1", "q", "a")
        .await
        .unwrap();
    let graded = state.review().grade(&card.id, 5).await.unwrap();
    assert_eq!(graded.interval_days, 1);
    assert_eq!(state.review().get_card(&card.id).await.unwrap().version, 2);
}
