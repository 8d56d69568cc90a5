use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::core::{card_key, KeyedMutex};
use crate::db::Store;
use crate::services::{EngineError, EngineResult};
use crate::types::{
    add_days, require_non_empty, Grade, ReviewCard, DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR,
};

/// Upper bound on a scheduled interval, in days.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

const FIRST_INTERVAL_DAYS: u32 = 1;
const SECOND_INTERVAL_DAYS: u32 = 6;

/// Builds a card that becomes due the day after it is created.
pub fn new_card(
    learner_id: &str,
    source_ref: &str,
    question: &str,
    answer: &str,
    created_at: DateTime<Utc>,
) -> ReviewCard {
    ReviewCard {
        id: Uuid::new_v4().to_string(),
        learner_id: learner_id.to_string(),
        source_ref: source_ref.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        repetitions: 0,
        ease_factor: DEFAULT_EASE_FACTOR,
        interval_days: 0,
        next_review_date: add_days(created_at.date_naive(), 1),
        version: 1,
        created_at,
        updated_at: created_at,
    }
}

fn next_ease(ease_factor: f64, grade: Grade) -> f64 {
    let q = f64::from(5 - grade.value());
    (ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR)
}

/// SM-2 transition. Successful recall grows the interval; failed recall
/// restarts it at one day and keeps the ease factor. The next review date
/// never precedes the card's creation date.
pub fn apply_grade(card: &ReviewCard, grade: Grade, today: NaiveDate) -> ReviewCard {
    let mut next = card.clone();

    if grade.is_successful_recall() {
        next.repetitions = card.repetitions.saturating_add(1);
        next.ease_factor = next_ease(card.ease_factor, grade);
        let interval = match next.repetitions {
            1 => FIRST_INTERVAL_DAYS,
            2 => SECOND_INTERVAL_DAYS,
            _ => {
                let scaled = (f64::from(card.interval_days) * next.ease_factor).round();
                scaled.min(f64::from(MAX_INTERVAL_DAYS)) as u32
            }
        };
        next.interval_days = interval.clamp(1, MAX_INTERVAL_DAYS);
    } else {
        next.repetitions = 0;
        next.interval_days = FIRST_INTERVAL_DAYS;
    }

    next.next_review_date = add_days(today, next.interval_days).max(card.created_at.date_naive());
    next.version = card.version + 1;
    next
}

pub struct ReviewScheduler {
    store: Arc<dyn Store>,
    locks: Arc<KeyedMutex>,
    due_cards_limit: i64,
}

impl ReviewScheduler {
    pub fn new(store: Arc<dyn Store>, locks: Arc<KeyedMutex>, due_cards_limit: i64) -> Self {
        Self {
            store,
            locks,
            due_cards_limit,
        }
    }

    pub async fn create_card(
        &self,
        learner_id: &str,
        source_ref: &str,
        question: &str,
        answer: &str,
    ) -> EngineResult<ReviewCard> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("source_ref", source_ref)?;
        require_non_empty("question", question)?;
        require_non_empty("answer", answer)?;

        let card = new_card(learner_id, source_ref, question, answer, Utc::now());
        self.store.insert_card(&card).await?;

        tracing::debug!(
            learner_id,
            card_id = %card.id,
            next_review_date = %card.next_review_date,
            "review card created"
        );
        Ok(card)
    }

    /// Grades a card against today's date.
    pub async fn grade(&self, card_id: &str, grade: i64) -> EngineResult<ReviewCard> {
        self.grade_on(card_id, grade, Utc::now().date_naive()).await
    }

    pub async fn grade_on(
        &self,
        card_id: &str,
        grade: i64,
        today: NaiveDate,
    ) -> EngineResult<ReviewCard> {
        let grade = Grade::new(grade)?;

        let _guard = self.locks.lock(card_key(card_id)).await;

        let card = self
            .store
            .get_card(card_id)
            .await?
            .ok_or_else(|| EngineError::not_found("review_card", card_id))?;

        let mut updated = apply_grade(&card, grade, today);
        updated.updated_at = Utc::now();

        if let Err(err) = self.store.update_card(&updated, card.version).await {
            if err.is_conflict() {
                tracing::warn!(card_id, "review card changed during grading");
            }
            return Err(err.into());
        }

        tracing::debug!(
            card_id,
            grade = grade.value(),
            repetitions = updated.repetitions,
            ease_factor = updated.ease_factor,
            interval_days = updated.interval_days,
            "review card graded"
        );
        Ok(updated)
    }

    pub async fn get_card(&self, card_id: &str) -> EngineResult<ReviewCard> {
        self.store
            .get_card(card_id)
            .await?
            .ok_or_else(|| EngineError::not_found("review_card", card_id))
    }

    pub async fn list_cards(&self, learner_id: &str) -> EngineResult<Vec<ReviewCard>> {
        Ok(self.store.list_cards(learner_id).await?)
    }

    /// Cards due today or earlier, up to the configured page size.
    pub async fn due_cards(&self, learner_id: &str) -> EngineResult<Vec<ReviewCard>> {
        self.due_cards_on(learner_id, Utc::now().date_naive()).await
    }

    pub async fn due_cards_on(
        &self,
        learner_id: &str,
        on: NaiveDate,
    ) -> EngineResult<Vec<ReviewCard>> {
        Ok(self
            .store
            .due_cards(learner_id, on, self.due_cards_limit)
            .await?)
    }
}
