use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;

use crate::db::{Store, StoreError, StoreResult};
use crate::types::{Assessment, CapabilityVector, ConceptMastery, ReviewCard};

/// Process-local store with the same ordering and conflict rules as
/// [`crate::db::SqliteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    assessments: HashMap<String, Assessment>,
    /// Per learner, chronological; equal timestamps keep insertion order.
    vectors: HashMap<String, Vec<CapabilityVector>>,
    mastery: BTreeMap<(String, String), ConceptMastery>,
    cards: HashMap<String, ReviewCard>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn chronological(&self, learner_id: &str) -> Vec<CapabilityVector> {
        self.vectors.get(learner_id).cloned().unwrap_or_default()
    }

    fn latest(&self, learner_id: &str) -> Option<CapabilityVector> {
        self.vectors.get(learner_id).and_then(|history| history.last().cloned())
    }

    fn push_vector(&mut self, vector: &CapabilityVector) {
        let history = self.vectors.entry(vector.learner_id.clone()).or_default();
        let at = history.partition_point(|v| v.created_at <= vector.created_at);
        history.insert(at, vector.clone());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn latest_vector(&self, learner_id: &str) -> StoreResult<Option<CapabilityVector>> {
        Ok(self.inner.read().latest(learner_id))
    }

    async fn vector_history(&self, learner_id: &str) -> StoreResult<Vec<CapabilityVector>> {
        Ok(self.inner.read().chronological(learner_id))
    }

    async fn first_vector_since(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<CapabilityVector>> {
        Ok(self
            .inner
            .read()
            .chronological(learner_id)
            .into_iter()
            .find(|v| v.created_at >= since))
    }

    async fn get_assessment(&self, assessment_id: &str) -> StoreResult<Option<Assessment>> {
        Ok(self.inner.read().assessments.get(assessment_id).cloned())
    }

    async fn append_assessment(
        &self,
        assessment: &Assessment,
        vector: &CapabilityVector,
        expected_parent: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();

        let current = inner
            .vectors
            .get(&vector.learner_id)
            .and_then(|history| history.last())
            .map(|v| v.id.as_str());
        if current != expected_parent {
            return Err(StoreError::conflict("capability_vector", &vector.learner_id));
        }
        if inner.assessments.contains_key(&assessment.id) {
            return Err(StoreError::conflict("assessment", &assessment.id));
        }

        inner
            .assessments
            .insert(assessment.id.clone(), assessment.clone());
        inner.push_vector(vector);
        Ok(())
    }

    async fn get_mastery(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> StoreResult<Option<ConceptMastery>> {
        let key = (learner_id.to_string(), concept_id.to_string());
        Ok(self.inner.read().mastery.get(&key).cloned())
    }

    async fn list_mastery(&self, learner_id: &str) -> StoreResult<Vec<ConceptMastery>> {
        Ok(self
            .inner
            .read()
            .mastery
            .values()
            .filter(|m| m.learner_id == learner_id)
            .cloned()
            .collect())
    }

    async fn insert_mastery(&self, record: &ConceptMastery) -> StoreResult<()> {
        let key = (record.learner_id.clone(), record.concept_id.clone());
        let mut inner = self.inner.write();
        if inner.mastery.contains_key(&key) {
            return Err(StoreError::conflict(
                "concept_mastery",
                format!("{}/{}", record.learner_id, record.concept_id),
            ));
        }
        inner.mastery.insert(key, record.clone());
        Ok(())
    }

    async fn update_mastery(
        &self,
        record: &ConceptMastery,
        expected_version: i64,
    ) -> StoreResult<()> {
        let key = (record.learner_id.clone(), record.concept_id.clone());
        let mut inner = self.inner.write();
        match inner.mastery.get_mut(&key) {
            Some(existing) if existing.version == expected_version => {
                existing.mastery_score = record.mastery_score;
                existing.status = record.status;
                existing.version = record.version;
                existing.last_updated = record.last_updated;
                Ok(())
            }
            _ => Err(StoreError::conflict(
                "concept_mastery",
                format!("{}/{}", record.learner_id, record.concept_id),
            )),
        }
    }

    async fn get_card(&self, card_id: &str) -> StoreResult<Option<ReviewCard>> {
        Ok(self.inner.read().cards.get(card_id).cloned())
    }

    async fn insert_card(&self, card: &ReviewCard) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.cards.contains_key(&card.id) {
            return Err(StoreError::conflict("review_card", &card.id));
        }
        inner.cards.insert(card.id.clone(), card.clone());
        Ok(())
    }

    async fn update_card(&self, card: &ReviewCard, expected_version: i64) -> StoreResult<()> {
        let mut inner = self.inner.write();
        match inner.cards.get_mut(&card.id) {
            Some(existing) if existing.version == expected_version => {
                existing.repetitions = card.repetitions;
                existing.ease_factor = card.ease_factor;
                existing.interval_days = card.interval_days;
                existing.next_review_date = card.next_review_date;
                existing.version = card.version;
                existing.updated_at = card.updated_at;
                Ok(())
            }
            _ => Err(StoreError::conflict("review_card", &card.id)),
        }
    }

    async fn list_cards(&self, learner_id: &str) -> StoreResult<Vec<ReviewCard>> {
        let mut cards: Vec<ReviewCard> = self
            .inner
            .read()
            .cards
            .values()
            .filter(|c| c.learner_id == learner_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(cards)
    }

    async fn due_cards(
        &self,
        learner_id: &str,
        on: NaiveDate,
        limit: i64,
    ) -> StoreResult<Vec<ReviewCard>> {
        let mut due: Vec<ReviewCard> = self
            .inner
            .read()
            .cards
            .values()
            .filter(|c| c.learner_id == learner_id && c.is_due(on))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.next_review_date
                .cmp(&b.next_review_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(due)
    }
}
