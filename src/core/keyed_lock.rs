use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of async mutexes addressed by string key. Holding the guard for a key
/// excludes every other holder of the same key; distinct keys never contend.
#[derive(Debug, Default)]
pub struct KeyedMutex {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

pub struct KeyedMutexGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: impl Into<String>) -> KeyedMutexGuard {
        let slot = self.slot(key.into());
        KeyedMutexGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of keys with a live holder or waiter.
    pub fn active_keys(&self) -> usize {
        let slots = self.slots.lock();
        slots.values().filter(|slot| slot.strong_count() > 0).count()
    }

    fn slot(&self, key: String) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(&key).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, slot| slot.strong_count() > 0);
        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(key, Arc::downgrade(&fresh));
        fresh
    }
}

pub fn learner_key(learner_id: &str) -> String {
    format!("learner:{learner_id}")
}

/// Length-prefixed so that ids containing `:` cannot collide.
pub fn mastery_key(learner_id: &str, concept_id: &str) -> String {
    format!("mastery:{}:{learner_id}:{concept_id}", learner_id.len())
}

pub fn card_key(card_id: &str) -> String {
    format!("card:{card_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedMutex::new());
        let guard = locks.lock("card:1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock("card:1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let locks = KeyedMutex::new();
        let _a = locks.lock("card:1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("card:2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active_keys(), 2);
    }

    #[test]
    fn test_mastery_keys_do_not_collide_on_separator() {
        assert_ne!(mastery_key("a:b", "c"), mastery_key("a", "b:c"));
        assert_eq!(mastery_key("l1", "limits"), mastery_key("l1", "limits"));
    }

    #[tokio::test]
    async fn test_distinct_pairs_sharing_a_flat_key_do_not_contend() {
        let locks = KeyedMutex::new();
        let _a = locks.lock(mastery_key("a:b", "c")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(mastery_key("a", "b:c")))
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyedMutex::new();
        drop(locks.lock(learner_key("a")).await);
        drop(locks.lock(learner_key("b")).await);
        assert_eq!(locks.active_keys(), 0);
        let _c = locks.lock(mastery_key("a", "c1")).await;
        assert_eq!(locks.active_keys(), 1);
    }
}
