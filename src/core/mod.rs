mod keyed_lock;

pub use keyed_lock::{card_key, learner_key, mastery_key, KeyedMutex, KeyedMutexGuard};
