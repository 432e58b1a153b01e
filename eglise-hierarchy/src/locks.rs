//! Per-entity async locks
//!
//! Serializes mutations touching the same entity or the same user so
//! uniqueness checks and qualification writes cannot interleave.
//!
//! Ordering rule: acquire entity keys first, then user keys in a second
//! `acquire` call. Never acquire an entity key while holding a user key.
//! Keys within one call are taken in sorted order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Church(Uuid),
    Network(Uuid),
    Group(Uuid),
    Session(Uuid),
    Unit(Uuid),
    User(Uuid),
}

/// Guards held until dropped
#[must_use = "locks are released when the guard set is dropped"]
pub struct LockSet {
    guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

#[derive(Clone, Default)]
pub struct LockRegistry {
    slots: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key, deduplicated and in sorted order
    pub async fn acquire<I>(&self, keys: I) -> LockSet
    where
        I: IntoIterator<Item = LockKey>,
    {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries only the map references are idle
            slots.retain(|_, m| Arc::strong_count(m) > 1);
            keys.iter()
                .map(|key| slots.entry(*key).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        LockSet { guards }
    }

    /// Number of keys currently tracked
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.len())
            .unwrap_or_default()
    }
}

/// User keys for a set of optional ids
pub fn user_keys<I>(ids: I) -> Vec<LockKey>
where
    I: IntoIterator<Item = Uuid>,
{
    ids.into_iter().map(LockKey::User).collect()
}
