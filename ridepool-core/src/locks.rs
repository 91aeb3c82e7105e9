use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Single-writer serialization keyed by entity id (trip, passenger, driver).
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

/// Proof that the holder owns the lock for `key` until dropped
#[derive(Debug)]
pub struct KeyGuard {
    key: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> Uuid {
        self.key
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: Uuid) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Drop slots nobody is holding or waiting on
            if slots.len() > 1024 {
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots.entry(key).or_default().clone()
        };

        KeyGuard {
            key,
            _guard: slot.lock_owned().await,
        }
    }
}
