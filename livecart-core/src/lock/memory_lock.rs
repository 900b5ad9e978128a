// livecart-core/src/lock/memory_lock.rs

use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use crate::Error;
use super::{lock_key, ReservationLock};

#[derive(Debug, Clone)]
struct LockEntry {
    value: String,
    expires_at: Instant,
}

/// Single-process lock backend. Used when no Redis address is configured,
/// and in tests. Expired entries are overwritten lazily on the next
/// acquisition and pruned by [`InMemoryReservationLock::prune_expired`].
#[derive(Default)]
pub struct InMemoryReservationLock {
    entries: DashMap<String, LockEntry>,
}

impl InMemoryReservationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value currently held for a product, if unexpired.
    pub fn holder(&self, product_id: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(&lock_key(product_id))
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    /// Entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prune_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl ReservationLock for InMemoryReservationLock {
    async fn acquire(&self, product_id: &str, value: &str, ttl: Duration) -> Result<bool, Error> {
        let now = Instant::now();
        let fresh = LockEntry {
            value: value.to_string(),
            expires_at: now + ttl,
        };
        // The entry guard holds the shard lock, which makes this test-and-set atomic.
        match self.entries.entry(lock_key(product_id)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    Ok(false)
                } else {
                    occupied.insert(fresh);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn check(&self, product_id: &str) -> Result<bool, Error> {
        Ok(self.holder(product_id).is_some())
    }

    async fn confirm(&self, product_id: &str, value: &str, order_id: &str) -> Result<bool, Error> {
        let now = Instant::now();
        match self.entries.get_mut(&lock_key(product_id)) {
            Some(mut entry) if entry.expires_at > now && entry.value == value => {
                entry.value = order_id.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, product_id: &str, value: &str) -> Result<bool, Error> {
        let removed = self
            .entries
            .remove_if(&lock_key(product_id), |_, e| e.value == value);
        Ok(removed.is_some())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
