//! Reservation lock: a short-lived, product-scoped mutual-exclusion record
//! that suppresses duplicate automatic orders.
//!
//! The lock is advisory. The order service holds the authoritative
//! reservation; this is a fast-path guard in front of it, so callers are
//! expected to degrade to "no lock" when the backend errors rather than
//! block the purchase path.

pub mod memory_lock;
pub mod redis_lock;

use std::time::Duration;
use async_trait::async_trait;
use uuid::Uuid;
use crate::Error;

pub use memory_lock::InMemoryReservationLock;
pub use redis_lock::RedisReservationLock;

/// Default reservation window (15 minutes).
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(900);

/// Backend key for a product's lock.
pub fn lock_key(product_id: &str) -> String {
    format!("lock:{}", product_id)
}

/// Value written when a lock is taken before the order id is known.
/// Replaced by the real order id on confirmation.
pub fn pending_token() -> String {
    format!("pending:{}", Uuid::new_v4())
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationLock: Send + Sync {
    /// Atomic test-and-set with expiry. `Ok(true)` means the caller now
    /// holds the lock; `Ok(false)` means an unexpired lock already exists.
    async fn acquire(&self, product_id: &str, value: &str, ttl: Duration) -> Result<bool, Error>;

    /// Whether an unexpired lock exists for the product.
    async fn check(&self, product_id: &str) -> Result<bool, Error>;

    /// Swaps the held value (normally a pending token) for `order_id`,
    /// keeping the remaining TTL. Returns `false` if `value` no longer
    /// holds the lock.
    async fn confirm(&self, product_id: &str, value: &str, order_id: &str) -> Result<bool, Error>;

    /// Deletes the lock only if it is still held with `value`.
    async fn release(&self, product_id: &str, value: &str) -> Result<bool, Error>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
