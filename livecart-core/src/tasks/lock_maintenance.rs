// livecart-core/src/tasks/lock_maintenance.rs

use std::time::Duration;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;
use crate::lock::InMemoryReservationLock;

/// Spawns a background task that periodically drops expired entries from
/// the in-process reservation lock. Stops when `shutdown` flips.
pub fn spawn_lock_prune_task(
    lock: Arc<InMemoryReservationLock>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    lock.prune_expired();
                    debug!("Pruned expired reservation locks.");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::ReservationLock;

    #[tokio::test(start_paused = true)]
    async fn prunes_on_interval_and_stops_on_shutdown() {
        let lock = Arc::new(InMemoryReservationLock::new());
        lock.acquire("p1", "v", Duration::from_secs(1)).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let task = spawn_lock_prune_task(lock.clone(), Duration::from_secs(5), rx);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(lock.len(), 0);

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
