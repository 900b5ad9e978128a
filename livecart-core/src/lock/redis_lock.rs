// livecart-core/src/lock/redis_lock.rs

use std::time::Duration;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};
use crate::Error;
use super::{lock_key, ReservationLock};

const CONFIRM_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
    return 1
end
return 0
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis-backed lock shared by every pipeline worker. Acquisition is a
/// single `SET key value NX EX ttl`, so at most one unexpired lock exists
/// per product across the fleet.
#[derive(Debug)]
pub struct RedisReservationLock {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    op_timeout: Duration,
}

impl RedisReservationLock {
    /// Does not connect; the first operation does. An unreachable backend
    /// therefore surfaces as per-operation errors, not a startup failure.
    pub fn new(url: &str, op_timeout: Duration) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            op_timeout,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, Error> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = timeout(self.op_timeout, self.client.get_multiplexed_async_connection()).await??;
        debug!("(RedisReservationLock) connected");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Drops the cached connection so the next call reconnects.
    async fn reset(&self) {
        self.conn.lock().await.take();
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        match timeout(self.op_timeout, op(conn)).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                warn!("(RedisReservationLock) command failed: {}", e);
                self.reset().await;
                Err(Error::Redis(e))
            }
            Err(elapsed) => {
                self.reset().await;
                Err(Error::Timeout(elapsed))
            }
        }
    }
}

#[async_trait]
impl ReservationLock for RedisReservationLock {
    async fn acquire(&self, product_id: &str, value: &str, ttl: Duration) -> Result<bool, Error> {
        let key = lock_key(product_id);
        let ttl_secs = ttl.as_secs().max(1);
        let reply: Option<String> = self
            .run(|mut conn| async move {
                redis::cmd("SET")
                    .arg(&key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn check(&self, product_id: &str) -> Result<bool, Error> {
        let key = lock_key(product_id);
        let exists: i64 = self
            .run(|mut conn| async move {
                redis::cmd("EXISTS").arg(&key).query_async(&mut conn).await
            })
            .await?;
        Ok(exists > 0)
    }

    async fn confirm(&self, product_id: &str, value: &str, order_id: &str) -> Result<bool, Error> {
        let key = lock_key(product_id);
        let swapped: i64 = self
            .run(|mut conn| async move {
                redis::Script::new(CONFIRM_SCRIPT)
                    .key(&key)
                    .arg(value)
                    .arg(order_id)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(swapped == 1)
    }

    async fn release(&self, product_id: &str, value: &str) -> Result<bool, Error> {
        let key = lock_key(product_id);
        let removed: i64 = self
            .run(|mut conn| async move {
                redis::Script::new(RELEASE_SCRIPT)
                    .key(&key)
                    .arg(value)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(removed > 0)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
