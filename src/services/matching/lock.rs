//! Concurrency Controller (C7) — per-market exclusive lock.
//!
//! `SET lock:market:<id> <token> NX EX <ttl>` before a matching transaction;
//! released by a token-guarded delete after commit or rollback so a lock
//! holder can never release a lock another holder has since acquired after
//! its own TTL expired.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{CacheKey, RedisClient};
use crate::error::EngineError;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct MarketLock {
    redis: Arc<RedisClient>,
    ttl_secs: u64,
    max_attempts: u32,
}

/// A held lock. Dropping this without calling `release` leaves the lock to
/// expire on its own TTL; callers should always call `release` explicitly
/// once the transaction commits or rolls back.
pub struct LockGuard {
    market_id: Uuid,
    token: String,
}

impl MarketLock {
    pub fn new(redis: Arc<RedisClient>, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs, max_attempts: 3 }
    }

    /// Attempts to acquire the lock for `market_id`, retrying a small bounded
    /// number of times before surfacing `Conflict`.
    pub async fn acquire(&self, market_id: Uuid) -> Result<LockGuard, EngineError> {
        let key = CacheKey::lock_market(market_id);
        let token = Uuid::new_v4().to_string();

        for attempt in 0..self.max_attempts {
            let acquired = self
                .redis
                .with_retry(|mut conn| {
                    let key = key.clone();
                    let token = token.clone();
                    let ttl = self.ttl_secs;
                    async move {
                        let result: Option<String> = redis::cmd("SET")
                            .arg(&key)
                            .arg(&token)
                            .arg("NX")
                            .arg("EX")
                            .arg(ttl)
                            .query_async(&mut conn)
                            .await?;
                        Ok(result.is_some())
                    }
                })
                .await
                .map_err(EngineError::from)?;

            if acquired {
                return Ok(LockGuard { market_id, token });
            }

            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(std::time::Duration::from_millis(50 * (attempt as u64 + 1))).await;
            }
        }

        Err(EngineError::Conflict(market_id))
    }

    /// Releases a lock previously returned by `acquire`. A no-op (not an
    /// error) if the lock already expired and was picked up by someone else.
    pub async fn release(&self, guard: LockGuard) -> Result<(), EngineError> {
        let key = CacheKey::lock_market(guard.market_id);
        self.redis
            .with_retry(|mut conn| {
                let key = key.clone();
                let token = guard.token.clone();
                async move {
                    let script = redis::Script::new(RELEASE_SCRIPT);
                    let _: () = script.key(&key).arg(&token).invoke_async(&mut conn).await?;
                    Ok(())
                }
            })
            .await
            .map_err(EngineError::from)
    }
}
