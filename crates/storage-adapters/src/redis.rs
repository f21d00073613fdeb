//! # Redis Broker and Job Lock
//!
//! The broker keeps one list per topic (`pipeline:{topic}`): `LPUSH` to
//! publish, `BRPOP` to receive. Parked messages go to `pipeline:{topic}:dead`
//! together with the reason.
//!
//! A message popped by `BRPOP` whose receive future is dropped before it
//! returns is lost. The periodic scans re-dispatch anything still pending, so
//! this only delays the item.
//!
//! The job lock is `SET key token NX PX ttl`, released with a compare-and-delete
//! script so an instance never frees a lease another instance has since taken.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{cmd, Script};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use domains::{DomainError, DomainResult, JobLock, LockLease, MessageBroker, PipelineMessage, Topic};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Seconds one `BRPOP` blocks before polling again.
const POLL_TIMEOUT_SECS: u64 = 5;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

fn topic_key(topic: Topic) -> String {
    format!("pipeline:{topic}")
}

fn dead_key(topic: Topic) -> String {
    format!("pipeline:{topic}:dead")
}

fn lock_key(job: &str) -> String {
    format!("lock:job:{job}")
}

fn broker_err(err: impl std::fmt::Display) -> DomainError {
    DomainError::Broker(err.to_string())
}

pub fn create_pool(url: &str) -> DomainResult<Pool> {
    let pool = Config::from_url(url).create_pool(Some(Runtime::Tokio1)).map_err(broker_err)?;
    info!("redis pool created");
    Ok(pool)
}

async fn connection(pool: &Pool) -> DomainResult<Connection> {
    pool.get().await.map_err(broker_err)
}

#[derive(Clone)]
pub struct RedisBroker {
    pool: Pool,
}

impl RedisBroker {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, message: &PipelineMessage) -> DomainResult<()> {
        let payload = serde_json::to_string(message)?;
        let mut conn = connection(&self.pool).await?;
        let _: i64 = cmd("LPUSH")
            .arg(topic_key(message.topic()))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(broker_err)?;
        Ok(())
    }

    async fn receive(&self, topic: Topic) -> DomainResult<Option<PipelineMessage>> {
        let key = topic_key(topic);
        loop {
            let mut conn = connection(&self.pool).await?;
            let popped: Option<(String, String)> = cmd("BRPOP")
                .arg(&key)
                .arg(POLL_TIMEOUT_SECS)
                .query_async(&mut conn)
                .await
                .map_err(broker_err)?;

            let Some((_, payload)) = popped else {
                continue;
            };
            match serde_json::from_str::<PipelineMessage>(&payload) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => {
                    // Undecodable payloads can never succeed; park them raw
                    warn!(%topic, error = %err, "undecodable message, parking it");
                    let entry = json!({ "reason": err.to_string(), "raw": payload }).to_string();
                    let _: i64 = cmd("LPUSH")
                        .arg(dead_key(topic))
                        .arg(entry)
                        .query_async(&mut conn)
                        .await
                        .map_err(broker_err)?;
                }
            }
        }
    }

    async fn park(&self, message: &PipelineMessage, reason: &str) -> DomainResult<()> {
        let entry = json!({ "reason": reason, "message": message }).to_string();
        let mut conn = connection(&self.pool).await?;
        let _: i64 = cmd("LPUSH")
            .arg(dead_key(message.topic()))
            .arg(entry)
            .query_async(&mut conn)
            .await
            .map_err(broker_err)?;
        debug!(topic = %message.topic(), subject_id = message.subject_id(), "message parked in redis");
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisJobLock {
    pool: Pool,
}

impl RedisJobLock {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLock for RedisJobLock {
    async fn try_acquire(&self, job: &str, ttl: Duration) -> DomainResult<Option<LockLease>> {
        let token = Uuid::new_v4().to_string();
        let mut conn = connection(&self.pool).await?;
        let acquired: Option<String> = cmd("SET")
            .arg(lock_key(job))
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(broker_err)?;

        Ok(acquired.map(|_| LockLease { job: job.to_string(), token }))
    }

    async fn release(&self, lease: LockLease) -> DomainResult<()> {
        let mut conn = connection(&self.pool).await?;
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(lock_key(&lease.job))
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await
            .map_err(broker_err)?;
        if deleted == 0 {
            debug!(job = %lease.job, "lease had already expired");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_topic() {
        assert_eq!(topic_key(Topic::UserInterests), "pipeline:user_interests");
        assert_eq!(dead_key(Topic::Moderation), "pipeline:moderation:dead");
        assert_eq!(lock_key("tagging-scan"), "lock:job:tagging-scan");
    }
}
