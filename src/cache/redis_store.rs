//! Redis-backed `KvCache`. Uses a `ConnectionManager` for automatic
//! reconnection; every command is bounded by `op_timeout`.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::time::timeout;
use tracing::{debug, info};

use super::{CacheError, KvCache};

#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
    redis_url: String,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("redis_url", &redact_url(&self.redis_url))
            .field("prefix", &self.prefix)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl RedisCache {
    pub async fn connect(redis_url: &str, prefix: &str, op_timeout: Duration) -> Result<Self> {
        info!(url = %redact_url(redis_url), "connecting to redis");
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| anyhow!("failed to create redis connection manager: {e}"))?;
        Ok(Self {
            conn_manager,
            prefix: prefix.to_string(),
            op_timeout,
            redis_url: redis_url.to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.prefix)
        }
    }
}

#[async_trait]
impl KvCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = self.full_key(key);
        let mut conn = self.conn_manager.clone();
        match timeout(self.op_timeout, conn.get::<_, Option<Vec<u8>>>(&key)).await {
            Ok(Ok(v)) => {
                debug!(%key, hit = v.is_some(), "redis GET");
                Ok(v)
            }
            Ok(Err(e)) => Err(CacheError::Unavailable(e.to_string())),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let key = self.full_key(key);
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.conn_manager.clone();
        match timeout(
            self.op_timeout,
            conn.set_ex::<_, _, ()>(&key, value, ttl_secs),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(%key, ttl_secs, "redis SETEX");
                Ok(())
            }
            Ok(Err(e)) => Err(CacheError::Unavailable(e.to_string())),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Strip credentials from a redis URL before logging it.
fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            // Both setters only fail for cannot-be-a-base URLs, which carry no credentials.
            let _ = parsed.set_password(None);
            let _ = parsed.set_username("");
            parsed.to_string()
        }
        Err(_) => match url.rfind('@') {
            Some(at) => format!("***{}", &url[at..]),
            None => url.to_string(),
        },
    }
}
