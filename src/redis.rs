use std::collections::HashMap;

use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, error};

use crate::cache::{DeltaOutcome, InteractiveCache};
use crate::error::{CacheError, Result};
use crate::key::CounterKey;
use crate::options::CacheOptions;
use crate::record::{CounterField, CounterRecord};
use crate::script::INCR_CNT_IF_PRESENT;

/// Counter cache stored as one Redis hash per entity.
///
/// The connection manager multiplexes every call over a shared connection
/// and reconnects on its own, so a clone is taken per request instead of
/// locking.
#[derive(Clone)]
pub struct RedisInteractiveCache {
    conn: ConnectionManager,
    opts: CacheOptions,
}

impl RedisInteractiveCache {
    /// Fails with [`CacheError::InvalidTtl`] when the configured TTL is unusable.
    pub fn new(conn: ConnectionManager, opts: CacheOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self { conn, opts })
    }

    pub async fn connect(client: redis::Client, opts: CacheOptions) -> Result<Self> {
        opts.validate()?;
        let conn = ConnectionManager::new(client).await?;
        Self::new(conn, opts)
    }

    pub fn options(&self) -> &CacheOptions {
        &self.opts
    }

    fn key(&self, key: &CounterKey) -> String {
        key.storage_key(&self.opts.namespace)
    }
}

#[async_trait::async_trait]
impl InteractiveCache for RedisInteractiveCache {
    async fn set(&self, key: &CounterKey, record: &CounterRecord) -> Result<()> {
        let ttl = self.opts.ttl_millis()?;
        let key = self.key(key);
        let mut conn = self.conn.clone();

        let _: () = conn.hset_multiple(&key, &record.to_fields()).await?;

        let response: redis::RedisResult<bool> = conn.pexpire(&key, ttl).await;
        if let Err(source) = response {
            error!("counters written to {key} but fail to set expiry: {source}");
            return Err(CacheError::PartialWrite { key, source });
        }

        debug!("cached counters for {key} with ttl {ttl}ms");
        Ok(())
    }

    async fn get(&self, key: &CounterKey) -> Result<Option<CounterRecord>> {
        let storage_key = self.key(key);
        let fields: HashMap<String, String> = self.conn.clone().hgetall(&storage_key).await?;

        let record = record_from_hash(key.biz_id, &fields);
        if record.is_none() {
            debug!("cache miss for {storage_key}");
        }
        Ok(record)
    }

    async fn incr_if_present(
        &self,
        key: &CounterKey,
        field: CounterField,
        delta: i64,
    ) -> Result<DeltaOutcome> {
        let key = self.key(key);
        let applied: i64 = INCR_CNT_IF_PRESENT
            .key(&key)
            .arg(field.as_str())
            .arg(delta)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| script_error(&key, field, e))?;

        if applied == 1 {
            debug!("applied {delta:+} to {field} of {key}");
            Ok(DeltaOutcome::Applied)
        } else {
            debug!("skip {delta:+} on {field}: {key} is not cached");
            Ok(DeltaOutcome::Skipped)
        }
    }

    async fn evict(&self, key: &CounterKey) -> Result<bool> {
        let removed: i64 = self.conn.clone().del(self.key(key)).await?;
        Ok(removed > 0)
    }
}

/// `HGETALL` replies with an empty map for a missing key; that is a miss,
/// not a record of zeros.
fn record_from_hash(biz_id: i64, fields: &HashMap<String, String>) -> Option<CounterRecord> {
    if fields.is_empty() {
        return None;
    }
    Some(CounterRecord::from_fields(biz_id, fields))
}

/// `HINCRBY` aborts the script with "increment or decrement would overflow".
fn script_error(key: &str, field: CounterField, err: redis::RedisError) -> CacheError {
    if err.to_string().contains("would overflow") {
        return CacheError::Overflow {
            key: key.to_string(),
            field,
        };
    }
    CacheError::Transport(err)
}

#[test]
fn test_empty_hash_is_a_miss() {
    assert_eq!(record_from_hash(42, &HashMap::new()), None);

    let fields = HashMap::from([("collect_cnt".to_string(), "0".to_string())]);
    assert_eq!(
        record_from_hash(42, &fields),
        Some(CounterRecord {
            biz_id: 42,
            ..Default::default()
        })
    );
}

#[test]
fn test_script_error_mapping() {
    let overflow = redis::RedisError::from((
        redis::ErrorKind::ResponseError,
        "An error was signalled by the server",
        "ERR Error running script: @user_script:4: ERR increment or decrement would overflow"
            .to_string(),
    ));
    assert!(matches!(
        script_error("interactive:article:1", CounterField::Read, overflow),
        CacheError::Overflow {
            field: CounterField::Read,
            ..
        }
    ));

    let io = redis::RedisError::from((redis::ErrorKind::IoError, "broken pipe"));
    assert!(matches!(
        script_error("interactive:article:1", CounterField::Like, io),
        CacheError::Transport(_)
    ));
}

// The tests below need a live server; they return early when `REDIS_ADDR` is unset.
#[cfg(test)]
async fn test_cache() -> Option<RedisInteractiveCache> {
    let addr = std::env::var("REDIS_ADDR").ok()?;
    let client = redis::Client::open(addr).expect("invalid REDIS_ADDR");
    let namespace = format!("interactive-test-{}", std::process::id());
    let opts = CacheOptions::builder().namespace(namespace).build();
    Some(
        RedisInteractiveCache::connect(client, opts)
            .await
            .expect("fail to connect to redis"),
    )
}

#[tokio::test]
async fn test_redis_article_scenario() {
    let Some(cache) = test_cache().await else {
        return;
    };
    crate::cache::conformance::article_scenario(&cache).await;
}

#[tokio::test]
async fn test_redis_deltas_never_create() {
    let Some(cache) = test_cache().await else {
        return;
    };
    crate::cache::conformance::deltas_never_create(&cache, "redis-absent").await;
}

#[tokio::test]
async fn test_redis_concurrent_reads() {
    let Some(cache) = test_cache().await else {
        return;
    };
    crate::cache::conformance::concurrent_reads(cache, "redis-concurrent").await;
}

#[tokio::test]
async fn test_redis_like_balance() {
    let Some(cache) = test_cache().await else {
        return;
    };
    crate::cache::conformance::like_balance(cache, "redis-like").await;
}

#[tokio::test]
async fn test_redis_ttl_armed_and_kept_by_deltas() {
    let Some(cache) = test_cache().await else {
        return;
    };
    let key = CounterKey::new("redis-ttl", 1);
    let storage_key = cache.key(&key);

    cache.set(&key, &CounterRecord::default()).await.unwrap();
    let mut conn = cache.conn.clone();
    let ttl: i64 = conn.ttl(&storage_key).await.unwrap();
    assert!(ttl > 0 && ttl <= 900, "unexpected ttl {ttl}");

    cache.incr_read_cnt_if_present(&key).await.unwrap();
    let after: i64 = conn.ttl(&storage_key).await.unwrap();
    assert!(after > 0 && after <= ttl);

    cache.evict(&key).await.unwrap();
}

#[tokio::test]
async fn test_redis_lenient_get() {
    let Some(cache) = test_cache().await else {
        return;
    };
    let key = CounterKey::new("redis-lenient", 3);
    let storage_key = cache.key(&key);

    let mut conn = cache.conn.clone();
    let _: () = conn
        .hset_multiple(&storage_key, &[("read_cnt", "7"), ("like_cnt", "oops")])
        .await
        .unwrap();

    let record = cache.get(&key).await.unwrap().unwrap();
    assert_eq!(record.read_cnt, 7);
    assert_eq!(record.like_cnt, 0);
    assert_eq!(record.collect_cnt, 0);

    assert!(cache.evict(&key).await.unwrap());
}

#[tokio::test]
async fn test_redis_set_races_deltas() {
    let Some(cache) = test_cache().await else {
        return;
    };
    crate::cache::conformance::set_races_deltas(cache, "redis-race").await;
}

#[tokio::test]
async fn test_redis_overflow_is_refused() {
    let Some(cache) = test_cache().await else {
        return;
    };
    crate::cache::conformance::overflow_is_refused(&cache, "redis-overflow").await;
}

#[tokio::test]
async fn test_unusable_ttl_rejected_before_connecting() {
    // nothing listens here; validation must fail first
    let client = redis::Client::open("redis://127.0.0.1:1").unwrap();
    for ttl in [
        std::time::Duration::ZERO,
        std::time::Duration::from_millis(500),
    ] {
        let opts = CacheOptions::builder().ttl(ttl).build();
        let result = RedisInteractiveCache::connect(client.clone(), opts).await;
        assert!(matches!(result, Err(CacheError::InvalidTtl(t)) if t == ttl));
    }
}
