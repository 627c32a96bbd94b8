use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{DeltaOutcome, InteractiveCache};
use crate::error::{CacheError, Result};
use crate::key::CounterKey;
use crate::options::CacheOptions;
use crate::record::{CounterField, CounterRecord};

#[derive(Debug, Clone, Copy)]
struct Slot {
    record: CounterRecord,
    deadline: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

/// In-process counter cache with the same semantics as the Redis one.
///
/// Every key maps to a shard of the map; the shard lock held by an entry
/// guard makes the existence check and the increment a single step.
/// Expired slots count as absent and are dropped when touched.
#[derive(Clone, Default)]
pub struct MemoryInteractiveCache {
    slots: Arc<DashMap<String, Slot>>,
    opts: CacheOptions,
}

impl MemoryInteractiveCache {
    /// Fails with [`CacheError::InvalidTtl`] when the configured TTL is unusable.
    pub fn new(opts: CacheOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            slots: Arc::default(),
            opts,
        })
    }

    /// Remove every expired slot. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_expired(now));
        before.saturating_sub(self.slots.len())
    }

    /// Number of slots held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn key(&self, key: &CounterKey) -> String {
        key.storage_key(&self.opts.namespace)
    }
}

#[async_trait::async_trait]
impl InteractiveCache for MemoryInteractiveCache {
    async fn set(&self, key: &CounterKey, record: &CounterRecord) -> Result<()> {
        let slot = Slot {
            record: CounterRecord {
                biz_id: key.biz_id,
                ..*record
            },
            deadline: Instant::now() + self.opts.ttl,
        };
        self.slots.insert(self.key(key), slot);
        Ok(())
    }

    async fn get(&self, key: &CounterKey) -> Result<Option<CounterRecord>> {
        let storage_key = self.key(key);
        let now = Instant::now();

        if let Some(slot) = self.slots.get(&storage_key) {
            if !slot.is_expired(now) {
                return Ok(Some(slot.record));
            }
        }

        self.slots.remove_if(&storage_key, |_, slot| slot.is_expired(now));
        debug!("cache miss for {storage_key}");
        Ok(None)
    }

    async fn incr_if_present(
        &self,
        key: &CounterKey,
        field: CounterField,
        delta: i64,
    ) -> Result<DeltaOutcome> {
        let storage_key = self.key(key);

        match self.slots.entry(storage_key) {
            Entry::Occupied(mut slot) if !slot.get().is_expired(Instant::now()) => {
                if slot.get_mut().record.apply(field, delta).is_none() {
                    return Err(CacheError::Overflow {
                        key: slot.key().clone(),
                        field,
                    });
                }
                debug!("applied {delta:+} to {field} of {}", slot.key());
                Ok(DeltaOutcome::Applied)
            }
            Entry::Occupied(slot) => {
                debug!("skip {delta:+} on {field}: {} has expired", slot.key());
                slot.remove();
                Ok(DeltaOutcome::Skipped)
            }
            Entry::Vacant(slot) => {
                debug!("skip {delta:+} on {field}: {} is not cached", slot.key());
                Ok(DeltaOutcome::Skipped)
            }
        }
    }

    async fn evict(&self, key: &CounterKey) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .slots
            .remove(&self.key(key))
            .is_some_and(|(_, slot)| !slot.is_expired(now)))
    }
}

#[tokio::test]
async fn test_article_scenario() {
    let cache = MemoryInteractiveCache::default();
    crate::cache::conformance::article_scenario(&cache).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deltas_never_create() {
    let cache = MemoryInteractiveCache::default();
    crate::cache::conformance::deltas_never_create(&cache, "article").await;
    assert!(cache.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_are_not_lost() {
    crate::cache::conformance::concurrent_reads(MemoryInteractiveCache::default(), "article").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_like_balance() {
    crate::cache::conformance::like_balance(MemoryInteractiveCache::default(), "article").await;
}

#[tokio::test]
async fn test_set_overwrites_and_keeps_key_id() {
    let cache = MemoryInteractiveCache::default();
    let key = CounterKey::new("article", 5);

    cache
        .set(
            &key,
            &CounterRecord {
                biz_id: 0,
                read_cnt: 1,
                like_cnt: 1,
                collect_cnt: 1,
            },
        )
        .await
        .unwrap();
    cache.incr_like_cnt_if_present(&key).await.unwrap();
    cache
        .set(
            &key,
            &CounterRecord {
                read_cnt: 9,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        cache.get(&key).await.unwrap(),
        Some(CounterRecord {
            biz_id: 5,
            read_cnt: 9,
            like_cnt: 0,
            collect_cnt: 0,
        })
    );
}

#[tokio::test]
async fn test_zero_record_is_not_a_miss() {
    let cache = MemoryInteractiveCache::default();
    let key = CounterKey::new("article", 8);

    assert_eq!(cache.get(&key).await.unwrap(), None);
    cache.set(&key, &CounterRecord::default()).await.unwrap();
    assert_eq!(
        cache.get(&key).await.unwrap(),
        Some(CounterRecord {
            biz_id: 8,
            ..Default::default()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry() {
    use std::time::Duration;

    let cache = MemoryInteractiveCache::default();
    let key = CounterKey::new("article", 11);
    cache.set(&key, &CounterRecord::default()).await.unwrap();

    tokio::time::advance(Duration::from_secs(14 * 60)).await;
    assert!(cache.incr_read_cnt_if_present(&key).await.unwrap().is_applied());
    assert_eq!(cache.get(&key).await.unwrap().unwrap().read_cnt, 1);

    // deltas do not extend the ttl
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(cache.get(&key).await.unwrap(), None);
    assert_eq!(
        cache.incr_read_cnt_if_present(&key).await.unwrap(),
        DeltaOutcome::Skipped
    );
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_set_rearms_ttl() {
    use std::time::Duration;

    let cache = MemoryInteractiveCache::new(
        CacheOptions::builder()
            .ttl(Duration::from_secs(10))
            .build(),
    )
    .unwrap();
    let key = CounterKey::new("article", 12);

    cache.set(&key, &CounterRecord::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(8)).await;
    cache.set(&key, &CounterRecord::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(cache.get(&key).await.unwrap().is_some());

    let other = CounterKey::new("article", 13);
    cache.set(&other, &CounterRecord::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.purge_expired(), 1);
    assert!(cache.get(&other).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_set_races_deltas() {
    crate::cache::conformance::set_races_deltas(MemoryInteractiveCache::default(), "article").await;
}

#[tokio::test]
async fn test_overflow_is_refused() {
    let cache = MemoryInteractiveCache::default();
    crate::cache::conformance::overflow_is_refused(&cache, "article").await;
}

#[test]
fn test_unusable_ttl_rejected() {
    use std::time::Duration;

    for ttl in [Duration::ZERO, Duration::from_millis(999)] {
        let opts = CacheOptions::builder().ttl(ttl).build();
        assert!(matches!(
            MemoryInteractiveCache::new(opts),
            Err(CacheError::InvalidTtl(t)) if t == ttl
        ));
    }
}
