use crate::error::Result;
use crate::key::CounterKey;
use crate::record::{CounterField, CounterRecord};

/// What a conditional delta did. Both variants are successful outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// The entry existed and the field was changed.
    Applied,
    /// No entry was cached for the key, nothing was written.
    Skipped,
}

impl DeltaOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A disposable write-through cache of engagement counters.
///
/// Only [`InteractiveCache::set`] creates entries. Deltas are applied to
/// existing entries only, as one atomic step in the storage layer, and never
/// touch the expiry.
#[async_trait::async_trait]
pub trait InteractiveCache: Send + Sync {
    /// Replace all three counters of `key` and re-arm its TTL.
    async fn set(&self, key: &CounterKey, record: &CounterRecord) -> Result<()>;

    /// Read the counters of `key`, or `None` when nothing is cached.
    async fn get(&self, key: &CounterKey) -> Result<Option<CounterRecord>>;

    /// Add `delta` to `field` if an entry for `key` exists.
    async fn incr_if_present(
        &self,
        key: &CounterKey,
        field: CounterField,
        delta: i64,
    ) -> Result<DeltaOutcome>;

    /// Drop the entry of `key`. Returns whether there was one.
    async fn evict(&self, key: &CounterKey) -> Result<bool>;

    async fn incr_read_cnt_if_present(&self, key: &CounterKey) -> Result<DeltaOutcome> {
        self.incr_if_present(key, CounterField::Read, 1).await
    }

    async fn incr_like_cnt_if_present(&self, key: &CounterKey) -> Result<DeltaOutcome> {
        self.incr_if_present(key, CounterField::Like, 1).await
    }

    async fn decr_like_cnt_if_present(&self, key: &CounterKey) -> Result<DeltaOutcome> {
        self.incr_if_present(key, CounterField::Like, -1).await
    }

    async fn incr_collect_cnt_if_present(&self, key: &CounterKey) -> Result<DeltaOutcome> {
        self.incr_if_present(key, CounterField::Collect, 1).await
    }
}

/// Behaviour every [`InteractiveCache`] implementation must show, shared by
/// the tests of each storage layer.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::error::CacheError;

    pub async fn article_scenario<C: InteractiveCache>(cache: &C) {
        let key = CounterKey::new("article", 42);
        let record = CounterRecord {
            biz_id: 42,
            read_cnt: 10,
            like_cnt: 3,
            collect_cnt: 1,
        };

        cache.set(&key, &record).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(record));

        let outcome = cache.incr_collect_cnt_if_present(&key).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::Applied);
        assert_eq!(
            cache.get(&key).await.unwrap(),
            Some(CounterRecord {
                collect_cnt: 2,
                ..record
            })
        );

        let missing = CounterKey::new("article", 99);
        let outcome = cache.decr_like_cnt_if_present(&missing).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::Skipped);
        assert_eq!(cache.get(&missing).await.unwrap(), None);

        assert!(cache.evict(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(!cache.evict(&key).await.unwrap());
    }

    pub async fn deltas_never_create<C: InteractiveCache + Clone + 'static>(cache: &C, biz: &str) {
        let key = CounterKey::new(biz, 1);
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let cache = cache.clone();
            let key = key.clone();
            tasks.spawn(async move {
                match i % 4 {
                    0 => cache.incr_read_cnt_if_present(&key).await,
                    1 => cache.incr_like_cnt_if_present(&key).await,
                    2 => cache.decr_like_cnt_if_present(&key).await,
                    _ => cache.incr_collect_cnt_if_present(&key).await,
                }
            });
        }

        while let Some(outcome) = tasks.join_next().await {
            assert_eq!(outcome.unwrap().unwrap(), DeltaOutcome::Skipped);
        }
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    pub async fn concurrent_reads<C: InteractiveCache + Clone + 'static>(cache: C, biz: &str) {
        const N: i64 = 100;
        let key = CounterKey::new(biz, 7);
        let record = CounterRecord {
            biz_id: 7,
            read_cnt: 5,
            like_cnt: 1,
            collect_cnt: 2,
        };
        cache.set(&key, &record).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..N {
            let cache = cache.clone();
            let key = key.clone();
            tasks.spawn(async move { cache.incr_read_cnt_if_present(&key).await });
        }
        while let Some(outcome) = tasks.join_next().await {
            assert!(outcome.unwrap().unwrap().is_applied());
        }

        let got = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(got.read_cnt, record.read_cnt + N);
        assert_eq!(got.like_cnt, record.like_cnt);
        assert_eq!(got.collect_cnt, record.collect_cnt);

        cache.evict(&key).await.unwrap();
    }

    pub async fn like_balance<C: InteractiveCache + Clone + 'static>(cache: C, biz: &str) {
        let key = CounterKey::new(biz, 3);
        let record = CounterRecord {
            biz_id: 3,
            ..Default::default()
        };
        cache.set(&key, &record).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..7 {
            let cache = cache.clone();
            let key = key.clone();
            tasks.spawn(async move {
                if i % 3 == 1 {
                    cache.decr_like_cnt_if_present(&key).await
                } else {
                    cache.incr_like_cnt_if_present(&key).await
                }
            });
        }
        while let Some(outcome) = tasks.join_next().await {
            outcome.unwrap().unwrap();
        }

        assert_eq!(
            cache.get(&key).await.unwrap(),
            Some(CounterRecord {
                like_cnt: 3,
                ..record
            })
        );

        cache.evict(&key).await.unwrap();
    }

    /// A bulk write racing deltas on the same key ends in a state where the
    /// untouched fields all come from one write and the delta field equals
    /// that write plus some of the deltas.
    pub async fn set_races_deltas<C: InteractiveCache + Clone + 'static>(cache: C, biz: &str) {
        const WRITES: i64 = 20;
        const DELTAS: i64 = 200;
        const STRIDE: i64 = 10_000;

        let key = CounterKey::new(biz, 21);
        let generation = |k: i64| CounterRecord {
            biz_id: 21,
            read_cnt: k * STRIDE,
            like_cnt: k * STRIDE + 1,
            collect_cnt: k * STRIDE + 2,
        };
        cache.set(&key, &generation(0)).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..(WRITES + DELTAS) {
            let cache = cache.clone();
            let key = key.clone();
            tasks.spawn(async move {
                if i % 11 == 5 && i / 11 < WRITES {
                    cache.set(&key, &generation(i / 11 + 1)).await.map(|_| ())
                } else {
                    cache.incr_read_cnt_if_present(&key).await.map(|_| ())
                }
            });
        }
        while let Some(outcome) = tasks.join_next().await {
            outcome.unwrap().unwrap();
        }

        let got = cache.get(&key).await.unwrap().unwrap();
        let k = got.like_cnt / STRIDE;
        assert_eq!(got.like_cnt, k * STRIDE + 1, "mixed record {got:?}");
        assert_eq!(got.collect_cnt, k * STRIDE + 2, "mixed record {got:?}");
        let applied = got.read_cnt - k * STRIDE;
        assert!((0..=DELTAS).contains(&applied), "mixed record {got:?}");

        cache.evict(&key).await.unwrap();
    }

    pub async fn overflow_is_refused<C: InteractiveCache>(cache: &C, biz: &str) {
        let key = CounterKey::new(biz, 64);
        let record = CounterRecord {
            biz_id: 64,
            read_cnt: i64::MAX,
            like_cnt: i64::MIN,
            collect_cnt: 0,
        };
        cache.set(&key, &record).await.unwrap();

        let err = cache.incr_read_cnt_if_present(&key).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Overflow {
                field: CounterField::Read,
                ..
            }
        ));
        let err = cache.decr_like_cnt_if_present(&key).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Overflow {
                field: CounterField::Like,
                ..
            }
        ));
        assert_eq!(cache.get(&key).await.unwrap(), Some(record));

        assert!(cache.incr_collect_cnt_if_present(&key).await.unwrap().is_applied());
        cache.evict(&key).await.unwrap();
    }
}
