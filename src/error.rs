use std::time::Duration;

use crate::record::CounterField;

/// Failures surfaced by the counter caches.
///
/// A cache miss is not an error: lookups return `Ok(None)` for it.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("fail to reach counter store: {0}")]
    Transport(#[from] redis::RedisError),
    /// The counters were written but the expiry could not be armed, so the
    /// entry may live without (or with a stale) TTL.
    #[error("counters written to `{key}` but fail to set expiry: {source}")]
    PartialWrite {
        key: String,
        #[source]
        source: redis::RedisError,
    },
    /// The delta would push the counter out of the `i64` range. Nothing was written.
    #[error("{field} of `{key}` would overflow")]
    Overflow { key: String, field: CounterField },
    #[error("ttl must be between 1s and {max_ms}ms, got {0:?}", max_ms = i64::MAX)]
    InvalidTtl(Duration),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[test]
fn test_partial_write_keeps_source() {
    use std::error::Error;

    let err = CacheError::PartialWrite {
        key: "interactive:article:42".to_string(),
        source: redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")),
    };

    let msg = err.to_string();
    assert!(msg.starts_with("counters written to `interactive:article:42`"));
    assert!(msg.contains("connection reset"));

    let source = err.source().expect("partial write must carry its cause");
    let source = source
        .downcast_ref::<redis::RedisError>()
        .expect("cause is the redis error");
    assert_eq!(source.kind(), redis::ErrorKind::IoError);
}

#[test]
fn test_transport_from_redis_error() {
    let err: CacheError =
        redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into();
    assert!(matches!(err, CacheError::Transport(_)));
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn test_overflow_message() {
    let err = CacheError::Overflow {
        key: "interactive:article:1".to_string(),
        field: CounterField::Read,
    };
    assert_eq!(err.to_string(), "read_cnt of `interactive:article:1` would overflow");
}
