use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::key::DEFAULT_NAMESPACE;

/// Shortest TTL accepted. Anything below would leave a bulk write expired on arrival.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Counters live this long after the last bulk write.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Process-wide settings shared by every cache operation.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct CacheOptions {
    #[builder(default = DEFAULT_NAMESPACE.to_string(), setter(into))]
    pub namespace: String,
    #[builder(default = DEFAULT_TTL)]
    pub ttl: Duration,
}

impl CacheOptions {
    /// Check the TTL is at least [`MIN_TTL`] and fits a `PEXPIRE` argument.
    pub fn validate(&self) -> Result<()> {
        self.ttl_millis().map(|_| ())
    }

    /// TTL in whole milliseconds, as sent with `PEXPIRE`.
    pub fn ttl_millis(&self) -> Result<i64> {
        if self.ttl < MIN_TTL {
            return Err(CacheError::InvalidTtl(self.ttl));
        }
        i64::try_from(self.ttl.as_millis()).map_err(|_| CacheError::InvalidTtl(self.ttl))
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[test]
fn test_default_options() {
    let opts = CacheOptions::default();
    assert_eq!(opts.namespace, "interactive");
    assert_eq!(opts.ttl, Duration::from_secs(900));

    let opts = CacheOptions::builder()
        .namespace("test")
        .ttl(Duration::from_secs(1))
        .build();
    assert_eq!(opts.namespace, "test");
    assert_eq!(opts.ttl.as_secs(), 1);
}

#[test]
fn test_ttl_bounds() {
    let with_ttl = |ttl| CacheOptions::builder().ttl(ttl).build();

    assert!(matches!(
        with_ttl(Duration::ZERO).validate(),
        Err(CacheError::InvalidTtl(_))
    ));
    assert!(with_ttl(Duration::from_millis(999)).validate().is_err());
    assert!(with_ttl(Duration::from_secs(u64::MAX)).validate().is_err());

    assert_eq!(with_ttl(Duration::from_secs(1)).ttl_millis().unwrap(), 1000);
    assert_eq!(
        with_ttl(Duration::from_millis(1500)).ttl_millis().unwrap(),
        1500
    );
    assert_eq!(CacheOptions::default().ttl_millis().unwrap(), 900_000);
}
