use std::fmt::Display;

/// Namespace prepended to every storage key when none is configured.
pub const DEFAULT_NAMESPACE: &str = "interactive";

/// Identify the counters of one business entity, e.g. `("article", 42)`.
///
/// Two keys with the same `biz` tag and `biz_id` always address the same
/// storage location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub biz: String,
    pub biz_id: i64,
}

impl CounterKey {
    pub fn new(biz: impl Into<String>, biz_id: i64) -> Self {
        Self {
            biz: biz.into(),
            biz_id,
        }
    }

    /// Render the location of this key in the counter store: `<namespace>:<biz>:<biz_id>`.
    pub fn storage_key(&self, namespace: &str) -> String {
        format!("{namespace}:{}:{}", self.biz, self.biz_id)
    }
}

impl Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.biz, self.biz_id)
    }
}

#[test]
fn test_storage_key_layout() {
    let key = CounterKey::new("article", 42);
    assert_eq!(key.storage_key(DEFAULT_NAMESPACE), "interactive:article:42");
    assert_eq!(key.storage_key("staging"), "staging:article:42");
    assert_eq!(key.to_string(), "article:42");
}

#[test]
fn test_equal_keys_share_location() {
    let a = CounterKey::new("video", -7);
    let b = CounterKey::new(String::from("video"), -7);
    assert_eq!(a, b);
    assert_eq!(a.storage_key("ns"), b.storage_key("ns"));
    assert_ne!(
        a.storage_key("ns"),
        CounterKey::new("article", -7).storage_key("ns")
    );
}
