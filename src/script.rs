use lazy_static::lazy_static;

pub const INCR_CNT_LUA: &str = include_str!("lua/incr_cnt.lua");

lazy_static! {
    /// Add a delta to one hash field only when the hash already exists.
    ///
    /// Replies `1` when the delta was applied and `0` when the key was absent.
    /// The expiry of the key is left as is.
    pub static ref INCR_CNT_IF_PRESENT: redis::Script = redis::Script::new(INCR_CNT_LUA);
}

#[test]
fn test_script_never_creates_or_expires() {
    assert!(INCR_CNT_LUA.contains(r#"redis.call("EXISTS", key) == 1"#));
    assert!(INCR_CNT_LUA.contains("HINCRBY"));
    assert!(!INCR_CNT_LUA.contains("EXPIRE"));
    assert!(!INCR_CNT_LUA.contains("HSET"));
}
