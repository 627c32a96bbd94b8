//! Write-through cache of engagement counters (reads, likes, collects) keyed
//! by business entity.
//!
//! Entries are only created by a bulk [`InteractiveCache::set`]; the
//! conditional deltas change existing entries and silently skip absent ones.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod options;
pub mod record;
pub mod redis;
pub mod script;

pub use crate::{
    cache::{DeltaOutcome, InteractiveCache},
    error::{CacheError, Result},
    key::CounterKey,
    memory::MemoryInteractiveCache,
    options::CacheOptions,
    record::{CounterField, CounterRecord},
    redis::RedisInteractiveCache,
};
