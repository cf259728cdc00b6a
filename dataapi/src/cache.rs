//! Response cache shared by every API of a client. Each entry lives for the
//! cache time of the API that stored it.

use crate::metrics_defs::{API_CACHE_HIT, API_CACHE_MISS};
use md5::{Digest, Md5};
use moka::Expiry;
use moka::sync::Cache;
use serde_json::Value;
use shared::counter;
use std::time::{Duration, Instant};

pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: String, value: Value, ttl: Duration);
}

/// MD5 hex digest of `url_{url}__params_{params}`; equal URLs and parameters
/// always map to the same key.
pub fn cache_key(url: &str, params_json: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("url_{url}__params_{params_json}").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct MokaResponseCache {
    cache: Cache<String, Entry>,
}

impl MokaResponseCache {
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();

        MokaResponseCache { cache }
    }
}

impl ResponseCache for MokaResponseCache {
    fn get(&self, key: &str) -> Option<Value> {
        let hit = self.cache.get(key).map(|entry| entry.value);
        let metric_def = if hit.is_some() {
            API_CACHE_HIT
        } else {
            API_CACHE_MISS
        };
        counter!(metric_def).increment(1);
        hit
    }

    fn set(&self, key: String, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.cache.insert(key, Entry { value, ttl });
    }
}
