use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Key-value store with per-key TTL. Backs the freshness tokens, rate-limit
/// counters, one-time login codes and cached avatar bytes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value if present and not expired.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores a value, replacing any previous one. `ttl = None` keeps the
    /// entry until overwritten or deleted.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>);

    async fn delete(&self, key: &str);

    /// Fixed-window counter: creates the key with the given window TTL when
    /// absent or expired, increments it otherwise without extending the
    /// window. Returns the post-increment count.
    async fn incr(&self, key: &str, window: Duration) -> u64;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process [`KvStore`]. Expiry is lazy: entries are dropped when touched
/// past their deadline.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut map = self.entries.lock().await;
        match map.get(key) {
            Some(entry) if entry.expired(now) => {
                map.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn incr(&self, key: &str, window: Duration) -> u64 {
        let now = Instant::now();
        let mut map = self.entries.lock().await;
        match map.get_mut(key) {
            Some(entry) if !entry.expired(now) => {
                let current: u64 = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                let next = current + 1;
                entry.value = next.to_string().into_bytes();
                next
            }
            _ => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: b"1".to_vec(),
                        expires_at: Some(now + window),
                    },
                );
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn put_get_delete_roundtrip() {
        let kv = MemoryKv::new();
        kv.put("k", b"v".to_vec(), None).await;
        assert_eq!(kv.get("k").await, Some(b"v".to_vec()));
        kv.delete("k").await;
        assert_eq!(kv.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let kv = MemoryKv::new();
        kv.put("code", b"123456".to_vec(), Some(Duration::from_secs(600)))
            .await;
        advance(Duration::from_secs(599)).await;
        assert!(kv.get("code").await.is_some());
        advance(Duration::from_secs(2)).await;
        assert!(kv.get("code").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn incr_counts_within_a_fixed_window() {
        let kv = MemoryKv::new();
        let window = Duration::from_secs(60);
        for expected in 1..=5u64 {
            assert_eq!(kv.incr("ratelimit:1.2.3.4", window).await, expected);
        }
        // Mid-window increments do not extend the window.
        advance(Duration::from_secs(59)).await;
        assert_eq!(kv.incr("ratelimit:1.2.3.4", window).await, 6);
        advance(Duration::from_secs(2)).await;
        assert_eq!(kv.incr("ratelimit:1.2.3.4", window).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_replaces_value_and_ttl() {
        let kv = MemoryKv::new();
        kv.put("t", b"old".to_vec(), Some(Duration::from_secs(1)))
            .await;
        kv.put("t", b"new".to_vec(), None).await;
        advance(Duration::from_secs(5)).await;
        assert_eq!(kv.get("t").await, Some(b"new".to_vec()));
    }
}
