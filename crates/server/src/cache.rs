use std::sync::Arc;
use storage::KvStore;

/// Per-site last-modified token backing conditional GETs on the root
/// listing. Any mutation to a site's comments overwrites its token, which
/// invalidates every cached listing for that site at once. Eventual
/// consistency is fine here: a stale read for a few seconds is acceptable,
/// a wrong write never happens.
#[derive(Clone)]
pub struct FreshnessCache {
    kv: Arc<dyn KvStore>,
}

impl FreshnessCache {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(site_id: &str) -> String {
        format!("cache:site:{site_id}")
    }

    /// The current token for a site, creating one lazily on first read.
    pub async fn ensure(&self, site_id: &str) -> String {
        let key = Self::key(site_id);
        if let Some(bytes) = self.kv.get(&key).await {
            if let Ok(token) = String::from_utf8(bytes) {
                return token;
            }
        }
        let token = http_date_now();
        self.kv.put(&key, token.clone().into_bytes(), None).await;
        token
    }

    /// Overwrites the site's token with the current time. Callers must only
    /// issue this after the store mutation it reflects has committed.
    pub async fn touch(&self, site_id: &str) {
        self.kv
            .put(&Self::key(site_id), http_date_now().into_bytes(), None)
            .await;
    }
}

/// Current time as an HTTP-date string (RFC 7231 IMF-fixdate).
pub fn http_date_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
