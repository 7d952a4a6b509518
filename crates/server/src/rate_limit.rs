use std::sync::Arc;
use std::time::Duration;
use storage::KvStore;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_PER_WINDOW: u64 = 5;

/// Fixed-window submission limiter per client IP. Bursts straddling a window
/// edge can briefly exceed the nominal rate; that is accepted, this is abuse
/// mitigation rather than fair scheduling.
#[derive(Clone)]
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn allow(&self, ip: &str) -> bool {
        let count = self.kv.incr(&format!("ratelimit:{ip}"), WINDOW).await;
        count <= MAX_PER_WINDOW
    }
}
