use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory store for rendered pages. Entries expire `ttl` after they were set
/// and `clear` drops everything at once.
pub struct PageCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, String)>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached body for `key`, if it is still fresh.
    pub fn get(&mut self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&mut self, key: impl Into<String>, body: String) {
        self.set_at(key, body, Instant::now());
    }

    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::info!("Page cache cleared ({} entries)", dropped);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<String> {
        match self.entries.get(key) {
            Some((stored_at, body)) if now.duration_since(*stored_at) < self.ttl => {
                Some(body.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_at(&mut self, key: impl Into<String>, body: String, now: Instant) {
        self.clear_stale(now);
        self.entries.insert(key.into(), (now, body));
    }

    fn clear_stale(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored_at, _)| now.duration_since(*stored_at) < ttl);
    }
}
