//! Short-lived cache of fully rendered responses.
//!
//! Only used for content that is identical for every viewer (the dashboard
//! shell, the OpenAPI document). Entries older than the TTL are never served.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::body::Bytes;

#[derive(Clone, Debug)]
pub(crate) struct CachedBody {
    pub(crate) content_type: String,
    pub(crate) body: Bytes,
}

struct Entry {
    stored_at: Instant,
    value: CachedBody,
}

pub(crate) struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<CachedBody> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub(crate) fn put(&self, key: impl Into<String>, value: CachedBody) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    /// Returns the cached value for `key`, rendering and storing it on a miss.
    /// `render` returning `None` stores nothing.
    pub(crate) fn get_or_render(
        &self,
        key: &str,
        render: impl FnOnce() -> Option<CachedBody>,
    ) -> Option<CachedBody> {
        if let Some(hit) = self.get(key) {
            return Some(hit);
        }
        let value = render()?;
        self.put(key, value.clone());
        Some(value)
    }
}
