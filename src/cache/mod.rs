//! Response cache keyed by normalized query text.
//!
//! Trivially different phrasings of the same question ("What are your
//! skills?", "what are your  skills") normalize to one key, so a repeat
//! question is answered without another retrieval or generation pass. The
//! designated fallback message is never stored: caching "no good answer"
//! would pin it forever.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::generator::FALLBACK_MESSAGE;

/// Derive the canonical cache key from raw query text: trim, lowercase,
/// collapse whitespace runs, strip trailing punctuation. Applied on both
/// the read and the write path.
pub fn normalize_query(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(&['?', '!', '.'][..])
        .trim_end()
        .to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry bound; the oldest entry is evicted when full. `None` keeps
    /// the cache unbounded, the observed behavior of the original.
    pub max_entries: Option<usize>,
    /// Entry lifetime in seconds; expired entries read as absent. `None`
    /// disables expiry.
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: String,
    created_at: i64,
}

pub struct ResponseCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a previously generated response for `query`.
    pub fn get(&self, query: &str) -> Option<String> {
        let key = normalize_query(query);
        if key.is_empty() {
            return None;
        }

        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };

        if let Some(ttl_secs) = self.config.ttl_secs {
            let expired = entries
                .get(&key)
                .is_some_and(|entry| entry.created_at + (ttl_secs as i64) * 1000 <= now_ms());
            if expired {
                entries.remove(&key);
                return None;
            }
        }

        entries.get(&key).map(|entry| entry.response.clone())
    }

    /// Store a generated response for `query`. The fallback message is
    /// refused, keeping the cache free of "no information found" answers.
    pub fn put(&self, query: &str, response: &str) {
        if response == FALLBACK_MESSAGE {
            return;
        }

        let key = normalize_query(query);
        if key.is_empty() {
            return;
        }

        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if let Some(max_entries) = self.config.max_entries {
            if entries.len() >= max_entries.max(1) && !entries.contains_key(&key) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(k, entry)| (entry.created_at, k.clone()))
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                created_at: now_ms(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
