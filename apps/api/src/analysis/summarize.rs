//! Summarization stage — turns rendered work and education text into a short
//! narrative summary, with a process-wide result cache keyed by the exact
//! input content.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::analysis::prompts::{SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM};
use crate::llm_client::{LlmError, TextGenerator};
use crate::streaming::Emitter;

type Fingerprint = [u8; 32];

struct CacheEntry {
    summary: String,
    last_used: u64,
}

struct CacheInner {
    map: HashMap<Fingerprint, CacheEntry>,
    tick: u64,
}

/// Process-wide summary cache, shared across all sessions. Identical
/// work/education inputs from any session reuse the cached summary without a
/// generator call. Bounded: at capacity the least-recently-used entry is
/// evicted. A racing duplicate generation is tolerated; last write wins.
pub struct SummaryCache {
    inner: Mutex<CacheInner>,
    cap: usize,
}

impl SummaryCache {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                tick: 0,
            }),
            cap,
        }
    }

    /// Content fingerprint of the two stage inputs. A separator byte keeps
    /// ("ab", "c") and ("a", "bc") distinct.
    pub fn fingerprint(work_text: &str, education_text: &str) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(work_text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(education_text.as_bytes());
        hasher.finalize().into()
    }

    pub fn get(&self, key: &Fingerprint) -> Option<String> {
        let mut inner = self.inner.lock().expect("summary cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        inner.map.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.summary.clone()
        })
    }

    pub fn insert(&self, key: Fingerprint, summary: String) {
        if self.cap == 0 {
            return;
        }
        let mut inner = self.inner.lock().expect("summary cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.map.contains_key(&key) && inner.map.len() >= self.cap {
            let evict = inner
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| *k);
            if let Some(stale) = evict {
                inner.map.remove(&stale);
            }
        }

        inner.map.insert(
            key,
            CacheEntry {
                summary,
                last_used: tick,
            },
        );
    }

}

/// What the summarization stage produced and how it got there.
pub struct SummaryOutcome {
    pub text: String,
    pub cache_hit: bool,
    /// True when deltas were already forwarded to the client mid-generation;
    /// the pipeline must not emit the summary text a second time.
    pub streamed_to_client: bool,
}

/// Runs the summarization stage. When `forward` is supplied, generator deltas
/// are pushed to the client as they arrive (incremental delivery); otherwise
/// the summary is produced in one blocking call and the caller handles
/// presentation. Cache hits never invoke the generator.
pub async fn summarize(
    generator: &dyn TextGenerator,
    cache: &SummaryCache,
    work_text: &str,
    education_text: &str,
    forward: Option<&mut Emitter>,
) -> Result<SummaryOutcome, LlmError> {
    let key = SummaryCache::fingerprint(work_text, education_text);
    if let Some(hit) = cache.get(&key) {
        debug!("Summary cache hit");
        return Ok(SummaryOutcome {
            text: hit,
            cache_hit: true,
            streamed_to_client: false,
        });
    }

    let prompt = SUMMARY_PROMPT_TEMPLATE
        .replace("{work}", work_text)
        .replace("{education}", education_text);

    match forward {
        Some(emitter) => {
            let mut stream = generator.generate_stream(&prompt, SUMMARY_SYSTEM).await?;
            let mut text = String::new();
            let mut streamed = false;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if emitter.send(&chunk).await {
                    streamed = true;
                } else if streamed {
                    // Client left mid-summary; keep accumulating for state.
                    warn!("Client disconnected during summary streaming");
                    streamed = false;
                }
                text.push_str(&chunk);
            }
            if text.is_empty() {
                return Err(LlmError::EmptyContent);
            }
            cache.insert(key, text.clone());
            Ok(SummaryOutcome {
                text,
                cache_hit: false,
                streamed_to_client: streamed,
            })
        }
        None => {
            let text = generator.generate(&prompt, SUMMARY_SYSTEM).await?;
            cache.insert(key, text.clone());
            Ok(SummaryOutcome {
                text,
                cache_hit: false,
                streamed_to_client: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Fingerprint {
        let mut k = [0u8; 32];
        k[0] = n;
        k
    }

    fn cache_len(cache: &SummaryCache) -> usize {
        cache.inner.lock().unwrap().map.len()
    }

    #[test]
    fn test_fingerprint_is_stable_and_input_sensitive() {
        let a = SummaryCache::fingerprint("work", "edu");
        let b = SummaryCache::fingerprint("work", "edu");
        let c = SummaryCache::fingerprint("work2", "edu");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_separator_prevents_boundary_collisions() {
        assert_ne!(
            SummaryCache::fingerprint("ab", "c"),
            SummaryCache::fingerprint("a", "bc")
        );
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = SummaryCache::new(4);
        assert!(cache.get(&key(1)).is_none());
        cache.insert(key(1), "summary one".to_string());
        assert_eq!(cache.get(&key(1)), Some("summary one".to_string()));
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let cache = SummaryCache::new(2);
        cache.insert(key(1), "one".to_string());
        cache.insert(key(2), "two".to_string());
        // Touch key 1 so key 2 becomes the LRU entry.
        cache.get(&key(1));
        cache.insert(key(3), "three".to_string());

        assert_eq!(cache_len(&cache), 2);
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn test_cache_overwrite_at_capacity_does_not_evict() {
        let cache = SummaryCache::new(2);
        cache.insert(key(1), "one".to_string());
        cache.insert(key(2), "two".to_string());
        cache.insert(key(1), "one updated".to_string());

        assert_eq!(cache_len(&cache), 2);
        assert_eq!(cache.get(&key(1)), Some("one updated".to_string()));
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn test_zero_capacity_cache_stores_nothing() {
        let cache = SummaryCache::new(0);
        cache.insert(key(1), "one".to_string());
        assert_eq!(cache_len(&cache), 0);
        assert!(cache.get(&key(1)).is_none());
    }
}
