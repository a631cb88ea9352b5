//! Response cache: replays earlier successful replies for commands that
//! are near-duplicates of one seen before.
//!
//! Keys are compared with [`similarity::is_same`], so lookup is a linear
//! scan in insertion order. The cache lives for one session only.

use crate::similarity;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    command: String,
    response: String,
}

/// Insertion-ordered cache with fuzzy lookup and an optional size bound.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Vec<CacheEntry>,
    max_entries: Option<usize>,
}

impl ResponseCache {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that drops its oldest entry once it holds more than `max` entries.
    pub fn bounded(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: Some(max.max(1)),
        }
    }

    pub fn with_limit(max_entries: Option<usize>) -> Self {
        match max_entries {
            Some(max) => Self::bounded(max),
            None => Self::new(),
        }
    }

    /// Response of the first entry whose command is the same as `command`.
    pub fn lookup(&self, command: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| similarity::is_same(&e.command, command))
            .map(|e| e.response.as_str())
    }

    /// Insert, or overwrite the exact key in place.
    pub fn put(&mut self, command: &str, response: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.command == command) {
            entry.response = response.to_string();
            return;
        }
        self.entries.push(CacheEntry {
            command: command.to_string(),
            response: response.to_string(),
        });
        if let Some(max) = self.max_entries {
            if self.entries.len() > max {
                let evicted = self.entries.remove(0);
                tracing::debug!(command = %evicted.command, "evicted cache entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_duplicate_hits() {
        let mut cache = ResponseCache::new();
        cache.put("open chrome", "Opening chrome.");
        assert_eq!(cache.lookup("open chrom"), Some("Opening chrome."));
        assert_eq!(cache.lookup("Open Chrome"), Some("Opening chrome."));
        assert_eq!(cache.lookup("close the window"), None);
    }

    #[test]
    fn first_inserted_match_wins() {
        let mut cache = ResponseCache::new();
        cache.put("open chrome", "first");
        cache.put("open chromes", "second");
        assert_eq!(cache.lookup("open chrome"), Some("first"));
    }

    #[test]
    fn put_overwrites_in_place() {
        let mut cache = ResponseCache::new();
        cache.put("a command", "old");
        cache.put("another thing", "x");
        cache.put("a command", "new");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("a command"), Some("new"));
    }

    #[test]
    fn bounded_evicts_oldest_insertion() {
        let mut cache = ResponseCache::bounded(2);
        cache.put("open chrome", "1");
        cache.put("play some music", "2");
        cache.put("what time is it", "3");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("open chrome"), None);
        assert_eq!(cache.lookup("what time is it"), Some("3"));
    }

    #[test]
    fn unbounded_keeps_everything() {
        let mut cache = ResponseCache::with_limit(None);
        for i in 0..100 {
            cache.put(&format!("entry number {i:03} xyz"), "r");
        }
        assert_eq!(cache.len(), 100);
    }
}
