//! SemanticCache — a TTL'd, content-addressed cache in front of the Semantic Extractor so an
//! unchanged entity's feature is never recomputed (or re-billed, for the LLM path).

use rpg_core::graph::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A stored feature plus the time it was written, so expiry can be checked without a second
/// lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    feature: Feature,
    stored_at_secs: u64,
}

/// Persistent key-value cache keyed by a content hash of `(type, name, filePath, parent,
/// sourceCode)`. A disabled cache answers every `get`/`has` with a miss without touching disk.
pub struct SemanticCache {
    path: std::path::PathBuf,
    ttl_secs: u64,
    enabled: bool,
    entries: BTreeMap<String, CacheEntry>,
}

impl SemanticCache {
    /// Load (or initialize empty) the cache file at `project_root/.rpg/semantic_cache.json`.
    pub fn load(project_root: &Path, ttl_secs: u64, enabled: bool) -> Self {
        let path = project_root.join(".rpg").join("semantic_cache.json");
        let entries = if enabled {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default()
        } else {
            BTreeMap::new()
        };
        Self { path, ttl_secs, enabled, entries }
    }

    /// Content-hash key for one entity's identity, independent of its position in the file.
    pub fn content_key(
        entity_type: &str,
        name: &str,
        file_path: &str,
        parent: Option<&str>,
        source_code: Option<&str>,
    ) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        entity_type.hash(&mut hasher);
        name.hash(&mut hasher);
        file_path.hash(&mut hasher);
        parent.hash(&mut hasher);
        source_code.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Whether `key` has a live (non-expired) entry. Always `false` when disabled.
    pub fn has(&self, key: &str, now_secs: u64) -> bool {
        self.enabled && self.entries.get(key).is_some_and(|e| now_secs - e.stored_at_secs < self.ttl_secs)
    }

    /// Fetch a live entry's feature, or `None` on miss/expiry/disabled.
    pub fn get(&self, key: &str, now_secs: u64) -> Option<Feature> {
        if !self.enabled {
            return None;
        }
        let entry = self.entries.get(key)?;
        if now_secs - entry.stored_at_secs >= self.ttl_secs {
            return None;
        }
        Some(entry.feature.clone())
    }

    /// Store (or overwrite) `key`'s feature. No-op when disabled.
    pub fn put(&mut self, key: String, feature: Feature, now_secs: u64) {
        if !self.enabled {
            return;
        }
        self.entries.insert(key, CacheEntry { feature, stored_at_secs: now_secs });
    }

    /// Remove every entry older than the TTL, returning the number purged.
    pub fn purge(&mut self, now_secs: u64) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_secs;
        self.entries.retain(|_, e| now_secs - e.stored_at_secs < ttl);
        before - self.entries.len()
    }

    /// Persist to disk. No-op when disabled.
    pub fn save(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Consult `cache` for `key`; on miss, call `extractor`, store the result, and return it.
pub fn cached_extract<F: FnOnce() -> Feature>(
    cache: &mut SemanticCache,
    key: &str,
    now_secs: u64,
    extractor: F,
) -> Feature {
    if let Some(hit) = cache.get(key, now_secs) {
        return hit;
    }
    let feature = extractor();
    cache.put(key.to_string(), feature.clone(), now_secs);
    feature
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(desc: &str) -> Feature {
        Feature { description: desc.to_string(), keywords: vec![], sub_features: None }
    }

    #[test]
    fn disabled_cache_always_misses() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SemanticCache::load(tmp.path(), 1000, false);
        assert!(!cache.has("k", 0));
        assert!(cache.get("k", 0).is_none());
    }

    #[test]
    fn put_then_get_round_trips_within_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = SemanticCache::load(tmp.path(), 1000, true);
        cache.put("k".to_string(), feature("parse config"), 100);
        assert!(cache.has("k", 500));
        assert_eq!(cache.get("k", 500).unwrap().description, "parse config");
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = SemanticCache::load(tmp.path(), 100, true);
        cache.put("k".to_string(), feature("parse config"), 0);
        assert!(!cache.has("k", 200));
        assert!(cache.get("k", 200).is_none());
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = SemanticCache::load(tmp.path(), 100, true);
        cache.put("fresh".to_string(), feature("a"), 150);
        cache.put("stale".to_string(), feature("b"), 0);
        let purged = cache.purge(200);
        assert_eq!(purged, 1);
        assert!(cache.has("fresh", 200));
        assert!(!cache.has("stale", 200));
    }

    #[test]
    fn cached_extract_calls_extractor_only_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = SemanticCache::load(tmp.path(), 1000, true);
        let mut calls = 0;
        let key = "k".to_string();
        let first = cached_extract(&mut cache, &key, 0, || {
            calls += 1;
            feature("parse config")
        });
        let second = cached_extract(&mut cache, &key, 1, || {
            calls += 1;
            feature("parse config")
        });
        assert_eq!(calls, 1);
        assert_eq!(first.description, second.description);
    }

    #[test]
    fn content_key_is_stable_and_distinguishes_entities() {
        let a = SemanticCache::content_key("function", "fetch", "dog.py", Some("Dog"), Some("def fetch(): pass"));
        let b = SemanticCache::content_key("function", "fetch", "dog.py", Some("Dog"), Some("def fetch(): pass"));
        let c = SemanticCache::content_key("function", "fetch", "cat.py", Some("Dog"), Some("def fetch(): pass"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
