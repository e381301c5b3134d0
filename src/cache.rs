//! Session-scoped memoization of compile-time results.
//!
//! External references share one entry per resolved target file; inline
//! calls are keyed by containing file and match index and never collide.
//! Inline entries additionally carry a fingerprint of the source snapshot
//! they were computed from, so an entry can never be spliced into text it
//! was not computed against.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Resolved target of an `import.meta.compileTime` reference. Every call
    /// site resolving to the same file shares this entry.
    External(PathBuf),
    /// Inline `compileTime(...)` call, keyed by containing file and match
    /// index.
    Inline(PathBuf, usize),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized literal, or verbatim generated code.
    pub output: String,
    /// Files whose modification invalidates this entry.
    pub dependencies: HashSet<PathBuf>,
    /// Snapshot fingerprint for inline entries; `None` for external entries.
    pub fingerprint: Option<String>,
}

#[derive(Debug, Default)]
pub struct EvalCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl EvalCache {
    pub fn new() -> Self {
        EvalCache::default()
    }

    pub fn compute_fingerprint(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// A stored entry only counts as a hit when its fingerprint matches the
    /// one the caller derived from the current snapshot.
    pub fn get(&self, key: &CacheKey, fingerprint: Option<&str>) -> Option<&CacheEntry> {
        let entry = self.entries.get(key)?;
        if entry.fingerprint.as_deref() != fingerprint {
            return None;
        }
        Some(entry)
    }

    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Drops every entry that tracked `changed` as a dependency. Returns the
    /// number of evicted entries.
    pub fn invalidate(&mut self, changed: &Path) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.dependencies.contains(changed));
        before - self.entries.len()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(output: &str, deps: &[&str], fingerprint: Option<&str>) -> CacheEntry {
        CacheEntry {
            output: output.to_string(),
            dependencies: deps.iter().map(PathBuf::from).collect(),
            fingerprint: fingerprint.map(str::to_string),
        }
    }

    #[test]
    fn test_invalidate_is_selective() {
        let mut cache = EvalCache::new();
        cache.insert(
            CacheKey::External(PathBuf::from("/a.ts")),
            entry("1", &["/a.ts", "/shared.ts"], None),
        );
        cache.insert(
            CacheKey::External(PathBuf::from("/b.ts")),
            entry("2", &["/b.ts"], None),
        );

        assert_eq!(cache.invalidate(Path::new("/shared.ts")), 1);
        assert!(cache
            .get(&CacheKey::External(PathBuf::from("/a.ts")), None)
            .is_none());
        assert!(cache
            .get(&CacheKey::External(PathBuf::from("/b.ts")), None)
            .is_some());
    }

    #[test]
    fn test_fingerprint_mismatch_is_a_miss() {
        let mut cache = EvalCache::new();
        let key = CacheKey::Inline(PathBuf::from("/a.ts"), 0);
        cache.insert(key.clone(), entry("1", &["/a.ts"], Some("old")));

        assert!(cache.get(&key, Some("new")).is_none());
        assert!(cache.get(&key, Some("old")).is_some());
        assert!(cache.get(&key, None).is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut cache = EvalCache::new();
        cache.insert(
            CacheKey::Inline(PathBuf::from("/a.ts"), 0),
            entry("1", &[], None),
        );
        cache.reset();
        assert!(cache.is_empty());
    }
}
