//! Concurrency-safe entry bookkeeping.
//!
//! [`EntrySet`] backs both the global whitelist and each source's resolved
//! blacklist. Entries map to an occurrence count so overlapping feeds can be
//! merged without losing track of how often a domain was seen.

use std::collections::HashMap;

use parking_lot::RwLock;

/// A thread-safe set of normalized domain entries.
///
/// ```
/// use blackhole::entry::EntrySet;
///
/// let set = EntrySet::new();
/// set.add("ads.example.com");
/// assert!(set.covers("tracker.ads.example.com"));
/// assert!(!set.covers("example.com"));
/// ```
#[derive(Debug, Default)]
pub struct EntrySet {
    inner: RwLock<HashMap<String, u32>>,
}

impl EntrySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from pre-normalized entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::new();
        for entry in entries {
            set.add(entry.as_ref());
        }
        set
    }

    /// Inserts the entry, or bumps its count when already present.
    pub fn add(&self, entry: &str) {
        let mut guard = self.inner.write();
        *guard.entry(entry.to_owned()).or_insert(0) += 1;
    }

    /// Folds every entry of `other` into `self`, summing counts.
    pub fn merge(&self, other: &Self) {
        // Copy the other side first so two set locks are never held at once.
        let pairs: Vec<(String, u32)> = other
            .inner
            .read()
            .iter()
            .map(|(entry, count)| (entry.clone(), *count))
            .collect();
        let mut guard = self.inner.write();
        for (entry, count) in pairs {
            *guard.entry(entry).or_insert(0) += count;
        }
    }

    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.inner.read().contains_key(entry)
    }

    /// Whether the entry itself or any of its parent domains is present.
    ///
    /// `a.b.example.com` is covered by `b.example.com`, `example.com` or
    /// `com`, so a whitelisted parent shields the whole subtree.
    #[must_use]
    pub fn covers(&self, entry: &str) -> bool {
        let guard = self.inner.read();
        if guard.contains_key(entry) {
            return true;
        }
        let mut rest = entry;
        while let Some((_, parent)) = rest.split_once('.') {
            if guard.contains_key(parent) {
                return true;
            }
            rest = parent;
        }
        false
    }

    /// Removes the entry, returning whether it was present.
    pub fn remove(&self, entry: &str) -> bool {
        self.inner.write().remove(entry).is_some()
    }

    /// Occurrence count for the entry, if present.
    #[must_use]
    pub fn count(&self, entry: &str) -> Option<u32> {
        self.inner.read().get(entry).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Sorted copy of the entries, for deterministic rendering.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        let mut entries: Vec<String> = self.inner.read().keys().cloned().collect();
        entries.sort_unstable();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let set = EntrySet::new();
        set.add("example.com");
        set.add("example.com");
        set.add("other.net");

        assert_eq!(set.count("example.com"), Some(2));
        assert_eq!(set.count("other.net"), Some(1));
        assert_eq!(set.count("absent.org"), None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_merge_sums_counts() {
        let left = EntrySet::from_entries(["a.com", "b.com"]);
        let right = EntrySet::new();
        right.add("b.com");
        right.add("b.com");
        right.add("c.com");

        left.merge(&right);

        assert_eq!(left.count("a.com"), Some(1));
        assert_eq!(left.count("b.com"), Some(3));
        assert_eq!(left.count("c.com"), Some(1));
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn test_covers_parent_domains() {
        let set = EntrySet::from_entries(["ytimg.com"]);

        assert!(set.covers("ytimg.com"));
        assert!(set.covers("i1.ytimg.com"));
        assert!(set.covers("s.i1.ytimg.com"));
        assert!(!set.covers("ytimg.com.evil.net"));
        assert!(!set.covers("img.com"));
    }

    #[test]
    fn test_remove() {
        let set = EntrySet::from_entries(["gone.com"]);

        assert!(set.remove("gone.com"));
        assert!(!set.remove("gone.com"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let set = EntrySet::from_entries(["zeta.com", "alpha.com", "mid.org"]);

        assert_eq!(set.snapshot(), vec!["alpha.com", "mid.org", "zeta.com"]);
    }

    #[test]
    fn test_default_set_is_empty() {
        let set = EntrySet::default();

        assert!(set.is_empty());
        assert!(set.snapshot().is_empty());
        assert!(!set.covers("anything.com"));
    }

    #[test]
    fn test_concurrent_adds() {
        use std::sync::Arc;

        let set = Arc::new(EntrySet::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        set.add(&format!("host{}.shard{i}.com", j % 10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 8 shards with 10 distinct hosts each.
        assert_eq!(set.len(), 80);
        assert_eq!(set.count("host0.shard0.com"), Some(10));
    }
}
