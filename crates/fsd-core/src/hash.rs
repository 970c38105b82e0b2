//! Fast hash map and hash set type aliases.
//!
//! Discovery state is keyed by file path strings, which is exactly the case
//! the Fx hash from `rustc-hash` is tuned for. None of these maps are exposed
//! to untrusted input, so denial-of-service resistance is not needed.
//!
//! ```
//! use fsd_core::{FxHashMap, fx_hash_map};
//!
//! let mut groups_per_file: FxHashMap<String, usize> = fx_hash_map();
//! groups_per_file.insert("targets/web.json".to_owned(), 2);
//! assert_eq!(groups_per_file.get("targets/web.json"), Some(&2));
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// Creates a new empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}

/// Creates a new empty [`FxHashSet`].
#[inline]
#[must_use]
pub fn fx_hash_set<V>() -> FxHashSet<V> {
    FxHashSet::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_hash_map_keyed_by_path() {
        let mut map: FxHashMap<&str, usize> = fx_hash_map();
        map.insert("a.yml", 1);
        map.insert("b.json", 3);
        assert_eq!(map.get("b.json"), Some(&3));
        assert_eq!(map.get("c.yaml"), None);
    }

    #[test]
    fn test_fx_hash_set_dedups() {
        let mut set: FxHashSet<&str> = fx_hash_set();
        assert!(set.insert("targets/a.json"));
        assert!(!set.insert("targets/a.json"));
        assert_eq!(set.len(), 1);
    }
}
