use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::config::*;

/// Identity of a source table.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct SourceKey(String);

impl SourceKey {
    /// Key from the content of the source.
    pub fn from_bytes(content: &[u8]) -> SourceKey {
        SourceKey(format!("sha256:{}", sha256::digest(content)))
    }

    /// Key from the location of the source and its modification time.
    pub fn from_path_mtime(path: &str, modified: SystemTime) -> SourceKey {
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        SourceKey(format!("path:{}@{}", path, nanos))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Memoizes derived tables by source identity.
///
/// Entries are written once and shared read-only. A new source gets a new key
/// and a new entry; an existing entry is never replaced.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: RwLock<HashMap<SourceKey, Arc<DerivedTable>>>,
}

impl TableCache {
    pub fn new() -> TableCache {
        TableCache::default()
    }

    pub fn get(&self, key: &SourceKey) -> Option<Arc<DerivedTable>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Returns the table stored under `key`, computing and storing it first if needed.
    /// Errors are not cached.
    pub fn get_or_try_insert<F>(&self, key: SourceKey, compute: F) -> OrdinanceResult<Arc<DerivedTable>>
    where
        F: FnOnce() -> OrdinanceResult<DerivedTable>,
    {
        if let Some(t) = self.get(&key) {
            debug!("TableCache: hit for {}", key.as_str());
            return Ok(t);
        }
        info!("TableCache: computing table for {}", key.as_str());
        let table = Arc::new(compute()?);
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another caller may have filled the entry in the meantime: keep the first one.
        let stored = entries.entry(key).or_insert(table);
        Ok(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn content_keys() {
        assert_eq!(SourceKey::from_bytes(b"abc"), SourceKey::from_bytes(b"abc"));
        assert_ne!(SourceKey::from_bytes(b"abc"), SourceKey::from_bytes(b"abd"));
        assert!(SourceKey::from_bytes(b"abc").as_str().starts_with("sha256:"));
    }

    #[test]
    fn path_keys_change_with_mtime() {
        let t0 = UNIX_EPOCH + Duration::from_secs(10);
        let t1 = UNIX_EPOCH + Duration::from_secs(11);
        assert_ne!(
            SourceKey::from_path_mtime("a.xlsx", t0),
            SourceKey::from_path_mtime("a.xlsx", t1)
        );
    }

    #[test]
    fn computes_once_per_key() {
        let cache = TableCache::new();
        let key = SourceKey::from_bytes(b"data");
        let mut calls = 0;
        let first = cache
            .get_or_try_insert(key.clone(), || {
                calls += 1;
                Ok(DerivedTable::default())
            })
            .unwrap();
        let second = cache
            .get_or_try_insert(key, || {
                calls += 1;
                Ok(DerivedTable::default())
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = TableCache::new();
        let key = SourceKey::from_bytes(b"bad");
        let res = cache.get_or_try_insert(key.clone(), || {
            Err(OrdinanceError::MissingColumns {
                columns: vec!["province".to_string()],
            })
        });
        assert!(res.is_err());
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }
}
