//! Caller-owned cache of built context blocks
//!
//! A context block depends on the index structure and on the ranking that
//! selected its files, so entries are keyed by fingerprint, query and `top_k`.
//! Invalidation works per fingerprint.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub fingerprint: String,
    pub query: String,
    pub top_k: usize,
}

impl ContextKey {
    pub fn new(fingerprint: impl Into<String>, query: impl Into<String>, top_k: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            query: query.into(),
            top_k,
        }
    }
}

#[derive(Debug, Default)]
pub struct ContextCache {
    entries: DashMap<ContextKey, Arc<String>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the `Arc` so the shard lock is not held.
    pub fn get(&self, key: &ContextKey) -> Option<Arc<String>> {
        self.entries.get(key).map(|r| Arc::clone(r.value()))
    }

    pub fn insert(&self, key: ContextKey, context: String) -> Arc<String> {
        let context = Arc::new(context);
        self.entries.insert(key, Arc::clone(&context));
        context
    }

    /// Returns the cached context, building and storing it on a miss.
    /// A failed build stores nothing.
    pub fn get_or_insert_with<F>(&self, key: &ContextKey, build: F) -> Result<Arc<String>>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let context = build()?;
        Ok(self.insert(key.clone(), context))
    }

    /// Drops every entry built from `fingerprint`, whatever its query.
    pub fn invalidate(&self, fingerprint: &str) {
        self.entries.retain(|key, _| key.fingerprint != fingerprint);
    }

    /// Drops every entry not built from `fingerprint`; called on re-index.
    pub fn retain_only(&self, fingerprint: &str) {
        self.entries.retain(|key, _| key.fingerprint == fingerprint);
    }

    pub fn clear(&self) {
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
    use crate::error::TidemarkError;
    use std::cell::Cell;

    #[test]
    fn test_builds_once_per_key() -> anyhow::Result<()> {
        let cache = ContextCache::new();
        let key = ContextKey::new("abc", "billing", 5);
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            Ok("context".to_string())
        };

        let first = cache.get_or_insert_with(&key, build)?;
        let second = cache.get_or_insert_with(&key, build)?;
        assert_eq!(builds.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn test_query_and_top_k_are_part_of_the_key() -> anyhow::Result<()> {
        let cache = ContextCache::new();
        let billing = cache.get_or_insert_with(&ContextKey::new("abc", "billing", 5), || {
            Ok("billing context".to_string())
        })?;
        let shipping = cache.get_or_insert_with(&ContextKey::new("abc", "shipping", 5), || {
            Ok("shipping context".to_string())
        })?;
        let narrow = cache.get_or_insert_with(&ContextKey::new("abc", "billing", 1), || {
            Ok("narrow context".to_string())
        })?;

        assert_eq!(billing.as_str(), "billing context");
        assert_eq!(shipping.as_str(), "shipping context");
        assert_eq!(narrow.as_str(), "narrow context");
        assert_eq!(cache.len(), 3);
        Ok(())
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = ContextCache::new();
        let key = ContextKey::new("abc", "billing", 5);
        let result = cache.get_or_insert_with(&key, || Err(TidemarkError::Config("boom".into())));
        assert!(result.is_err());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_invalidation_by_fingerprint() {
        let cache = ContextCache::new();
        cache.insert(ContextKey::new("old", "a", 5), "a".into());
        cache.insert(ContextKey::new("old", "b", 5), "b".into());
        cache.insert(ContextKey::new("older", "a", 5), "c".into());
        cache.insert(ContextKey::new("new", "a", 5), "d".into());

        cache.invalidate("old");
        assert_eq!(cache.len(), 2);

        cache.retain_only("new");
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache
                .get(&ContextKey::new("new", "a", 5))
                .as_deref()
                .map(String::as_str),
            Some("d")
        );

        cache.clear();
        assert!(cache.is_empty());
    }
}
