//! Catalogue caches — §4.C.
//!
//! Three independent identifier→value mappings (tool name, resource URI,
//! prompt name). Each supports `snapshot`, `replace` (atomic swap, diff by
//! identifier set only), and `get_by_id`. The write lock held across diff
//! computation and swap is what gives invariant 5 (§8): a notification
//! never causes two simultaneous refreshes of the same cache.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Which catalogue a [`Diff`] or refresh pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Tools,
    Resources,
    Prompts,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Tools => "tools",
            CacheKind::Resources => "resources",
            CacheKind::Prompts => "prompts",
        }
    }
}

/// Identifier-set difference between two catalogue snapshots. Reordering
/// with no membership change is not a diff (§4.B).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A single catalogue mapping, keyed by the item's stable identifier.
pub struct CatalogueCache<T> {
    items: RwLock<HashMap<String, T>>,
    last_refreshed: RwLock<Option<DateTime<Utc>>>,
}

impl<T: Clone> CatalogueCache<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            last_refreshed: RwLock::new(None),
        }
    }

    /// Cheap copy of the current contents.
    pub async fn snapshot(&self) -> Vec<T> {
        self.items.read().await.values().cloned().collect()
    }

    /// Atomic swap. Holds the write lock across diff computation and the
    /// swap itself so no half-updated cache is ever visible and no two
    /// replacements can race.
    pub async fn replace(&self, new_items: Vec<(String, T)>) -> Diff {
        let mut items = self.items.write().await;
        let old_keys: HashSet<&String> = items.keys().collect();
        let new_keys: HashSet<&String> = new_items.iter().map(|(id, _)| id).collect();

        let added: Vec<String> = new_keys
            .difference(&old_keys)
            .map(|id| (*id).clone())
            .collect();
        let removed: Vec<String> = old_keys
            .difference(&new_keys)
            .map(|id| (*id).clone())
            .collect();

        *items = new_items.into_iter().collect();
        drop(items);
        *self.last_refreshed.write().await = Some(Utc::now());

        Diff { added, removed }
    }

    pub async fn get_by_id(&self, id: &str) -> Option<T> {
        self.items.read().await.get(id).cloned()
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        *self.last_refreshed.read().await
    }
}

impl<T: Clone> Default for CatalogueCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Notified after any non-initial list-op with the resulting diff; used by
/// the context switcher and by structured logging.
#[async_trait::async_trait]
pub trait CacheObserver: Send + Sync {
    async fn on_cache_updated(&self, kind: CacheKind, diff: Diff);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_reports_added_and_removed_by_identifier() {
        let cache: CatalogueCache<i32> = CatalogueCache::new();
        cache
            .replace(vec![("a".into(), 1), ("b".into(), 2)])
            .await;

        let diff = cache
            .replace(vec![("b".into(), 2), ("c".into(), 3)])
            .await;

        assert_eq!(diff.added, vec!["c".to_string()]);
        assert_eq!(diff.removed, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn reordering_with_no_membership_change_is_not_a_diff() {
        let cache: CatalogueCache<i32> = CatalogueCache::new();
        cache
            .replace(vec![("a".into(), 1), ("b".into(), 2)])
            .await;

        let diff = cache
            .replace(vec![("b".into(), 2), ("a".into(), 1)])
            .await;

        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn snapshot_after_replace_is_a_consistent_list() {
        let cache: CatalogueCache<i32> = CatalogueCache::new();
        cache.replace(vec![("a".into(), 1)]).await;
        assert_eq!(cache.snapshot().await, vec![1]);
        assert_eq!(cache.get_by_id("a").await, Some(1));
        assert_eq!(cache.get_by_id("missing").await, None);
    }
}
