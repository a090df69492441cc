use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Which rows of a table a cached list holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Scope {
    pub user_id: String,
    pub family_member_id: Option<String>,
}

impl Scope {
    pub fn user(user_id: &str) -> Self {
        Scope {
            user_id: user_id.to_string(),
            family_member_id: None,
        }
    }

    pub fn member(user_id: &str, family_member_id: &str) -> Self {
        Scope {
            user_id: user_id.to_string(),
            family_member_id: Some(family_member_id.to_string()),
        }
    }
}

/// Last-known-good result for a scope.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<R> {
    pub rows: Vec<R>,
    pub stale: bool,
}

/// Read-through cache for one table. Fetches are tagged with a ticket when
/// they start; a fetch that was overtaken by an invalidation of its user is
/// still stored, but stays stale. Fetches that started before a `clear` are
/// dropped.
pub struct QueryCache<R> {
    entries: DashMap<Scope, CacheEntry<R>>,
    invalidated_at: DashMap<String, u64>,
    clock: AtomicU64,
    cleared_at: AtomicU64,
}

impl<R: Clone> QueryCache<R> {
    pub fn new() -> Self {
        QueryCache {
            entries: DashMap::new(),
            invalidated_at: DashMap::new(),
            clock: AtomicU64::new(0),
            cleared_at: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Rows for `scope` if present and not stale.
    pub fn fresh(&self, scope: &Scope) -> Option<Vec<R>> {
        let entry = self.entries.get(scope)?;
        (!entry.stale).then(|| entry.rows.clone())
    }

    pub fn peek(&self, scope: &Scope) -> Option<CacheEntry<R>> {
        self.entries.get(scope).map(|entry| entry.value().clone())
    }

    pub fn begin_fetch(&self) -> u64 {
        self.tick()
    }

    pub fn complete_fetch(&self, scope: &Scope, ticket: u64, rows: Vec<R>) {
        if ticket <= self.cleared_at.load(Ordering::SeqCst) {
            return;
        }

        let invalidated_at = self
            .invalidated_at
            .get(&scope.user_id)
            .map(|epoch| *epoch.value())
            .unwrap_or(0);
        let stale = ticket <= invalidated_at;
        self.entries.insert(scope.clone(), CacheEntry { rows, stale });
    }

    /// Marks every cached list belonging to `user_id` stale, per-member lists
    /// included, along with any fetch for that user still in flight.
    pub fn invalidate_user(&self, user_id: &str) {
        let now = self.tick();
        self.invalidated_at.insert(user_id.to_string(), now);
        for mut entry in self.entries.iter_mut() {
            if entry.key().user_id == user_id {
                entry.stale = true;
            }
        }
    }

    pub fn clear(&self) {
        let now = self.tick();
        self.cleared_at.store(now, Ordering::SeqCst);
        self.entries.clear();
        self.invalidated_at.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R: Clone> Default for QueryCache<R> {
    fn default() -> Self {
        Self::new()
    }
}
