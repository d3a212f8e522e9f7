//! Identifier pool
//!
//! The pool is never stored. It is rebuilt from a listing of the cluster each
//! time a decision is needed, and updated in memory while a batch of
//! assignments (the post-delete backfill sweep) is in progress.

use std::collections::{BTreeMap, BTreeSet};

/// Returns the smallest integer in `0..=max_id` that is not in `existing_ids`.
///
/// Returns `None` when every value up to and including `max_id` is taken.
/// Always picking the smallest free value keeps the allocated range dense, so
/// freed identifiers are reused before the pool grows.
pub fn next_free_id(existing_ids: &BTreeSet<u32>, max_id: u32) -> Option<u32> {
    (0..=max_id).find(|id| !existing_ids.contains(id))
}

/// Identifiers currently held, keyed by identifier, with the holder's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPool {
    holders: BTreeMap<u32, String>,
    duplicates: Vec<(u32, String)>,
}

impl AllocationPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pool from observed `(id, holder)` pairs.
    ///
    /// The first holder seen for an identifier keeps it; later holders of the
    /// same identifier are recorded in [`AllocationPool::duplicates`].
    pub fn from_holders<I, S>(observed: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let mut pool = Self::new();
        for (id, holder) in observed {
            let holder = holder.into();
            if pool.holders.contains_key(&id) {
                pool.duplicates.push((id, holder));
            } else {
                pool.holders.insert(id, holder);
            }
        }
        pool
    }

    /// Whether any resource holds `id`.
    pub fn contains(&self, id: u32) -> bool {
        self.holders.contains_key(&id)
    }

    /// Name of the resource holding `id`, if any.
    pub fn holder(&self, id: u32) -> Option<&str> {
        self.holders.get(&id).map(String::as_str)
    }

    /// Held identifiers in ascending order.
    pub fn ids(&self) -> BTreeSet<u32> {
        self.holders.keys().copied().collect()
    }

    /// Number of held identifiers, duplicates not counted.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    /// Whether no identifier is held.
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Identifiers observed on more than one resource while building the pool.
    pub fn duplicates(&self) -> &[(u32, String)] {
        &self.duplicates
    }

    /// Marks `id` as held by `holder`, returning the previous holder.
    pub fn claim(&mut self, id: u32, holder: impl Into<String>) -> Option<String> {
        self.holders.insert(id, holder.into())
    }

    /// Returns `id` to the free set, returning its holder.
    pub fn release(&mut self, id: u32) -> Option<String> {
        self.holders.remove(&id)
    }

    /// Smallest identifier in `0..=max_id` not held by anyone.
    pub fn next_free(&self, max_id: u32) -> Option<u32> {
        next_free_id(&self.ids(), max_id)
    }
}
