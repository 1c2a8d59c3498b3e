use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::engine::aggregator::{GroupKey, OrderedGroup};

/// Caller-owned display order that survives recomputation.
///
/// Starts from the natural order of the first aggregation; afterwards only explicit moves
/// change it, and [`StableOrderer::merge`] reconciles it with refreshed data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StableOrderer<K> {
    order: Vec<K>,
}

impl<K: Clone + Eq + Hash> StableOrderer<K> {
    pub fn new(natural: impl IntoIterator<Item = K>) -> Self {
        let mut seen = HashSet::new();
        let order = natural
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();
        Self { order }
    }

    pub fn keys(&self) -> &[K] {
        &self.order
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == key)
    }

    /// Move `dragged` to sit directly before `target`.
    ///
    /// Returns `false`, leaving the order untouched, when either key is unknown or both are
    /// the same key.
    pub fn move_before(&mut self, dragged: &K, target: &K) -> bool {
        if dragged == target {
            return false;
        }
        let Some(from) = self.position(dragged) else {
            return false;
        };
        if self.position(target).is_none() {
            return false;
        }

        let key = self.order.remove(from);
        // Looked up again: removal shifts the target left when it sat after `from`.
        let to = self.position(target).unwrap_or(self.order.len());
        self.order.insert(to, key);
        true
    }

    /// Reconcile with the keys of a fresh aggregation: vanished keys are dropped, unseen
    /// keys are appended in their natural order.
    pub fn merge(&mut self, current: impl IntoIterator<Item = K>) {
        let current: Vec<K> = current.into_iter().collect();
        let present: HashSet<&K> = current.iter().collect();

        let before = self.order.len();
        self.order.retain(|key| present.contains(key));
        let dropped = before - self.order.len();

        let mut known: HashSet<K> = self.order.iter().cloned().collect();
        let mut appended = 0;
        for key in current {
            if known.insert(key.clone()) {
                self.order.push(key);
                appended += 1;
            }
        }

        if dropped > 0 || appended > 0 {
            tracing::debug!(dropped, appended, "display order merged with refreshed keys");
        }
    }

    /// Sort `items` by this order. Items whose key is not in the order keep their relative
    /// order and go last.
    pub fn sort_by_key<T>(&self, items: &mut [T], key_of: impl Fn(&T) -> &K) {
        let ranks: HashMap<&K, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(rank, key)| (key, rank))
            .collect();
        items.sort_by_key(|item| ranks.get(key_of(item)).copied().unwrap_or(usize::MAX));
    }
}

impl StableOrderer<GroupKey> {
    /// Merge with the groups of a refreshed report and put them in display order.
    pub fn apply(&mut self, groups: &mut [OrderedGroup]) {
        self.merge(groups.iter().map(|group| group.key.clone()));
        self.sort_by_key(groups, |group| &group.key);
    }
}
