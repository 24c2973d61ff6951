//! Merging chunk results into one index

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Mutex;

/// Final mapping from key to every value produced under it
///
/// Values keep the order in which their chunks were merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Index<K: Eq + Hash, V> {
    entries: HashMap<K, Vec<V>>,
}

impl<K: Eq + Hash, V> Index<K, V> {
    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&[V]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Vec<V>)> {
        self.entries.iter()
    }

    /// Total number of values across all keys
    pub fn value_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Key-sorted view for stable serialization
    pub fn sorted(&self) -> BTreeMap<&K, &Vec<V>>
    where
        K: Ord,
    {
        self.entries.iter().collect()
    }

    pub fn into_inner(self) -> HashMap<K, Vec<V>> {
        self.entries
    }
}

impl<K: Eq + Hash, V> Default for Index<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

struct AggregatorState<K, V> {
    entries: HashMap<K, Vec<V>>,
    pairs_merged: usize,
    chunks_merged: usize,
}

/// Thread-safe accumulator shared by all worker tasks
///
/// A single mutex serializes `merge`; it is held only for the in-memory
/// insert, never across an await. Consuming `finalize` ends mutation.
pub struct ResultAggregator<K, V> {
    state: Mutex<AggregatorState<K, V>>,
}

impl<K: Eq + Hash, V> ResultAggregator<K, V> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AggregatorState {
                entries: HashMap::new(),
                pairs_merged: 0,
                chunks_merged: 0,
            }),
        }
    }

    /// Fold one chunk's pairs into the index
    ///
    /// New keys start a singleton list; existing keys are appended to.
    /// Returns the number of pairs merged.
    pub fn merge(&self, pairs: Vec<(K, V)>) -> usize {
        let merged = pairs.len();
        let mut state = self.lock();
        for (key, value) in pairs {
            state.entries.entry(key).or_default().push(value);
        }
        state.pairs_merged += merged;
        state.chunks_merged += 1;
        merged
    }

    pub fn pairs_merged(&self) -> usize {
        self.lock().pairs_merged
    }

    pub fn chunks_merged(&self) -> usize {
        self.lock().chunks_merged
    }

    /// Take the completed index
    pub fn finalize(self) -> Index<K, V> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Index {
            entries: state.entries,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AggregatorState<K, V>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K: Eq + Hash, V> Default for ResultAggregator<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
