// Output Store
// Ordered mapping from composite key to computed value for one pipeline stage

use crate::error::{LineageError, LineageResult};
use crate::key::{CompositeKey, Segment};

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Values computed by one stage, keyed by their full lineage.
///
/// Entries keep insertion order. `previous_keys` is the sentinel recording the
/// input keys of the application that produced the store; it is `None` only for
/// stores seeded directly from raw inputs.
#[derive(Clone)]
pub struct OutputStore<V> {
    entries: Vec<(CompositeKey, V)>,
    index: HashMap<CompositeKey, usize>,
    previous_keys: Option<Vec<CompositeKey>>,
}

/// A flattened store entry, for tabular export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRecord<V> {
    pub segments: Vec<Segment>,
    pub value: V,
}

impl<V> OutputStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            previous_keys: None,
        }
    }

    /// Build a store from explicit entries, rejecting duplicate keys
    pub fn from_entries<I>(entries: I) -> LineageResult<Self>
    where
        I: IntoIterator<Item = (CompositeKey, V)>,
    {
        let mut store = Self::new();
        for (key, value) in entries {
            store.insert(key, value)?;
        }
        Ok(store)
    }

    /// Single-entry store keyed by `name`
    pub fn singleton(name: impl Into<String>, value: V) -> Self {
        let key = CompositeKey::named(name);
        let mut index = HashMap::new();
        index.insert(key.clone(), 0);
        Self {
            entries: vec![(key, value)],
            index,
            previous_keys: None,
        }
    }

    pub(crate) fn insert(&mut self, key: CompositeKey, value: V) -> LineageResult<()> {
        if self.index.contains_key(&key) {
            return Err(LineageError::KeyCollision { key });
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    /// Insert or replace in place, keeping the original position of a replaced key
    pub(crate) fn upsert(&mut self, key: CompositeKey, value: V) {
        match self.index.get(&key) {
            Some(&idx) => self.entries[idx].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub(crate) fn with_previous_keys(mut self, keys: Vec<CompositeKey>) -> Self {
        let mut seen = HashSet::new();
        let keys = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
        self.previous_keys = Some(keys);
        self
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&V> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.index.contains_key(key)
    }

    /// Number of data entries (the sentinel is not counted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Input keys of the application that produced this store
    pub fn previous_keys(&self) -> Option<&[CompositeKey]> {
        self.previous_keys.as_deref()
    }

    pub fn has_sentinel(&self) -> bool {
        self.previous_keys.is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub(crate) fn entry_at(&self, position: usize) -> Option<(&CompositeKey, &V)> {
        self.entries.get(position).map(|(k, v)| (k, v))
    }

    /// New store holding the entries matching `predicate`; the sentinel is kept
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        V: Clone,
        F: FnMut(&CompositeKey, &V) -> bool,
    {
        let mut store = Self::new();
        for (key, value) in &self.entries {
            if predicate(key, value) {
                store.upsert(key.clone(), value.clone());
            }
        }
        store.previous_keys = self.previous_keys.clone();
        store
    }

    /// Store with the same keys and sentinel but converted values
    pub fn map_values<W, F>(&self, mut f: F) -> OutputStore<W>
    where
        F: FnMut(&V) -> W,
    {
        OutputStore {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
            index: self.index.clone(),
            previous_keys: self.previous_keys.clone(),
        }
    }

    /// Flatten entries into records of key segments and value
    pub fn to_records(&self) -> Vec<StoreRecord<V>>
    where
        V: Clone,
    {
        self.entries
            .iter()
            .map(|(k, v)| StoreRecord {
                segments: k.segments().to_vec(),
                value: v.clone(),
            })
            .collect()
    }
}

// Lineage only: values may be trait objects without Debug
impl<V> fmt::Debug for OutputStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStore")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("previous_keys", &self.previous_keys)
            .finish()
    }
}

impl<V> Default for OutputStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, V> IntoIterator for &'a OutputStore<V> {
    type Item = (&'a CompositeKey, &'a V);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (CompositeKey, V)>,
        fn(&'a (CompositeKey, V)) -> (&'a CompositeKey, &'a V),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let split: fn(&'a (CompositeKey, V)) -> (&'a CompositeKey, &'a V) = |(k, v)| (k, v);
        self.entries.iter().map(split)
    }
}

/// Wrap raw input values into single-entry stores keyed by their names
pub fn init_args<V>(values: Vec<V>, names: &[&str]) -> LineageResult<Vec<OutputStore<V>>> {
    if values.len() != names.len() {
        return Err(LineageError::cardinality(
            "init_args",
            format!("{} values but {} names", values.len(), names.len()),
        ));
    }

    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(*name) {
            return Err(LineageError::KeyCollision {
                key: CompositeKey::named(*name),
            });
        }
    }

    Ok(values
        .into_iter()
        .zip(names)
        .map(|(value, name)| OutputStore::singleton(*name, value))
        .collect())
}
