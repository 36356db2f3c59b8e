// Upstream Combination
// Resolves which upstream entries a module set consumes together

use super::options::LineageMatching;
use crate::error::{LineageError, LineageResult};
use crate::key::CompositeKey;
use crate::store::OutputStore;

/// One tuple of upstream entries, one per store, in argument order
#[derive(Debug)]
pub(crate) struct Combination<'a, V> {
    /// Joined key of all sources
    pub key: CompositeKey,
    /// Key of each consumed entry
    pub sources: Vec<&'a CompositeKey>,
    /// Value of each consumed entry
    pub values: Vec<&'a V>,
}

impl<'a, V> Combination<'a, V> {
    fn empty() -> Self {
        Self {
            key: CompositeKey::new(),
            sources: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push(&self, key: CompositeKey, source: &'a CompositeKey, value: &'a V) -> Self {
        let mut sources = self.sources.clone();
        sources.push(source);
        let mut values = self.values.clone();
        values.push(value);
        Self {
            key,
            sources,
            values,
        }
    }
}

/// Result of a cross-product expansion
pub(crate) struct CrossProduct<'a, V> {
    pub combinations: Vec<Combination<'a, V>>,
    /// Key pairs dropped because their lineage diverged
    pub skipped: Vec<(CompositeKey, CompositeKey)>,
}

/// Every entry of every store against every other, in argument order
pub(crate) fn cross<'a, V>(
    stores: &[&'a OutputStore<V>],
    lineage: LineageMatching,
) -> CrossProduct<'a, V> {
    let mut combinations = vec![Combination::empty()];
    let mut skipped = Vec::new();

    for &store in stores {
        let mut next = Vec::with_capacity(combinations.len() * store.len());
        for partial in &combinations {
            for (key, value) in store.iter() {
                let joined = partial.key.join(key);
                if !joined.is_aligned() && lineage == LineageMatching::Aligned {
                    skipped.push((partial.key.clone(), key.clone()));
                    continue;
                }
                next.push(partial.push(joined.into_key(), key, value));
            }
        }
        combinations = next;
    }

    CrossProduct {
        combinations,
        skipped,
    }
}

/// Pair the i-th entry of each store; single-entry stores are broadcast
pub(crate) fn matched<'a, V>(
    set_name: &str,
    stores: &[&'a OutputStore<V>],
    lineage: LineageMatching,
) -> LineageResult<Vec<Combination<'a, V>>> {
    let width = matched_width(set_name, stores)?;
    let mut combinations = Vec::with_capacity(width);

    for position in 0..width {
        let mut combination = Combination::empty();
        for &store in stores {
            let at = if store.len() == 1 { 0 } else { position };
            let (key, value) = store.entry_at(at).ok_or_else(|| {
                LineageError::cardinality(set_name, format!("no entry at position {}", at))
            })?;

            let joined = combination.key.join(key);
            if !joined.is_aligned() && lineage == LineageMatching::Aligned {
                return Err(LineageError::LineageConflict {
                    set_name: set_name.to_string(),
                    left: combination.key,
                    right: key.clone(),
                });
            }
            combination = combination.push(joined.into_key(), key, value);
        }
        combinations.push(combination);
    }

    Ok(combinations)
}

/// Common entry count of the stores that are not broadcast
fn matched_width<V>(set_name: &str, stores: &[&OutputStore<V>]) -> LineageResult<usize> {
    let mut width: Option<usize> = None;

    for store in stores {
        let len = store.len();
        if len == 1 {
            continue;
        }
        match width {
            None => width = Some(len),
            Some(w) if w == len => {}
            Some(w) => {
                return Err(LineageError::cardinality(
                    set_name,
                    format!("cannot pair {} entries with {} entries", w, len),
                ));
            }
        }
    }

    Ok(width.unwrap_or(1))
}
