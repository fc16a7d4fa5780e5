use indexmap::IndexMap;
use std::hash::Hash;

/// An ordered collection of parsed records.
///
/// The store keeps records in insertion order. Keyed access comes in two explicit flavours:
///
/// - [RecordStore::index_last_wins] keeps one record per key, a later duplicate replacing the
///   earlier one. This is what pairing two logs by identical key needs.
/// - [RecordStore::group_all] keeps every record per key, in input order.
///
/// In both cases keys are returned in the order they were first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore<R> {
    records: Vec<R>,
}

impl<R> Default for RecordStore<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R> RecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: R) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[R] {
        &self.records
    }

    pub fn into_vec(self) -> Vec<R> {
        self.records
    }

    /// Index the records by key, the last record with a given key wins.
    ///
    /// Records for which `key_fn` returns [None] are not indexed.
    pub fn index_last_wins<K, F>(&self, mut key_fn: F) -> IndexMap<K, &R>
    where
        K: Hash + Eq,
        F: FnMut(&R) -> Option<K>,
    {
        let mut index = IndexMap::with_capacity(self.records.len());
        for record in &self.records {
            if let Some(key) = key_fn(record) {
                // `insert` on an existing key replaces the value in place, keeping first-seen order
                index.insert(key, record);
            }
        }
        index
    }

    /// Group all records by key, retaining every match in input order.
    ///
    /// Records for which `key_fn` returns [None] are not grouped.
    pub fn group_all<K, F>(&self, mut key_fn: F) -> IndexMap<K, Vec<&R>>
    where
        K: Hash + Eq,
        F: FnMut(&R) -> Option<K>,
    {
        let mut groups: IndexMap<K, Vec<&R>> = IndexMap::new();
        for record in &self.records {
            if let Some(key) = key_fn(record) {
                groups.entry(key).or_default().push(record);
            }
        }
        groups
    }
}

impl<R> FromIterator<R> for RecordStore<R> {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<R> Extend<R> for RecordStore<R> {
    fn extend<T: IntoIterator<Item = R>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

impl<'a, R> IntoIterator for &'a RecordStore<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
