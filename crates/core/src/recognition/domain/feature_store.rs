use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::feature::FeatureVector;
use super::feature_source::FeatureRecord;

/// Immutable name → feature mapping that remembers first-seen order.
///
/// A name appearing twice keeps its first position and takes the later
/// vector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMap {
    entries: Vec<(String, FeatureVector)>,
    index: HashMap<String, usize>,
}

impl FeatureMap {
    pub fn from_records(records: impl IntoIterator<Item = FeatureRecord>) -> Self {
        let mut map = FeatureMap::default();
        for record in records {
            match map.index.get(&record.name) {
                Some(&i) => map.entries[i].1 = record.feature,
                None => {
                    map.index.insert(record.name.clone(), map.entries.len());
                    map.entries.push((record.name, record.feature));
                }
            }
        }
        map
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureVector> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }
}

/// The live feature database shared by the refresher and identity lanes.
///
/// Writers swap in a whole new [`FeatureMap`]; readers take an `Arc`
/// snapshot, so a reader never observes a half-built mapping.
#[derive(Clone, Default)]
pub struct FeatureStore {
    current: Arc<RwLock<Arc<FeatureMap>>>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<FeatureMap> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replaces the mapping wholesale, returning the new entry count.
    pub fn replace(&self, map: FeatureMap) -> usize {
        let count = map.len();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(map);
        count
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
