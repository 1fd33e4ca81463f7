use crate::core::{EntityTypeId, KeyTuple};
use std::collections::{HashMap, HashSet};

/// Keys handed out during one generation session, per entity type, in the
/// order they were handed out.
///
/// The sequence for a type doubles as its counter: the next sequential key
/// is always `len + 1`, whatever values were stored out of band.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: HashMap<EntityTypeId, KeySequence>,
}

#[derive(Debug, Clone, Default)]
struct KeySequence {
    order: Vec<KeyTuple>,
    index: HashSet<KeyTuple>,
}

impl KeySequence {
    fn truncate(&mut self, len: usize) {
        if len >= self.order.len() {
            return;
        }
        self.order.truncate(len);
        // A key may have been recorded twice, so rebuild instead of removing.
        self.index = self.order.iter().cloned().collect();
    }
}

/// Per-type sequence lengths captured by [`KeyRegistry::checkpoint`].
#[derive(Debug, Clone)]
pub struct RegistryCheckpoint {
    lengths: HashMap<EntityTypeId, usize>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self, entity_type: &EntityTypeId) -> &[KeyTuple] {
        self.keys
            .get(entity_type)
            .map(|seq| seq.order.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, entity_type: &EntityTypeId) -> usize {
        self.keys(entity_type).len()
    }

    pub fn is_empty(&self, entity_type: &EntityTypeId) -> bool {
        self.keys(entity_type).is_empty()
    }

    pub fn contains(&self, entity_type: &EntityTypeId, key: &KeyTuple) -> bool {
        self.keys
            .get(entity_type)
            .is_some_and(|seq| seq.index.contains(key))
    }

    pub fn latest(&self, entity_type: &EntityTypeId) -> Option<&KeyTuple> {
        self.keys(entity_type).last()
    }

    /// Types with at least one recorded key, sorted by name.
    pub fn types(&self) -> Vec<&EntityTypeId> {
        let mut types: Vec<_> = self
            .keys
            .iter()
            .filter(|(_, seq)| !seq.order.is_empty())
            .map(|(id, _)| id)
            .collect();
        types.sort();
        types
    }

    pub fn checkpoint(&self) -> RegistryCheckpoint {
        RegistryCheckpoint {
            lengths: self
                .keys
                .iter()
                .map(|(id, seq)| (id.clone(), seq.order.len()))
                .collect(),
        }
    }

    /// Forget every key recorded since `checkpoint` was taken.
    pub fn rollback(&mut self, checkpoint: &RegistryCheckpoint) {
        for (id, seq) in self.keys.iter_mut() {
            seq.truncate(checkpoint.lengths.get(id).copied().unwrap_or(0));
        }
    }

    pub(crate) fn next_sequence(&self, entity_type: &EntityTypeId) -> i64 {
        self.len(entity_type) as i64 + 1
    }

    pub(crate) fn record(&mut self, entity_type: &EntityTypeId, key: KeyTuple) {
        let seq = self.keys.entry(entity_type.clone()).or_default();
        seq.index.insert(key.clone());
        seq.order.push(key);
    }
}
