//! State-to-lump index
//!
//! Bidirectional map between original and composite state identifiers. Each
//! original state also carries its own Boltzmann weight, computed once while
//! its batch was being lumped, for the transition combiner.

use std::collections::{BTreeSet, HashMap};

use lida_core::{LumpedId, OriginalId};

/// Index entry of one surviving original state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexEntry {
    pub lumped: LumpedId,
    /// Boltzmann population weight of the original state
    pub weight: f64,
}

/// Finalized original <-> composite state index
#[derive(Clone, Debug, Default)]
pub struct StateIndex {
    /// Members per composite id (dense)
    members: Vec<BTreeSet<OriginalId>>,
    forward: HashMap<OriginalId, IndexEntry>,
}

impl StateIndex {
    pub(crate) fn with_capacity(lumps: usize) -> Self {
        StateIndex {
            members: vec![BTreeSet::new(); lumps],
            forward: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, original: OriginalId, lumped: LumpedId, weight: f64) {
        self.members[lumped.index()].insert(original);
        self.forward.insert(original, IndexEntry { lumped, weight });
    }

    /// Composite state an original state was lumped into
    #[inline]
    pub fn lumped_of(&self, original: OriginalId) -> Option<LumpedId> {
        self.forward.get(&original).map(|e| e.lumped)
    }

    /// Full index entry of an original state
    #[inline]
    pub fn entry(&self, original: OriginalId) -> Option<&IndexEntry> {
        self.forward.get(&original)
    }

    /// Original states lumped into a composite state
    pub fn members(&self, lumped: LumpedId) -> Option<&BTreeSet<OriginalId>> {
        self.members.get(lumped.index())
    }

    /// Number of composite states
    pub fn lumped_len(&self) -> usize {
        self.members.len()
    }

    /// Number of original states surviving the filter
    pub fn original_len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate composite ids with their members, in id order
    pub fn iter_lumped(&self) -> impl Iterator<Item = (LumpedId, &BTreeSet<OriginalId>)> {
        (0..)
            .zip(&self.members)
            .map(|(i, m)| (LumpedId::new(i), m))
    }
}
