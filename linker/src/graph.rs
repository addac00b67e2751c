//! Pointer-reference bookkeeping.
//!
//! The graph stores only ids, never object handles: the forward map pairs
//! each registered pointer with its target, the backward map supports
//! fan-in (many pointers, one target), and the null set tracks pointers
//! with no target at all. The three are mutually exclusive and exhaustive
//! over registered pointers. Alongside them, the record table keeps the
//! per-pointer state the link phase needs to patch emitted bytes.

use std::collections::{HashMap, HashSet};

use crate::align::Addr;
use crate::data::BinId;

/// Link-phase state for one registered pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PointerRecord {
    /// File offset of the pointer's own 4 emitted bytes.
    pub own_offset: Addr,
    /// Target object, if any. Cleared when the target is unreferenced.
    pub target: Option<BinId>,
    /// Target's offset, filled by offset reconciliation.
    pub pointed_to_offset: Option<Addr>,
}

#[derive(Default)]
pub(crate) struct ReferenceGraph {
    forward: HashMap<BinId, BinId>,
    backward: HashMap<BinId, HashSet<BinId>>,
    null_pointers: HashSet<BinId>,
    records: HashMap<BinId, PointerRecord>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a pointer, overwriting any previous registration.
    ///
    /// A targeted pointer leaves the null set and enters the forward and
    /// backward maps; a null pointer does the reverse.
    pub fn register(&mut self, pointer: BinId, own_offset: Addr, target: Option<BinId>) {
        self.drop_forward_entry(pointer);
        match target {
            Some(target) => {
                self.null_pointers.remove(&pointer);
                self.forward.insert(pointer, target);
                self.backward.entry(target).or_insert_with(HashSet::new).insert(pointer);
            }
            None => {
                self.null_pointers.insert(pointer);
            }
        }
        self.records.insert(
            pointer,
            PointerRecord { own_offset, target, pointed_to_offset: None },
        );
    }

    /// Reverses whichever branch `register` took for the pointer's current
    /// target state. Removing an absent registration is a no-op.
    pub fn remove(&mut self, pointer: BinId, target: Option<BinId>) {
        match target {
            Some(_) => self.drop_forward_entry(pointer),
            None => {
                self.null_pointers.remove(&pointer);
            }
        }
        self.records.remove(&pointer);
    }

    /// Removes every pointer currently targeting `target` from the forward
    /// map and clears the backward bucket. The affected records are left
    /// dangling: their target is cleared and they will not be patched.
    pub fn unreference(&mut self, target: BinId) {
        if let Some(bucket) = self.backward.remove(&target) {
            for pointer in bucket {
                self.forward.remove(&pointer);
                if let Some(record) = self.records.get_mut(&pointer) {
                    record.target = None;
                    record.pointed_to_offset = None;
                }
            }
        }
    }

    /// Resolves `pointed_to_offset` for every pointer targeting `target`.
    pub fn resolve(&mut self, target: BinId, offset: Addr) {
        if let Some(bucket) = self.backward.get(&target) {
            for pointer in bucket {
                if let Some(record) = self.records.get_mut(pointer) {
                    record.pointed_to_offset = Some(offset);
                }
            }
        }
    }

    pub fn records(&self) -> impl Iterator<Item = (&BinId, &PointerRecord)> {
        self.records.iter()
    }

    /// Pointers that hold a target whose offset never became known.
    pub fn unresolved(&self) -> Vec<BinId> {
        self.records
            .iter()
            .filter(|(_, record)| record.target.is_some() && record.pointed_to_offset.is_none())
            .map(|(pointer, _)| *pointer)
            .collect()
    }

    fn drop_forward_entry(&mut self, pointer: BinId) {
        if let Some(old_target) = self.forward.remove(&pointer) {
            if let Some(bucket) = self.backward.get_mut(&old_target) {
                bucket.remove(&pointer);
                if bucket.is_empty() {
                    self.backward.remove(&old_target);
                }
            }
        }
    }

    #[cfg(test)]
    fn record(&self, pointer: BinId) -> Option<&PointerRecord> {
        self.records.get(&pointer)
    }
}
