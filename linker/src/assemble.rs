//! The assemble context: a three-phase, two-section binary linker.
//!
//! Producers collect objects into the data and rodata orders, the
//! assemble phase turns each object into bytes at a fixed offset, and the
//! link phase patches every registered pointer's emitted bytes with its
//! resolved target offset before concatenating the final file.
//!
//! The output buffer *is* the file: data section first, zero-padded to a
//! 16-byte boundary, then rodata, zero-padded to a 16-byte boundary. No
//! header, no magic, no length prefix.

use std::collections::HashMap;
use std::mem;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::align::{align_to_width, Addr, AssembleAddressContext, SECTION_ALIGNMENT};
use crate::codec;
use crate::data::{BinData, BinId, PointerVariable};
use crate::error::AssembleError;
use crate::graph::ReferenceGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Assembling,
    Linked,
}

/// The two ordered regions of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Data,
    Rodata,
}

/// The surface an object sees while being collected or assembled.
///
/// Re-entrant calls from within an object's `assemble` are expected and
/// safe: they only ever append further to the same ordered lists and the
/// same current-address counter, on a single call stack.
pub trait AssembleContext {
    /// Appends an object to the data-section order. Insertion order is
    /// output order; no reordering is ever performed.
    fn append_to_data_section(&mut self, object: Box<dyn BinData>);

    /// Appends an object to the rodata-section order.
    fn append_to_rodata_section(&mut self, object: Box<dyn BinData>);

    /// Zero-pads up to `alignment`, appends `bytes`, advances the current
    /// address, and reports exactly where the bytes landed.
    ///
    /// Only valid while assembling; only alignments 0, 1, 4, 8, and 16
    /// are accepted.
    fn append_bytes(
        &mut self,
        bytes: &[u8],
        alignment: u32,
    ) -> Result<AssembleAddressContext, AssembleError>;

    /// Records a pointer for link-phase patching, keyed on its current
    /// target state: a targeted pointer enters the reference graph, a
    /// null pointer enters the null set. Re-registration overwrites.
    fn register_pointer(&mut self, pointer: &PointerVariable);

    /// Reverses whichever branch `register_pointer` took for the
    /// pointer's current target state. Idempotent.
    fn remove_pointer(&mut self, pointer: &PointerVariable);

    /// Detaches every pointer currently targeting `target`, leaving those
    /// pointers dangling. Callers must intend to drop or repoint them.
    fn unreference_object(&mut self, target: BinId);

    /// Notes that `id` has been placed at `offset`. The linker calls this
    /// for every top-level object; containers that assemble children
    /// in-line call it for each child so pointers at the child resolve.
    fn record_offset(&mut self, id: BinId, offset: Addr);

    /// The placement of `id`, if it has been assembled.
    fn offset_of(&self, id: BinId) -> Option<Addr>;
}

struct OffsetEvent {
    id: BinId,
    offset: Addr,
}

/// The linker for one output file.
pub struct MipsFile {
    phase: Phase,
    current_section: Section,
    current_address: Addr,
    data_order: Vec<Box<dyn BinData>>,
    rodata_order: Vec<Box<dyn BinData>>,
    chunks: Vec<Vec<u8>>,
    graph: ReferenceGraph,
    offsets: HashMap<BinId, Addr>,
    events: Vec<OffsetEvent>,
    // Set once both section passes have run; the end-of-file padding is
    // final, so no further bytes may land behind it.
    passes_complete: bool,
    linked: Option<Vec<u8>>,
}

impl MipsFile {
    pub fn new() -> Self {
        MipsFile {
            phase: Phase::NotStarted,
            current_section: Section::Data,
            current_address: 0,
            data_order: Vec::new(),
            rodata_order: Vec::new(),
            chunks: Vec::new(),
            graph: ReferenceGraph::new(),
            offsets: HashMap::new(),
            events: Vec::new(),
            passes_complete: false,
            linked: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_section(&self) -> Section {
        self.current_section
    }

    /// Drives every collected object through its assemble step, section
    /// by section, then reconciles pointer records against the offsets
    /// that became known. Triggered once.
    pub fn assemble(&mut self) -> Result<(), AssembleError> {
        if self.phase != Phase::NotStarted {
            return Err(AssembleError::WrongPhase {
                expected: Phase::NotStarted,
                actual: self.phase,
            });
        }
        self.phase = Phase::Assembling;
        self.current_address = 0;

        self.current_section = Section::Data;
        self.assemble_section(Section::Data)?;
        self.pad_to_boundary()?;

        self.current_section = Section::Rodata;
        self.assemble_section(Section::Rodata)?;
        self.pad_to_boundary()?;
        self.passes_complete = true;

        self.reconcile_offsets();

        debug!(
            bytes = self.current_address,
            objects = self.offsets.len(),
            "assembled"
        );
        Ok(())
    }

    /// Concatenates the assembled chunks and patches every resolved
    /// pointer's bytes with the big-endian offset of its target.
    ///
    /// Memoized: repeated calls return the cached buffer. Calling before
    /// any bytes have been assembled is a contract violation.
    pub fn get_linked_file(&mut self) -> Result<&[u8], AssembleError> {
        if self.linked.is_none() {
            let buffer = self.link()?;
            self.linked = Some(buffer);
            self.phase = Phase::Linked;
        }
        self.linked.as_deref().ok_or(AssembleError::NothingAssembled)
    }

    fn link(&self) -> Result<Vec<u8>, AssembleError> {
        if self.chunks.is_empty() {
            return Err(AssembleError::NothingAssembled);
        }

        let unresolved = self.graph.unresolved();
        if !unresolved.is_empty() {
            // Matches the original toolchain: a target that was never
            // assembled resolves to offset 0 rather than failing the link.
            warn!(
                "{} pointer(s) target objects that were never assembled, linking as zero: {}",
                unresolved.len(),
                unresolved.iter().sorted().join(", ")
            );
        }

        let mut buffer = self.chunks.concat();
        for (_, record) in self.graph.records() {
            if let Some(pointed_to_offset) = record.pointed_to_offset {
                codec::patch_u32(&mut buffer, record.own_offset as usize, pointed_to_offset);
            }
        }

        debug!(bytes = buffer.len(), "linked");
        Ok(buffer)
    }

    fn assemble_section(&mut self, section: Section) -> Result<(), AssembleError> {
        // Objects appended re-entrantly during the pass land back on the
        // section's order list and are drained on the next time around.
        loop {
            let batch = match section {
                Section::Data => mem::take(&mut self.data_order),
                Section::Rodata => mem::take(&mut self.rodata_order),
            };
            if batch.is_empty() {
                break;
            }
            for mut object in batch {
                object.assemble(self)?;
                self.record_offset(object.id(), object.base_offset());
            }
        }
        Ok(())
    }

    fn pad_to_boundary(&mut self) -> Result<(), AssembleError> {
        let aligned = align_to_width(self.current_address, SECTION_ALIGNMENT)?;
        let padding = (aligned - self.current_address) as usize;
        if padding > 0 {
            self.chunks.push(vec![0x00; padding]);
        }
        self.current_address = aligned;
        Ok(())
    }

    /// Consumes the offset-known events recorded during assembly and
    /// patches the pointer records that target each placed object. This
    /// is the only step that flows offsets into pointers, making the
    /// dependency direction explicit rather than implicit in call order.
    fn reconcile_offsets(&mut self) {
        let events = mem::take(&mut self.events);
        for OffsetEvent { id, offset } in events {
            self.graph.resolve(id, offset);
        }
    }
}

impl Default for MipsFile {
    fn default() -> Self {
        Self::new()
    }
}

impl AssembleContext for MipsFile {
    fn append_to_data_section(&mut self, object: Box<dyn BinData>) {
        self.data_order.push(object);
    }

    fn append_to_rodata_section(&mut self, object: Box<dyn BinData>) {
        self.rodata_order.push(object);
    }

    fn append_bytes(
        &mut self,
        bytes: &[u8],
        alignment: u32,
    ) -> Result<AssembleAddressContext, AssembleError> {
        if self.phase != Phase::Assembling {
            return Err(AssembleError::WrongPhase {
                expected: Phase::Assembling,
                actual: self.phase,
            });
        }
        if self.passes_complete {
            return Err(AssembleError::AppendAfterAssembly);
        }

        let prior_current_address = self.current_address;
        let data_start_address = align_to_width(prior_current_address, alignment)?;
        let padding = (data_start_address - prior_current_address) as usize;
        if padding > 0 {
            self.chunks.push(vec![0x00; padding]);
        }
        self.chunks.push(bytes.to_vec());
        let final_current_address = data_start_address + bytes.len() as Addr;
        self.current_address = final_current_address;

        Ok(AssembleAddressContext {
            prior_current_address,
            data_start_address,
            final_current_address,
        })
    }

    fn register_pointer(&mut self, pointer: &PointerVariable) {
        self.graph
            .register(pointer.id(), pointer.base_offset(), pointer.dereference());
    }

    fn remove_pointer(&mut self, pointer: &PointerVariable) {
        self.graph.remove(pointer.id(), pointer.dereference());
    }

    fn unreference_object(&mut self, target: BinId) {
        self.graph.unreference(target);
    }

    fn record_offset(&mut self, id: BinId, offset: Addr) {
        self.offsets.insert(id, offset);
        self.events.push(OffsetEvent { id, offset });
    }

    fn offset_of(&self, id: BinId) -> Option<Addr> {
        self.offsets.get(&id).copied()
    }
}
