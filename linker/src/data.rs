//! The units the linker manages.
//!
//! Anything that will occupy a contiguous run of bytes in the output file
//! implements [`BinData`]: it declares an alignment and a size, registers
//! itself into a section during collection, and emits its bytes when the
//! linker drives its assemble step. Concrete game-format record types live
//! outside this crate and speak to the linker through these building
//! blocks, usually [`RawBlock`] for payloads and [`PointerVariable`] for
//! cross-references.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::align::{Addr, POINTER_ALIGNMENT, POINTER_SIZE};
use crate::assemble::{AssembleContext, Section};
use crate::codec;
use crate::error::AssembleError;

/// Process-unique identity for one binary data object.
///
/// Used only for reference-graph bookkeeping; never for ordering or
/// addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinId(u32);

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

impl BinId {
    /// Allocates a fresh id from the process-wide counter. Every object
    /// implementing [`BinData`], in this crate or a producer's, takes its
    /// identity from here at construction.
    pub fn new() -> Self {
        BinId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next() -> Self {
        Self::new()
    }
}

impl Display for BinId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// A value that will occupy a contiguous run of bytes in the output file.
///
/// Lifecycle: constructed by a producer, collected exactly once, assembled
/// exactly once; the base offset is fixed permanently by assembly and the
/// object is never mutated afterwards.
pub trait BinData {
    fn id(&self) -> BinId;

    /// Byte-alignment requirement: 0 or 1 for none, else 4, 8, or 16.
    fn alignment(&self) -> u32 {
        0
    }

    /// File-relative offset; zero until assembled.
    fn base_offset(&self) -> Addr;

    /// Byte length, excluding alignment padding.
    fn base_size(&self) -> u32;

    /// Registers this object (and/or its children) into the context's
    /// ordered section lists. No bytes are produced and no offsets are
    /// assigned here.
    fn collect(self: Box<Self>, ctx: &mut dyn AssembleContext);

    /// Emits this object's bytes via `ctx.append_bytes` and records the
    /// resulting start address as its base offset. Must emit exactly
    /// `base_size()` bytes and must not depend on where in the file they
    /// land; address-dependent content is deferred to the link phase.
    fn assemble(&mut self, ctx: &mut dyn AssembleContext) -> Result<(), AssembleError>;
}

/// A leaf object wrapping caller-produced bytes with a declared alignment.
pub struct RawBlock {
    id: BinId,
    section: Section,
    alignment: u32,
    bytes: Vec<u8>,
    base_offset: Addr,
}

impl RawBlock {
    pub fn new(section: Section, bytes: Vec<u8>, alignment: u32) -> Self {
        RawBlock {
            id: BinId::next(),
            section,
            alignment,
            bytes,
            base_offset: 0,
        }
    }

    pub fn data(bytes: Vec<u8>, alignment: u32) -> Self {
        Self::new(Section::Data, bytes, alignment)
    }

    pub fn rodata(bytes: Vec<u8>, alignment: u32) -> Self {
        Self::new(Section::Rodata, bytes, alignment)
    }
}

impl BinData for RawBlock {
    fn id(&self) -> BinId {
        self.id
    }

    fn alignment(&self) -> u32 {
        self.alignment
    }

    fn base_offset(&self) -> Addr {
        self.base_offset
    }

    fn base_size(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn collect(self: Box<Self>, ctx: &mut dyn AssembleContext) {
        match self.section {
            Section::Data => ctx.append_to_data_section(self),
            Section::Rodata => ctx.append_to_rodata_section(self),
        }
    }

    fn assemble(&mut self, ctx: &mut dyn AssembleContext) -> Result<(), AssembleError> {
        let addrs = ctx.append_bytes(&self.bytes, self.alignment)?;
        self.base_offset = addrs.data_start_address;
        Ok(())
    }
}

/// A 4-byte, word-aligned slot whose value, once linked, is the base
/// offset of another object, or zero if it has no target.
///
/// The pointer emits four zero bytes at assemble time and registers itself
/// with the context; the link phase patches the emitted bytes with the
/// resolved target offset. A null pointer stays all-zero and is never
/// patched.
pub struct PointerVariable {
    id: BinId,
    target: Option<BinId>,
    pointed_to_size: u32,
    base_offset: Addr,
}

impl PointerVariable {
    /// A pointer targeting `target`.
    pub fn to(target: &dyn BinData) -> Self {
        PointerVariable {
            id: BinId::next(),
            target: Some(target.id()),
            pointed_to_size: target.base_size(),
            base_offset: 0,
        }
    }

    /// A pointer with no target; links to zero.
    pub fn null() -> Self {
        PointerVariable {
            id: BinId::next(),
            target: None,
            pointed_to_size: 0,
            base_offset: 0,
        }
    }

    /// The target's id, if any.
    pub fn dereference(&self) -> Option<BinId> {
        self.target
    }

    pub fn pointed_to_size(&self) -> u32 {
        self.pointed_to_size
    }
}

impl BinData for PointerVariable {
    fn id(&self) -> BinId {
        self.id
    }

    fn alignment(&self) -> u32 {
        POINTER_ALIGNMENT
    }

    fn base_offset(&self) -> Addr {
        self.base_offset
    }

    fn base_size(&self) -> u32 {
        POINTER_SIZE
    }

    fn collect(self: Box<Self>, ctx: &mut dyn AssembleContext) {
        ctx.append_to_data_section(self);
    }

    fn assemble(&mut self, ctx: &mut dyn AssembleContext) -> Result<(), AssembleError> {
        // Zero now; the link phase patches in the resolved address.
        let addrs = ctx.append_bytes(&[0x00; 4], POINTER_ALIGNMENT)?;
        self.base_offset = addrs.data_start_address;
        ctx.register_pointer(self);
        Ok(())
    }
}

/// A zero-terminated ASCII string payload destined for the rodata section.
pub struct RodataString {
    id: BinId,
    text: String,
    base_offset: Addr,
}

impl RodataString {
    pub fn new(text: &str) -> Self {
        RodataString {
            id: BinId::next(),
            text: text.to_string(),
            base_offset: 0,
        }
    }
}

impl BinData for RodataString {
    fn id(&self) -> BinId {
        self.id
    }

    fn base_offset(&self) -> Addr {
        self.base_offset
    }

    fn base_size(&self) -> u32 {
        // +1 is to count the null-terminator
        (self.text.len() + 1) as u32
    }

    fn collect(self: Box<Self>, ctx: &mut dyn AssembleContext) {
        ctx.append_to_rodata_section(self);
    }

    fn assemble(&mut self, ctx: &mut dyn AssembleContext) -> Result<(), AssembleError> {
        let addrs = ctx.append_bytes(&codec::encode_str_z(&self.text), self.alignment())?;
        self.base_offset = addrs.data_start_address;
        Ok(())
    }
}

/// A string literal and the data-section pointer that claims it.
///
/// Collection splits the pair: the string joins the rodata order and the
/// pointer joins the data order. Pointer semantics are otherwise identical
/// to [`PointerVariable`].
pub struct ClaimedStringPointer {
    pointer: PointerVariable,
    string: Option<RodataString>,
}

impl ClaimedStringPointer {
    pub fn new(text: &str) -> Self {
        let string = RodataString::new(text);
        let pointer = PointerVariable::to(&string);
        ClaimedStringPointer { pointer, string: Some(string) }
    }

    pub fn pointer_id(&self) -> BinId {
        self.pointer.id()
    }

    /// Id of the claimed string, while it is still held (before collection).
    pub fn string_id(&self) -> Option<BinId> {
        self.string.as_ref().map(|s| s.id())
    }
}

impl BinData for ClaimedStringPointer {
    fn id(&self) -> BinId {
        self.pointer.id()
    }

    fn alignment(&self) -> u32 {
        self.pointer.alignment()
    }

    fn base_offset(&self) -> Addr {
        self.pointer.base_offset()
    }

    fn base_size(&self) -> u32 {
        self.pointer.base_size()
    }

    fn collect(self: Box<Self>, ctx: &mut dyn AssembleContext) {
        let ClaimedStringPointer { pointer, string } = *self;
        if let Some(string) = string {
            Box::new(string).collect(ctx);
        }
        Box::new(pointer).collect(ctx);
    }

    fn assemble(&mut self, ctx: &mut dyn AssembleContext) -> Result<(), AssembleError> {
        self.pointer.assemble(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = RawBlock::data(vec![0x00], 0);
        let b = RawBlock::data(vec![0x00], 0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn pointer_carries_target_identity_and_size() {
        let target = RawBlock::data(vec![0x01; 6], 0);
        let pointer = PointerVariable::to(&target);

        assert_eq!(Some(target.id()), pointer.dereference());
        assert_eq!(6, pointer.pointed_to_size());
        assert_eq!(POINTER_SIZE, pointer.base_size());
        assert_eq!(POINTER_ALIGNMENT, pointer.alignment());
        assert_eq!(0, pointer.base_offset());
    }

    #[test]
    fn null_pointer_has_no_target() {
        let pointer = PointerVariable::null();
        assert_eq!(None, pointer.dereference());
        assert_eq!(0, pointer.pointed_to_size());
    }

    #[test]
    fn claimed_string_is_pointer_sized() {
        let claimed = ClaimedStringPointer::new("hi");
        assert_eq!(POINTER_SIZE, claimed.base_size());
        assert!(claimed.string_id().is_some());
        assert_eq!(claimed.pointer_id(), claimed.id());
    }

    #[test]
    fn rodata_string_counts_its_terminator() {
        assert_eq!(3, RodataString::new("hi").base_size());
        assert_eq!(1, RodataString::new("").base_size());
    }
}
