//! A binary assembler/linker for N64 asset files.
//!
//! Objects are collected into two sections (data, then rodata), assembled
//! into a flat big-endian byte stream in collection order, and pointers
//! between objects are patched with resolved offsets in a final link pass.

pub mod align;
pub mod assemble;
pub mod codec;
pub mod data;
pub mod error;

mod graph;

pub use align::{align_to_width, Addr, AssembleAddressContext};
pub use align::{POINTER_ALIGNMENT, POINTER_SIZE, SECTION_ALIGNMENT, WORD_SIZE};
pub use assemble::{AssembleContext, MipsFile, Phase, Section};
pub use data::{BinData, BinId, ClaimedStringPointer, PointerVariable, RawBlock, RodataString};
pub use error::AssembleError;
