//! # objscan-formats
//!
//! Bounds-checked decoders for compiled object files, unified behind one
//! read-only [`File`] view:
//! - ELF (Executable and Linkable Format), 32/64-bit, either byte order
//! - Mach-O, 32/64-bit, either byte order, and fat (universal) binaries
//! - PE (Portable Executable) images and plain COFF objects
//!
//! Every read goes through [`cursor::ByteView`], so offsets and counts taken
//! from the input are never trusted.

pub mod cursor;
pub mod detect;
pub mod elf;
pub mod error;
pub mod file;
pub mod index;
pub mod macho;
pub mod pe;
pub mod strtab;
pub mod traits;

pub use detect::{detect_format, BinaryType};
pub use elf::Elf;
pub use error::{LookupError, ParseError};
pub use file::File;
pub use index::SectionIndex;
pub use macho::MachO;
pub use objscan_core::{Architecture, Endianness, Format, Section, Symbol, SymbolKind};
pub use pe::Pe;
pub use traits::BinaryFormat;

/// Turns a raw alignment field into a power of two, with 1 meaning no constraint.
pub(crate) fn normalize_align(align: u64) -> u64 {
    if align.is_power_of_two() {
        align
    } else {
        1
    }
}
