//! The capability set every format decoder provides.

use objscan_core::{Architecture, Endianness, Format, Section, Symbol};

/// A decoded binary.
///
/// This trait abstracts over the ELF, Mach-O and PE/COFF decoders so the
/// [`File`](crate::File) facade can take their unified tables without
/// knowing which format produced them.
pub trait BinaryFormat {
    /// Returns the concrete format tag.
    fn format(&self) -> Format;

    /// Returns the byte order.
    fn endianness(&self) -> Endianness;

    /// Returns the target architecture.
    fn architecture(&self) -> Architecture;

    /// Returns the entry point address, if any.
    fn entry_point(&self) -> Option<u64>;

    /// Returns the section table, in table order.
    fn sections(&self) -> &[Section];

    /// Returns the regular symbol table, in table order.
    fn symbols(&self) -> &[Symbol];

    /// Returns the dynamic or exported symbols.
    fn dynamic_symbols(&self) -> &[Symbol];
}
