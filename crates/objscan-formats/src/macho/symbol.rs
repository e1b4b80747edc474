//! Mach-O symbol table parsing.

use super::segment::MachSection;
use crate::cursor::ByteView;
use crate::ParseError;
use objscan_core::{Endianness, Symbol, SymbolKind};

// Symbol type masks
pub const N_STAB: u8 = 0xE0; // Debugging symbol
pub const N_TYPE: u8 = 0x0E; // Type mask

// Symbol types (N_TYPE values)
pub const N_UNDF: u8 = 0x0; // Undefined
pub const N_INDR: u8 = 0xA; // Indirect
pub const N_SECT: u8 = 0xE; // Defined in section

/// A Mach-O symbol table entry (nlist).
#[derive(Debug, Clone)]
pub struct Nlist {
    /// Index into string table.
    pub n_strx: u32,
    /// Type and binding info.
    pub n_type: u8,
    /// Section number, 1-based.
    pub n_sect: u8,
    /// Description.
    pub n_desc: u16,
    /// Symbol value (address).
    pub n_value: u64,
}

impl Nlist {
    /// Size of one entry.
    pub fn size(is_64: bool) -> usize {
        if is_64 {
            16
        } else {
            12
        }
    }

    /// Parse an nlist entry at `offset`.
    pub fn parse(
        view: ByteView<'_>,
        offset: usize,
        endian: Endianness,
        is_64: bool,
    ) -> Result<Self, ParseError> {
        let mut r = view.reader(offset, endian)?;
        Ok(Self {
            n_strx: r.u32()?,
            n_type: r.u8()?,
            n_sect: r.u8()?,
            n_desc: r.u16()?,
            n_value: r.word(is_64)?,
        })
    }

    /// Returns true if this is a debugging symbol.
    pub fn is_stab(&self) -> bool {
        self.n_type & N_STAB != 0
    }

    pub fn type_bits(&self) -> u8 {
        self.n_type & N_TYPE
    }

    /// Returns true if this symbol is undefined.
    pub fn is_undefined(&self) -> bool {
        self.type_bits() == N_UNDF
    }

    /// Returns the section this symbol is defined in.
    ///
    /// `sections` is the flattened section list of the file, in load command
    /// order, which is what `n_sect` counts through.
    pub fn section<'s>(&self, sections: &'s [MachSection]) -> Option<&'s MachSection> {
        if self.type_bits() != N_SECT || self.n_sect == 0 {
            return None;
        }
        sections.get(self.n_sect as usize - 1)
    }

    /// Returns the unified symbol kind.
    pub fn kind(&self, sections: &[MachSection]) -> SymbolKind {
        match self.section(sections) {
            Some(section) if section.is_thread_local() => SymbolKind::Tls,
            Some(section) if section.has_instructions() => SymbolKind::Text,
            Some(_) => SymbolKind::Data,
            None => SymbolKind::Unknown,
        }
    }

    /// Convert to a Symbol at table position `index`.
    pub fn to_symbol(&self, index: usize, name: String, sections: &[MachSection]) -> Symbol {
        Symbol {
            index,
            name,
            // Undefined entries reuse n_value for the common-symbol size,
            // indirect ones for the string index of the aliased name.
            address: if self.is_undefined() || self.type_bits() == N_INDR {
                0
            } else {
                self.n_value
            },
            size: 0,
            kind: self.kind(sections),
        }
    }
}
