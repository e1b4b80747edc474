//! ELF symbol table parsing.

use super::header::ElfClass;
use crate::cursor::ByteView;
use crate::ParseError;
use objscan_core::{Endianness, Symbol, SymbolKind};

// Symbol type (lower 4 bits of st_info)
pub const STT_NOTYPE: u8 = 0;
pub const STT_OBJECT: u8 = 1;
pub const STT_FUNC: u8 = 2;
pub const STT_SECTION: u8 = 3;
pub const STT_FILE: u8 = 4;
pub const STT_COMMON: u8 = 5;
pub const STT_TLS: u8 = 6;
pub const STT_GNU_IFUNC: u8 = 10;

// Special section indices
pub const SHN_UNDEF: u16 = 0;
pub const SHN_XINDEX: u16 = 0xffff;

/// A raw symbol table entry.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    /// Symbol name (index into string table).
    pub st_name: u32,
    /// Symbol info (type and binding).
    pub st_info: u8,
    /// Symbol visibility.
    pub st_other: u8,
    /// Section index.
    pub st_shndx: u16,
    /// Symbol value (address).
    pub st_value: u64,
    /// Symbol size.
    pub st_size: u64,
}

impl SymbolEntry {
    /// Parse a symbol entry at `offset`.
    pub fn parse(
        view: ByteView<'_>,
        offset: usize,
        class: ElfClass,
        endianness: Endianness,
    ) -> Result<Self, ParseError> {
        let mut r = view.reader(offset, endianness)?;
        // The two classes order the fields differently.
        match class {
            ElfClass::Elf32 => {
                let st_name = r.u32()?;
                let st_value = r.u32()?.into();
                let st_size = r.u32()?.into();
                Ok(Self {
                    st_name,
                    st_value,
                    st_size,
                    st_info: r.u8()?,
                    st_other: r.u8()?,
                    st_shndx: r.u16()?,
                })
            }
            ElfClass::Elf64 => Ok(Self {
                st_name: r.u32()?,
                st_info: r.u8()?,
                st_other: r.u8()?,
                st_shndx: r.u16()?,
                st_value: r.u64()?,
                st_size: r.u64()?,
            }),
        }
    }

    /// Returns the `STT_*` type nibble.
    pub fn st_type(&self) -> u8 {
        self.st_info & 0xf
    }

    /// Returns the unified kind for the entry at table position `index`.
    pub fn kind(&self, index: usize) -> SymbolKind {
        match self.st_type() {
            STT_NOTYPE if index == 0 => SymbolKind::Unknown,
            STT_NOTYPE => SymbolKind::Label,
            STT_OBJECT | STT_COMMON => SymbolKind::Data,
            STT_FUNC | STT_GNU_IFUNC => SymbolKind::Text,
            STT_SECTION => SymbolKind::Section,
            STT_FILE => SymbolKind::File,
            STT_TLS => SymbolKind::Tls,
            _ => SymbolKind::Unknown,
        }
    }

    /// Converts this entry to a Symbol.
    pub fn to_symbol(&self, index: usize, name: String) -> Symbol {
        Symbol {
            index,
            name,
            address: self.st_value,
            size: self.st_size,
            kind: self.kind(index),
        }
    }
}
