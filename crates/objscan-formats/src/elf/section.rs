//! ELF section header parsing.

use super::header::ElfClass;
use crate::cursor::ByteView;
use crate::ParseError;
use objscan_core::Endianness;

// Section types
pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_HASH: u32 = 5;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOTE: u32 = 7;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;
pub const SHT_DYNSYM: u32 = 11;

/// A raw section header.
#[derive(Debug, Clone)]
pub struct SectionHeader {
    /// Section name (index into string table).
    pub sh_name: u32,
    /// Section type.
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address in memory.
    pub sh_addr: u64,
    /// Offset in file.
    pub sh_offset: u64,
    /// Size in bytes.
    pub sh_size: u64,
    /// Link to another section.
    pub sh_link: u32,
    /// Additional section info.
    pub sh_info: u32,
    /// Address alignment.
    pub sh_addralign: u64,
    /// Entry size (for tables).
    pub sh_entsize: u64,
}

impl SectionHeader {
    /// Parse a section header at `offset`.
    pub fn parse(
        view: ByteView<'_>,
        offset: usize,
        class: ElfClass,
        endianness: Endianness,
    ) -> Result<Self, ParseError> {
        let is_64 = class.is_64();
        let mut r = view.reader(offset, endianness)?;
        Ok(Self {
            sh_name: r.u32()?,
            sh_type: r.u32()?,
            sh_flags: r.word(is_64)?,
            sh_addr: r.word(is_64)?,
            sh_offset: r.word(is_64)?,
            sh_size: r.word(is_64)?,
            sh_link: r.u32()?,
            sh_info: r.u32()?,
            sh_addralign: r.word(is_64)?,
            sh_entsize: r.word(is_64)?,
        })
    }

    /// Returns true if the section has bytes in the file.
    pub fn has_file_data(&self) -> bool {
        self.sh_type != SHT_NULL && self.sh_type != SHT_NOBITS
    }

    /// Returns the section type as a string.
    pub fn type_name(&self) -> &'static str {
        match self.sh_type {
            SHT_NULL => "NULL",
            SHT_PROGBITS => "PROGBITS",
            SHT_SYMTAB => "SYMTAB",
            SHT_STRTAB => "STRTAB",
            SHT_RELA => "RELA",
            SHT_HASH => "HASH",
            SHT_DYNAMIC => "DYNAMIC",
            SHT_NOTE => "NOTE",
            SHT_NOBITS => "NOBITS",
            SHT_REL => "REL",
            SHT_DYNSYM => "DYNSYM",
            _ => "UNKNOWN",
        }
    }
}
