//! ELF header parsing.

use crate::cursor::ByteView;
use crate::ParseError;
use objscan_core::{Architecture, Endianness};

/// ELF magic bytes.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Size of the identification block at the start of the header.
const EI_NIDENT: usize = 16;

/// ELF class (32-bit or 64-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    pub fn is_64(&self) -> bool {
        matches!(self, Self::Elf64)
    }

    /// Size of one section header entry.
    pub fn section_header_size(&self) -> usize {
        match self {
            Self::Elf32 => 40,
            Self::Elf64 => 64,
        }
    }

    /// Size of one symbol table entry.
    pub fn symbol_size(&self) -> usize {
        match self {
            Self::Elf32 => 16,
            Self::Elf64 => 24,
        }
    }
}

/// ELF file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    /// No file type.
    None,
    /// Relocatable file.
    Relocatable,
    /// Executable file.
    Executable,
    /// Shared object file.
    SharedObject,
    /// Core file.
    Core,
    /// Other type.
    Other(u16),
}

impl From<u16> for ElfType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Relocatable,
            2 => Self::Executable,
            3 => Self::SharedObject,
            4 => Self::Core,
            other => Self::Other(other),
        }
    }
}

// e_machine values
pub const EM_386: u16 = 3;
pub const EM_PPC: u16 = 20;
pub const EM_PPC64: u16 = 21;
pub const EM_ARM: u16 = 40;
pub const EM_IA_64: u16 = 50;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;
pub const EM_RISCV: u16 = 243;

/// Parsed ELF header.
#[derive(Debug, Clone)]
pub struct ElfHeader {
    /// ELF class (32 or 64 bit).
    pub class: ElfClass,
    /// Endianness.
    pub endianness: Endianness,
    /// OS/ABI identification.
    pub osabi: u8,
    /// File type.
    pub file_type: ElfType,
    /// Raw machine field.
    pub e_machine: u16,
    /// Entry point virtual address.
    pub e_entry: u64,
    /// Program header table file offset.
    pub e_phoff: u64,
    /// Section header table file offset.
    pub e_shoff: u64,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Program header table entry size.
    pub e_phentsize: u16,
    /// Program header table entry count.
    pub e_phnum: u16,
    /// Section header table entry size.
    pub e_shentsize: u16,
    /// Section header table entry count.
    pub e_shnum: u16,
    /// Section name string table index.
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// Parse an ELF header from the start of `view`.
    pub fn parse(view: ByteView<'_>) -> Result<Self, ParseError> {
        let ident = view.bytes(0, EI_NIDENT)?;

        if ident[0..4] != ELF_MAGIC {
            return Err(ParseError::invalid_magic("ELF", &ident[0..4]));
        }

        let class = match ident[4] {
            1 => ElfClass::Elf32,
            2 => ElfClass::Elf64,
            other => {
                return Err(ParseError::invalid_structure(
                    "ELF header",
                    4,
                    format!("invalid ELF class: {other}"),
                ))
            }
        };

        let endianness = match ident[5] {
            1 => Endianness::Little,
            2 => Endianness::Big,
            other => {
                return Err(ParseError::invalid_structure(
                    "ELF header",
                    5,
                    format!("invalid data encoding: {other}"),
                ))
            }
        };

        let is_64 = class.is_64();
        let mut r = view.reader(EI_NIDENT, endianness)?;
        let file_type = ElfType::from(r.u16()?);
        let e_machine = r.u16()?;
        let _e_version = r.u32()?;
        let e_entry = r.word(is_64)?;
        let e_phoff = r.word(is_64)?;
        let e_shoff = r.word(is_64)?;
        let e_flags = r.u32()?;
        let _e_ehsize = r.u16()?;
        let e_phentsize = r.u16()?;
        let e_phnum = r.u16()?;
        let e_shentsize = r.u16()?;
        let e_shnum = r.u16()?;
        let e_shstrndx = r.u16()?;

        Ok(Self {
            class,
            endianness,
            osabi: ident[7],
            file_type,
            e_machine,
            e_entry,
            e_phoff,
            e_shoff,
            e_flags,
            e_phentsize,
            e_phnum,
            e_shentsize,
            e_shnum,
            e_shstrndx,
        })
    }

    /// Returns the architecture.
    pub fn architecture(&self) -> Architecture {
        match self.e_machine {
            EM_386 => Architecture::X86,
            EM_X86_64 => Architecture::X86_64,
            EM_ARM => Architecture::Arm,
            EM_AARCH64 => Architecture::Arm64,
            EM_PPC => Architecture::PowerPc,
            EM_PPC64 => Architecture::PowerPc64,
            EM_IA_64 => Architecture::Ia64,
            EM_RISCV if self.class.is_64() => Architecture::RiscV64,
            EM_RISCV => Architecture::RiscV32,
            other => Architecture::Unknown(u32::from(other)),
        }
    }

    /// Offset of the `e_shentsize` field, for error reporting.
    pub(crate) fn shentsize_offset(&self) -> u64 {
        if self.class.is_64() {
            0x3a
        } else {
            0x2e
        }
    }
}
