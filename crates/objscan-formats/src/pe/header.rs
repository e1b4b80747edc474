//! DOS, COFF and optional header parsing.

use crate::cursor::ByteView;
use crate::ParseError;
use objscan_core::{Architecture, Endianness};

/// DOS header magic number ("MZ")
pub const DOS_MAGIC: u16 = 0x5A4D;

/// Offset of `e_lfanew` inside the DOS header
pub const DOS_LFANEW_OFFSET: usize = 0x3c;

/// Size of the DOS header
pub const DOS_HEADER_SIZE: usize = 64;

/// PE signature ("PE\0\0")
pub const PE_SIGNATURE: u32 = 0x00004550;

/// Size of the COFF file header
pub const COFF_HEADER_SIZE: usize = 20;

/// Machine types
pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014c;
pub const IMAGE_FILE_MACHINE_IA64: u16 = 0x0200;
pub const IMAGE_FILE_MACHINE_ARM: u16 = 0x01c0;
pub const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x01c4;
pub const IMAGE_FILE_MACHINE_RISCV32: u16 = 0x5032;
pub const IMAGE_FILE_MACHINE_RISCV64: u16 = 0x5064;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM64EC: u16 = 0xA641;
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xAA64;

/// PE32 magic
pub const PE32_MAGIC: u16 = 0x10b;
/// PE32+ (64-bit) magic
pub const PE32PLUS_MAGIC: u16 = 0x20b;

/// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;
pub const IMAGE_NUMBEROF_DIRECTORY_ENTRIES: usize = 16;

/// Returns true for the machine types accepted in a plain COFF object.
pub fn is_coff_machine(machine: u16) -> bool {
    matches!(
        machine,
        IMAGE_FILE_MACHINE_I386
            | IMAGE_FILE_MACHINE_AMD64
            | IMAGE_FILE_MACHINE_ARM
            | IMAGE_FILE_MACHINE_ARMNT
            | IMAGE_FILE_MACHINE_ARM64
            | IMAGE_FILE_MACHINE_ARM64EC
            | IMAGE_FILE_MACHINE_IA64
            | IMAGE_FILE_MACHINE_RISCV32
            | IMAGE_FILE_MACHINE_RISCV64
    )
}

/// DOS Header (64 bytes)
#[derive(Debug, Clone)]
pub struct DosHeader {
    /// Magic number (MZ)
    pub e_magic: u16,
    /// Offset to PE header
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Parse the DOS header at the start of `view`.
    pub fn parse(view: ByteView<'_>) -> Result<Self, ParseError> {
        let header = view.bytes(0, DOS_HEADER_SIZE)?;
        let e_magic = view.u16(0, Endianness::Little)?;
        if e_magic != DOS_MAGIC {
            return Err(ParseError::invalid_magic("MZ", &header[0..2]));
        }

        Ok(Self {
            e_magic,
            e_lfanew: view.u32(DOS_LFANEW_OFFSET, Endianness::Little)?,
        })
    }
}

/// COFF File Header (20 bytes)
#[derive(Debug, Clone)]
pub struct CoffHeader {
    /// Machine type
    pub machine: u16,
    /// Number of sections
    pub number_of_sections: u16,
    /// Time stamp
    pub time_date_stamp: u32,
    /// Pointer to symbol table
    pub pointer_to_symbol_table: u32,
    /// Number of symbols
    pub number_of_symbols: u32,
    /// Size of optional header
    pub size_of_optional_header: u16,
    /// Characteristics
    pub characteristics: u16,
}

impl CoffHeader {
    /// Parse a COFF header at `offset`.
    pub fn parse(view: ByteView<'_>, offset: usize) -> Result<Self, ParseError> {
        let mut r = view.reader(offset, Endianness::Little)?;
        Ok(Self {
            machine: r.u16()?,
            number_of_sections: r.u16()?,
            time_date_stamp: r.u32()?,
            pointer_to_symbol_table: r.u32()?,
            number_of_symbols: r.u32()?,
            size_of_optional_header: r.u16()?,
            characteristics: r.u16()?,
        })
    }

    /// Returns the architecture.
    pub fn architecture(&self) -> Architecture {
        match self.machine {
            IMAGE_FILE_MACHINE_I386 => Architecture::X86,
            IMAGE_FILE_MACHINE_AMD64 => Architecture::X86_64,
            IMAGE_FILE_MACHINE_ARM | IMAGE_FILE_MACHINE_ARMNT => Architecture::Arm,
            IMAGE_FILE_MACHINE_ARM64 | IMAGE_FILE_MACHINE_ARM64EC => Architecture::Arm64,
            IMAGE_FILE_MACHINE_IA64 => Architecture::Ia64,
            IMAGE_FILE_MACHINE_RISCV32 => Architecture::RiscV32,
            IMAGE_FILE_MACHINE_RISCV64 => Architecture::RiscV64,
            other => Architecture::Unknown(u32::from(other)),
        }
    }
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    /// Virtual address
    pub virtual_address: u32,
    /// Size
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }

    /// Returns true if `rva` falls inside the directory.
    pub fn contains(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        (start..start + u64::from(self.size)).contains(&u64::from(rva))
    }
}

/// The fields of the optional header this crate uses.
#[derive(Debug, Clone)]
pub struct OptionalHeader {
    /// Magic (PE32 or PE32+)
    pub magic: u16,
    /// Entry point RVA
    pub address_of_entry_point: u32,
    /// Image base address
    pub image_base: u64,
    /// Section alignment
    pub section_alignment: u32,
    /// File alignment
    pub file_alignment: u32,
    /// Size of image
    pub size_of_image: u32,
    /// Subsystem
    pub subsystem: u16,
    /// Declared number of data directories
    pub number_of_rva_and_sizes: u32,
    /// Data directories present in the header
    pub data_directories: Vec<DataDirectory>,
}

impl OptionalHeader {
    /// Parse the optional header. `view` covers exactly
    /// `size_of_optional_header` bytes.
    pub fn parse(view: ByteView<'_>) -> Result<Self, ParseError> {
        let magic = view.u16(0, Endianness::Little).map_err(|_| {
            ParseError::invalid_structure(
                "PE optional header",
                view.base() as u64,
                "image has no optional header",
            )
        })?;
        let is_64 = match magic {
            PE32_MAGIC => false,
            PE32PLUS_MAGIC => true,
            other => {
                return Err(ParseError::invalid_structure(
                    "PE optional header",
                    view.base() as u64,
                    format!("unknown magic {other:#x}"),
                ))
            }
        };

        let mut r = view.reader(2, Endianness::Little)?;
        // linker version and code/data sizes
        r.skip(14)?;
        let address_of_entry_point = r.u32()?;
        let _base_of_code = r.u32()?;
        let image_base = if is_64 {
            r.u64()?
        } else {
            let _base_of_data = r.u32()?;
            r.u32()?.into()
        };
        let section_alignment = r.u32()?;
        let file_alignment = r.u32()?;
        // OS, image and subsystem versions, Win32VersionValue
        r.skip(16)?;
        let size_of_image = r.u32()?;
        let _size_of_headers = r.u32()?;
        let _checksum = r.u32()?;
        let subsystem = r.u16()?;
        let _dll_characteristics = r.u16()?;
        // stack and heap reserve/commit
        r.skip(if is_64 { 32 } else { 16 })?;
        let _loader_flags = r.u32()?;
        let number_of_rva_and_sizes = r.u32()?;

        let dir_start = r.position() + 2;
        let fits = view.len().saturating_sub(dir_start) / 8;
        let count = (number_of_rva_and_sizes as usize)
            .min(IMAGE_NUMBEROF_DIRECTORY_ENTRIES)
            .min(fits);
        let mut data_directories = Vec::with_capacity(count);
        for i in 0..count {
            let mut d = view.reader(dir_start + i * 8, Endianness::Little)?;
            data_directories.push(DataDirectory {
                virtual_address: d.u32()?,
                size: d.u32()?,
            });
        }

        Ok(Self {
            magic,
            address_of_entry_point,
            image_base,
            section_alignment,
            file_alignment,
            size_of_image,
            subsystem,
            number_of_rva_and_sizes,
            data_directories,
        })
    }

    /// Returns true for a PE32+ header.
    pub fn is_64bit(&self) -> bool {
        self.magic == PE32PLUS_MAGIC
    }

    /// Returns the export directory, if the image declares one.
    pub fn export_directory(&self) -> Option<DataDirectory> {
        self.data_directories
            .get(IMAGE_DIRECTORY_ENTRY_EXPORT)
            .copied()
            .filter(DataDirectory::is_present)
    }
}
