//! Mach-O header and fat header parsing.

use crate::cursor::{to_usize, ByteView};
use crate::ParseError;
use objscan_core::{Architecture, Endianness};

// Magic numbers, as read big-endian from the first four bytes
pub const MH_MAGIC: u32 = 0xFEEDFACE; // 32-bit, big-endian file
pub const MH_CIGAM: u32 = 0xCEFAEDFE; // 32-bit, little-endian file
pub const MH_MAGIC_64: u32 = 0xFEEDFACF; // 64-bit, big-endian file
pub const MH_CIGAM_64: u32 = 0xCFFAEDFE; // 64-bit, little-endian file
pub const FAT_MAGIC: u32 = 0xCAFEBABE;
pub const FAT_MAGIC_64: u32 = 0xCAFEBABF;

// CPU types
pub const CPU_ARCH_ABI64: u32 = 0x01000000;
pub const CPU_ARCH_ABI64_32: u32 = 0x02000000;
pub const CPU_TYPE_X86: u32 = 7;
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM: u32 = 12;
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM64_32: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64_32;
pub const CPU_TYPE_POWERPC: u32 = 18;
pub const CPU_TYPE_POWERPC64: u32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

// File types
pub const MH_OBJECT: u32 = 0x1;
pub const MH_EXECUTE: u32 = 0x2;
pub const MH_DYLIB: u32 = 0x6;
pub const MH_DYLINKER: u32 = 0x7;
pub const MH_BUNDLE: u32 = 0x8;
pub const MH_DSYM: u32 = 0xA;
pub const MH_KEXT_BUNDLE: u32 = 0xB;

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Object,
    Execute,
    Dylib,
    Dylinker,
    Bundle,
    Dsym,
    KextBundle,
    Other(u32),
}

impl FileType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            MH_OBJECT => Self::Object,
            MH_EXECUTE => Self::Execute,
            MH_DYLIB => Self::Dylib,
            MH_DYLINKER => Self::Dylinker,
            MH_BUNDLE => Self::Bundle,
            MH_DSYM => Self::Dsym,
            MH_KEXT_BUNDLE => Self::KextBundle,
            other => Self::Other(other),
        }
    }
}

/// Mach-O header.
#[derive(Debug, Clone)]
pub struct MachHeader {
    /// Magic number as read big-endian.
    pub magic: u32,
    /// Byte order selected by the magic.
    pub endianness: Endianness,
    /// Raw CPU type.
    pub cputype: u32,
    /// CPU subtype.
    pub cpusubtype: u32,
    /// File type.
    pub filetype: FileType,
    /// Number of load commands.
    pub ncmds: u32,
    /// Size of all load commands.
    pub sizeofcmds: u32,
    /// Flags.
    pub flags: u32,
}

impl MachHeader {
    /// Parse a Mach-O header from the start of `view`.
    pub fn parse(view: ByteView<'_>) -> Result<Self, ParseError> {
        let magic_bytes = view.array::<4>(0)?;
        let magic = u32::from_be_bytes(magic_bytes);

        let endianness = match magic {
            MH_MAGIC | MH_MAGIC_64 => Endianness::Big,
            MH_CIGAM | MH_CIGAM_64 => Endianness::Little,
            _ => return Err(ParseError::invalid_magic("Mach-O", &magic_bytes)),
        };

        let mut r = view.reader(4, endianness)?;
        let cputype = r.u32()?;
        let cpusubtype = r.u32()?;
        let filetype = FileType::from_u32(r.u32()?);
        let ncmds = r.u32()?;
        let sizeofcmds = r.u32()?;
        let flags = r.u32()?;

        let header = Self {
            magic,
            endianness,
            cputype,
            cpusubtype,
            filetype,
            ncmds,
            sizeofcmds,
            flags,
        };
        if header.is_64bit() {
            // reserved
            r.u32()?;
        }
        Ok(header)
    }

    /// Returns true if this is a 64-bit Mach-O.
    pub fn is_64bit(&self) -> bool {
        self.magic == MH_MAGIC_64 || self.magic == MH_CIGAM_64
    }

    /// Returns the size of the header in bytes.
    pub fn header_size(&self) -> usize {
        if self.is_64bit() {
            32
        } else {
            28
        }
    }

    /// Returns the architecture.
    pub fn architecture(&self) -> Architecture {
        match self.cputype {
            CPU_TYPE_X86_64 => Architecture::X86_64,
            CPU_TYPE_X86 => Architecture::X86,
            CPU_TYPE_ARM64 | CPU_TYPE_ARM64_32 => Architecture::Arm64,
            CPU_TYPE_ARM => Architecture::Arm,
            CPU_TYPE_POWERPC => Architecture::PowerPc,
            CPU_TYPE_POWERPC64 => Architecture::PowerPc64,
            other => Architecture::Unknown(other),
        }
    }
}

/// Fat binary header.
#[derive(Debug)]
pub struct FatHeader {
    /// Architectures in the fat binary, in table order.
    pub architectures: Vec<FatArch>,
}

/// Architecture entry in a fat binary.
#[derive(Debug, Clone)]
pub struct FatArch {
    /// CPU type.
    pub cputype: u32,
    /// CPU subtype.
    pub cpusubtype: u32,
    /// File offset to this architecture.
    pub offset: u64,
    /// Size of this architecture.
    pub size: u64,
    /// Alignment (power of 2).
    pub align: u32,
}

impl FatHeader {
    /// Parse a fat binary header.
    ///
    /// Fat headers are always big-endian. Every entry's slice must lie inside
    /// `view`.
    pub fn parse(view: ByteView<'_>) -> Result<Self, ParseError> {
        let magic_bytes = view.array::<4>(0)?;
        let is_64 = match u32::from_be_bytes(magic_bytes) {
            FAT_MAGIC => false,
            FAT_MAGIC_64 => true,
            _ => return Err(ParseError::invalid_magic("fat Mach-O", &magic_bytes)),
        };

        let nfat_arch = view.u32(4, Endianness::Big)?;
        if nfat_arch == 0 {
            return Err(ParseError::invalid_structure(
                "fat header",
                4,
                "no architectures in fat binary",
            ));
        }

        let entry_size = if is_64 { 32 } else { 20 };
        let count = to_usize(nfat_arch.into(), "fat architecture count")?;
        view.table(8, count, entry_size)?;

        let mut architectures = Vec::with_capacity(count);
        for i in 0..count {
            let mut r = view.reader(8 + i * entry_size, Endianness::Big)?;
            let arch = FatArch {
                cputype: r.u32()?,
                cpusubtype: r.u32()?,
                offset: r.word(is_64)?,
                size: r.word(is_64)?,
                align: r.u32()?,
            };
            view.check_range(arch.offset, arch.size)?;
            log::trace!(
                "fat arch {i}: cputype={:#x} offset={:#x} size={:#x}",
                arch.cputype,
                arch.offset,
                arch.size
            );
            architectures.push(arch);
        }

        Ok(Self { architectures })
    }

    /// Returns the architecture stored first in the file.
    pub fn first_slice(&self) -> Option<&FatArch> {
        self.architectures.iter().min_by_key(|arch| arch.offset)
    }
}
