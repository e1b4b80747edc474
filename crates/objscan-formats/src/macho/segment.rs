//! Mach-O segment and section parsing.

use crate::cursor::{to_usize, ByteView};
use crate::strtab::fixed_name;
use crate::ParseError;
use objscan_core::Endianness;

// Section types (low byte of flags)
pub const SECTION_TYPE: u32 = 0x000000ff;
pub const S_ZEROFILL: u32 = 0x1;
pub const S_GB_ZEROFILL: u32 = 0xc;
pub const S_THREAD_LOCAL_REGULAR: u32 = 0x11;
pub const S_THREAD_LOCAL_ZEROFILL: u32 = 0x12;
pub const S_THREAD_LOCAL_VARIABLES: u32 = 0x13;

// Section attributes
pub const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x80000000;
pub const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x00000400;

/// A Mach-O segment.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment name (up to 16 characters).
    pub segname: String,
    /// Virtual memory address.
    pub vmaddr: u64,
    /// Virtual memory size.
    pub vmsize: u64,
    /// File offset.
    pub fileoff: u64,
    /// File size.
    pub filesize: u64,
    /// Maximum VM protection.
    pub maxprot: u32,
    /// Initial VM protection.
    pub initprot: u32,
    /// Flags.
    pub flags: u32,
    /// Sections in this segment.
    pub sections: Vec<MachSection>,
}

impl Segment {
    /// Size of the segment command before its section headers.
    pub fn command_size(is_64: bool) -> usize {
        if is_64 {
            72
        } else {
            56
        }
    }

    /// Parse a segment command. `cmd` covers exactly `cmdsize` bytes.
    pub fn parse(cmd: ByteView<'_>, endian: Endianness, is_64: bool) -> Result<Self, ParseError> {
        let mut r = cmd.reader(8, endian)?;
        let segname = fixed_name(&r.array::<16>()?);
        let vmaddr = r.word(is_64)?;
        let vmsize = r.word(is_64)?;
        let fileoff = r.word(is_64)?;
        let filesize = r.word(is_64)?;
        let maxprot = r.u32()?;
        let initprot = r.u32()?;
        let nsects = r.u32()?;
        let flags = r.u32()?;

        let header_size = Self::command_size(is_64);
        let section_size = MachSection::size(is_64);
        let room = cmd.len().saturating_sub(header_size);
        let nsects = to_usize(nsects.into(), "section count")?;
        if nsects.checked_mul(section_size).map_or(true, |need| need > room) {
            return Err(ParseError::invalid_structure(
                "Mach-O segment",
                cmd.base() as u64,
                format!("{nsects} sections do not fit in a {} byte command", cmd.len()),
            ));
        }

        let mut sections = Vec::with_capacity(nsects);
        for i in 0..nsects {
            sections.push(MachSection::parse(
                cmd,
                header_size + i * section_size,
                endian,
                is_64,
            )?);
        }

        Ok(Self {
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            flags,
            sections,
        })
    }
}

/// A Mach-O section header.
#[derive(Debug, Clone)]
pub struct MachSection {
    /// Section name (up to 16 characters).
    pub sectname: String,
    /// Segment name this section belongs to.
    pub segname: String,
    /// Virtual memory address.
    pub addr: u64,
    /// Size in bytes.
    pub size: u64,
    /// File offset.
    pub offset: u32,
    /// Alignment exponent.
    pub align: u32,
    /// File offset of relocations.
    pub reloff: u32,
    /// Number of relocations.
    pub nreloc: u32,
    /// Type and attributes.
    pub flags: u32,
}

impl MachSection {
    /// Size of one section header.
    pub fn size(is_64: bool) -> usize {
        if is_64 {
            80
        } else {
            68
        }
    }

    /// Parse a section header at `offset` inside a segment command.
    pub fn parse(
        cmd: ByteView<'_>,
        offset: usize,
        endian: Endianness,
        is_64: bool,
    ) -> Result<Self, ParseError> {
        let mut r = cmd.reader(offset, endian)?;
        Ok(Self {
            sectname: fixed_name(&r.array::<16>()?),
            segname: fixed_name(&r.array::<16>()?),
            addr: r.word(is_64)?,
            size: r.word(is_64)?,
            offset: r.u32()?,
            align: r.u32()?,
            reloff: r.u32()?,
            nreloc: r.u32()?,
            flags: r.u32()?,
        })
    }

    /// Returns the full section name (segment,section).
    pub fn full_name(&self) -> String {
        format!("{},{}", self.segname, self.sectname)
    }

    pub fn section_type(&self) -> u32 {
        self.flags & SECTION_TYPE
    }

    /// Returns true if the section occupies no bytes in the file.
    pub fn is_zerofill(&self) -> bool {
        matches!(
            self.section_type(),
            S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
        )
    }

    pub fn is_thread_local(&self) -> bool {
        matches!(
            self.section_type(),
            S_THREAD_LOCAL_REGULAR | S_THREAD_LOCAL_ZEROFILL | S_THREAD_LOCAL_VARIABLES
        )
    }

    /// Returns true if the section holds machine code.
    pub fn has_instructions(&self) -> bool {
        self.flags & (S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS) != 0
    }
}
