//! Mach-O load command parsing.

use super::segment::Segment;
use crate::cursor::ByteView;
use crate::ParseError;
use objscan_core::Endianness;

// Load command types
pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_DYSYMTAB: u32 = 0xB;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_MAIN: u32 = 0x80000028;

/// A parsed load command.
#[derive(Debug, Clone)]
pub enum LoadCommand {
    /// LC_SEGMENT or LC_SEGMENT_64
    Segment(Segment),
    /// LC_SYMTAB
    Symtab {
        symoff: u32,
        nsyms: u32,
        stroff: u32,
        strsize: u32,
    },
    /// LC_DYSYMTAB (only the symbol ranges are kept)
    Dysymtab {
        ilocalsym: u32,
        nlocalsym: u32,
        iextdefsym: u32,
        nextdefsym: u32,
        iundefsym: u32,
        nundefsym: u32,
    },
    /// LC_MAIN
    Main { entryoff: u64, stacksize: u64 },
    /// Any other command, skipped.
    Other { cmd: u32, cmdsize: u32 },
}

impl LoadCommand {
    /// Parse one load command. `data` covers exactly `cmdsize` bytes.
    pub fn parse(data: ByteView<'_>, endian: Endianness) -> Result<Self, ParseError> {
        let cmd = data.u32(0, endian)?;
        let cmdsize = data.u32(4, endian)?;

        let min_size = match cmd {
            LC_SEGMENT => Segment::command_size(false),
            LC_SEGMENT_64 => Segment::command_size(true),
            LC_SYMTAB | LC_MAIN => 24,
            LC_DYSYMTAB => 80,
            _ => 8,
        };
        if data.len() < min_size {
            return Err(ParseError::invalid_structure(
                "Mach-O load command",
                data.base() as u64,
                format!("command {cmd:#x} needs {min_size} bytes, cmdsize is {cmdsize}"),
            ));
        }

        let mut r = data.reader(8, endian)?;
        let command = match cmd {
            LC_SEGMENT | LC_SEGMENT_64 => {
                Self::Segment(Segment::parse(data, endian, cmd == LC_SEGMENT_64)?)
            }
            LC_SYMTAB => Self::Symtab {
                symoff: r.u32()?,
                nsyms: r.u32()?,
                stroff: r.u32()?,
                strsize: r.u32()?,
            },
            LC_DYSYMTAB => Self::Dysymtab {
                ilocalsym: r.u32()?,
                nlocalsym: r.u32()?,
                iextdefsym: r.u32()?,
                nextdefsym: r.u32()?,
                iundefsym: r.u32()?,
                nundefsym: r.u32()?,
            },
            LC_MAIN => Self::Main {
                entryoff: r.u64()?,
                stacksize: r.u64()?,
            },
            _ => Self::Other { cmd, cmdsize },
        };
        Ok(command)
    }

    /// Returns a human-readable name for this command type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Segment(_) => "LC_SEGMENT",
            Self::Symtab { .. } => "LC_SYMTAB",
            Self::Dysymtab { .. } => "LC_DYSYMTAB",
            Self::Main { .. } => "LC_MAIN",
            Self::Other { .. } => "LC_OTHER",
        }
    }
}

/// Walks `ncmds` load commands laid out back to back in `region`.
///
/// `region` is the `sizeofcmds` bytes following the header. Each command's
/// `cmdsize` must be at least 8 and must not run past the region.
pub fn parse_load_commands(
    region: ByteView<'_>,
    ncmds: u32,
    endian: Endianness,
) -> Result<Vec<LoadCommand>, ParseError> {
    let mut commands = Vec::new();
    let mut offset = 0usize;

    for i in 0..ncmds {
        let remaining = region.len() - offset;
        if remaining < 8 {
            return Err(ParseError::invalid_structure(
                "Mach-O load command",
                (region.base() + offset) as u64,
                format!("command {i} of {ncmds} starts past the end of sizeofcmds"),
            ));
        }

        let cmdsize = region.u32(offset + 4, endian)? as usize;
        if cmdsize < 8 || cmdsize > remaining {
            return Err(ParseError::invalid_structure(
                "Mach-O load command",
                (region.base() + offset) as u64,
                format!("cmdsize {cmdsize} does not fit the {remaining} remaining bytes"),
            ));
        }

        let command = LoadCommand::parse(region.slice(offset, cmdsize)?, endian)?;
        log::trace!("Mach-O load command {i}: {} ({cmdsize} bytes)", command.name());
        commands.push(command);
        offset += cmdsize;
    }

    Ok(commands)
}
