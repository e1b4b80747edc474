//! Mach-O (macOS/iOS) decoder.
//!
//! Supports 32-bit and 64-bit files in either byte order and universal (fat)
//! binaries. For fat binaries the slice stored first in the file is decoded.

mod header;
mod load_command;
mod segment;
mod symbol;

pub use header::{
    FatArch, FatHeader, FileType, MachHeader, FAT_MAGIC, FAT_MAGIC_64, MH_CIGAM, MH_CIGAM_64,
    MH_MAGIC, MH_MAGIC_64,
};
pub use load_command::LoadCommand;
pub use segment::{MachSection, Segment};
pub use symbol::Nlist;

use crate::cursor::{to_usize, ByteView};
use crate::strtab::StringTable;
use crate::{BinaryFormat, ParseError};
use objscan_core::{Architecture, Endianness, Format, Section, Symbol};

/// A parsed Mach-O binary.
#[derive(Debug)]
pub struct MachO {
    /// Offset of the decoded slice in the input (non-zero for fat binaries).
    pub slice_offset: usize,
    /// Parsed Mach-O header.
    pub header: MachHeader,
    /// Load commands.
    pub load_commands: Vec<LoadCommand>,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
    dynamic_symbols: Vec<Symbol>,
}

impl MachO {
    /// Parse a Mach-O file, or the first slice of a fat binary.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let view = ByteView::new(data);
        match view.u32(0, Endianness::Big)? {
            FAT_MAGIC | FAT_MAGIC_64 => Self::parse_fat(view),
            _ => Self::parse_slice(view),
        }
    }

    fn parse_fat(view: ByteView<'_>) -> Result<Self, ParseError> {
        let fat = FatHeader::parse(view)?;
        let arch = fat.first_slice().ok_or_else(|| {
            ParseError::invalid_structure("fat header", 4, "no architectures in fat binary")
        })?;
        log::debug!(
            "fat Mach-O: {} slices, decoding cputype {:#x} at {:#x}",
            fat.architectures.len(),
            arch.cputype,
            arch.offset
        );

        let slice = view.slice(
            to_usize(arch.offset, "fat slice offset")?,
            to_usize(arch.size, "fat slice size")?,
        )?;
        Self::parse_slice(slice)
    }

    /// Parse a thin Mach-O image occupying all of `view`.
    fn parse_slice(view: ByteView<'_>) -> Result<Self, ParseError> {
        let header = MachHeader::parse(view)?;
        let endian = header.endianness;
        let is_64 = header.is_64bit();
        log::debug!(
            "Mach-O {} {:?} cputype={:#x} ncmds={} sizeofcmds={}",
            if is_64 { "64-bit" } else { "32-bit" },
            endian,
            header.cputype,
            header.ncmds,
            header.sizeofcmds
        );

        let region = view.slice(header.header_size(), header.sizeofcmds as usize)?;
        let load_commands = load_command::parse_load_commands(region, header.ncmds, endian)?;

        let mach_sections: Vec<MachSection> = load_commands
            .iter()
            .filter_map(|lc| match lc {
                LoadCommand::Segment(seg) => Some(seg),
                _ => None,
            })
            .flat_map(|seg| seg.sections.iter().cloned())
            .collect();

        let sections = mach_sections
            .iter()
            .enumerate()
            .map(|(index, sect)| Self::to_section(view, index, sect))
            .collect::<Result<Vec<_>, _>>()?;

        let table = Self::parse_symbol_table(view, &header, &load_commands, &mach_sections)?;
        let dynamic_symbols = Self::dynamic_symbols_from(&table, &load_commands)?;
        let symbols: Vec<Symbol> = table.into_iter().flatten().collect();
        log::debug!(
            "Mach-O: {} sections, {} symbols, {} dynamic symbols",
            sections.len(),
            symbols.len(),
            dynamic_symbols.len()
        );

        Ok(Self {
            slice_offset: view.base(),
            header,
            load_commands,
            sections,
            symbols,
            dynamic_symbols,
        })
    }

    fn to_section(
        view: ByteView<'_>,
        index: usize,
        sect: &MachSection,
    ) -> Result<Section, ParseError> {
        if sect.align >= 64 {
            return Err(ParseError::invalid_structure(
                "Mach-O section",
                view.base() as u64,
                format!("{} has alignment exponent {}", sect.full_name(), sect.align),
            ));
        }

        let file_range = if sect.is_zerofill() || sect.offset == 0 {
            None
        } else {
            view.check_range(sect.offset.into(), sect.size)?;
            Some((view.base() as u64 + u64::from(sect.offset), sect.size))
        };

        Ok(Section {
            index,
            name: sect.sectname.clone(),
            address: sect.addr,
            size: sect.size,
            align: 1u64 << sect.align,
            file_range,
        })
    }

    /// Decodes `LC_SYMTAB`. The result keeps one slot per table position;
    /// debugging entries leave their slot empty.
    fn parse_symbol_table(
        view: ByteView<'_>,
        header: &MachHeader,
        load_commands: &[LoadCommand],
        sections: &[MachSection],
    ) -> Result<Vec<Option<Symbol>>, ParseError> {
        let Some((symoff, nsyms, stroff, strsize)) = load_commands.iter().find_map(|lc| match lc {
            LoadCommand::Symtab {
                symoff,
                nsyms,
                stroff,
                strsize,
            } => Some((*symoff, *nsyms, *stroff, *strsize)),
            _ => None,
        }) else {
            return Ok(Vec::new());
        };

        let is_64 = header.is_64bit();
        let entry_size = Nlist::size(is_64);
        let count = nsyms as usize;
        let table_len = view.table(symoff as usize, count, entry_size)?.len();
        let entries = view.slice(symoff as usize, table_len)?;
        let strtab = StringTable::new(view.slice(stroff as usize, strsize as usize)?);

        let mut table = Vec::with_capacity(count);
        for index in 0..count {
            let entry = Nlist::parse(entries, index * entry_size, header.endianness, is_64)?;
            if entry.is_stab() {
                table.push(None);
                continue;
            }
            let name = if entry.n_strx == 0 {
                String::new()
            } else {
                strtab.name_or_empty(entry.n_strx as usize, "Mach-O symbol name")
            };
            log::trace!("Mach-O symbol {index}: {name} type={:#x}", entry.n_type);
            table.push(Some(entry.to_symbol(index, name, sections)));
        }
        Ok(table)
    }

    /// Selects the exported and imported ranges named by `LC_DYSYMTAB`.
    fn dynamic_symbols_from(
        table: &[Option<Symbol>],
        load_commands: &[LoadCommand],
    ) -> Result<Vec<Symbol>, ParseError> {
        let Some(ranges) = load_commands.iter().find_map(|lc| match lc {
            LoadCommand::Dysymtab {
                iextdefsym,
                nextdefsym,
                iundefsym,
                nundefsym,
                ..
            } => Some([(*iextdefsym, *nextdefsym), (*iundefsym, *nundefsym)]),
            _ => None,
        }) else {
            return Ok(Vec::new());
        };

        let mut dynamic = Vec::new();
        for (start, count) in ranges {
            let end = u64::from(start) + u64::from(count);
            if end > table.len() as u64 {
                return Err(ParseError::invalid_structure(
                    "Mach-O dysymtab",
                    0,
                    format!(
                        "symbol range {start}..{end} exceeds the {} entry symbol table",
                        table.len()
                    ),
                ));
            }
            for symbol in table[start as usize..end as usize].iter().flatten() {
                let mut symbol = symbol.clone();
                symbol.index = dynamic.len();
                dynamic.push(symbol);
            }
        }
        Ok(dynamic)
    }

    /// Returns the segment with the given name.
    pub fn segment_by_name(&self, name: &str) -> Option<&Segment> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommand::Segment(seg) if seg.segname == name => Some(seg),
            _ => None,
        })
    }
}

impl BinaryFormat for MachO {
    fn format(&self) -> Format {
        if self.header.is_64bit() {
            Format::MachO64
        } else {
            Format::MachO32
        }
    }

    fn endianness(&self) -> Endianness {
        self.header.endianness
    }

    fn architecture(&self) -> Architecture {
        self.header.architecture()
    }

    fn entry_point(&self) -> Option<u64> {
        let entryoff = self.load_commands.iter().find_map(|lc| match lc {
            LoadCommand::Main { entryoff, .. } => Some(*entryoff),
            _ => None,
        })?;
        let text_base = self.segment_by_name("__TEXT").map_or(0, |seg| seg.vmaddr);
        Some(text_base.wrapping_add(entryoff))
    }

    fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn dynamic_symbols(&self) -> &[Symbol] {
        &self.dynamic_symbols
    }
}
