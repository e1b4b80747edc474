//! PE export directory parsing.

use std::collections::HashMap;

use super::header::DataDirectory;
use super::section::SectionHeader;
use crate::cursor::{to_usize, ByteView};
use crate::strtab::StringTable;
use crate::ParseError;
use objscan_core::{Endianness, Symbol, SymbolKind};

/// Export directory size
pub const EXPORT_DIRECTORY_SIZE: usize = 40;

/// Export directory table
#[derive(Debug, Clone)]
pub struct ExportDirectory {
    /// RVA of DLL name
    pub name_rva: u32,
    /// Ordinal base
    pub base: u32,
    /// Number of functions
    pub number_of_functions: u32,
    /// Number of names
    pub number_of_names: u32,
    /// RVA of Export Address Table
    pub address_of_functions: u32,
    /// RVA of Export Name Pointer Table
    pub address_of_names: u32,
    /// RVA of Ordinal Table
    pub address_of_name_ordinals: u32,
}

impl ExportDirectory {
    /// Parse the export directory at `offset`.
    pub fn parse(view: ByteView<'_>, offset: usize) -> Result<Self, ParseError> {
        view.bytes(offset, EXPORT_DIRECTORY_SIZE)?;
        let mut r = view.reader(offset, Endianness::Little)?;
        // characteristics, time stamp, version
        r.skip(12)?;
        Ok(Self {
            name_rva: r.u32()?,
            base: r.u32()?,
            number_of_functions: r.u32()?,
            number_of_names: r.u32()?,
            address_of_functions: r.u32()?,
            address_of_names: r.u32()?,
            address_of_name_ordinals: r.u32()?,
        })
    }
}

/// A parsed export entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Export name (empty for ordinal-only exports)
    pub name: String,
    /// Ordinal number
    pub ordinal: u32,
    /// RVA of the exported item
    pub rva: u32,
}

/// Convert RVA to file offset using the section table.
pub fn rva_to_offset(rva: u32, sections: &[SectionHeader]) -> Option<usize> {
    sections
        .iter()
        .find_map(|s| s.rva_to_offset(rva))
        .and_then(|offset| usize::try_from(offset).ok())
}

/// Locates a table the export directory declares.
fn table_offset(
    rva: u32,
    what: &'static str,
    sections: &[SectionHeader],
) -> Result<usize, ParseError> {
    rva_to_offset(rva, sections).ok_or_else(|| {
        ParseError::invalid_structure(
            "PE export directory",
            u64::from(rva),
            format!("{what} RVA maps to no section"),
        )
    })
}

/// Parse the exports listed in `directory`.
///
/// Forwarded exports and empty address slots are skipped. A directory whose
/// RVA maps to no section yields no exports.
pub fn parse_exports(
    view: ByteView<'_>,
    directory: DataDirectory,
    sections: &[SectionHeader],
) -> Result<Vec<Export>, ParseError> {
    let Some(dir_offset) = rva_to_offset(directory.virtual_address, sections) else {
        log::warn!(
            "PE export directory at RVA {:#x} maps to no section; ignoring exports",
            directory.virtual_address
        );
        return Ok(Vec::new());
    };
    let dir = ExportDirectory::parse(view, dir_offset)?;
    log::debug!(
        "PE exports: {} functions, {} names, ordinal base {}",
        dir.number_of_functions,
        dir.number_of_names,
        dir.base
    );

    let function_count = to_usize(dir.number_of_functions.into(), "export count")?;
    let name_count = to_usize(dir.number_of_names.into(), "export name count")?;
    if function_count == 0 {
        return Ok(Vec::new());
    }

    let functions_offset = table_offset(dir.address_of_functions, "address table", sections)?;
    view.table(functions_offset, function_count, 4)?;

    let mut names: HashMap<u16, String> = HashMap::new();
    if name_count > 0 {
        let names_offset = table_offset(dir.address_of_names, "name pointer table", sections)?;
        let ordinals_offset = table_offset(dir.address_of_name_ordinals, "ordinal table", sections)?;
        view.table(names_offset, name_count, 4)?;
        view.table(ordinals_offset, name_count, 2)?;

        // Names are NUL-terminated strings anywhere in the mapped image.
        let strings = StringTable::new(view);
        for i in 0..name_count {
            let name_rva = view.u32(names_offset + i * 4, Endianness::Little)?;
            let ordinal = view.u16(ordinals_offset + i * 2, Endianness::Little)?;
            let name = match rva_to_offset(name_rva, sections) {
                Some(offset) => strings.name_or_empty(offset, "PE export name"),
                None => {
                    log::warn!("PE export name {i} at RVA {name_rva:#x} maps to no section");
                    String::new()
                }
            };
            names.entry(ordinal).or_insert(name);
        }
    }

    let mut exports = Vec::new();
    for i in 0..function_count {
        let rva = view.u32(functions_offset + i * 4, Endianness::Little)?;
        if rva == 0 || directory.contains(rva) {
            continue;
        }
        let name = u16::try_from(i)
            .ok()
            .and_then(|ordinal| names.get(&ordinal))
            .cloned()
            .unwrap_or_default();
        exports.push(Export {
            name,
            ordinal: dir.base.wrapping_add(i as u32),
            rva,
        });
    }
    Ok(exports)
}

/// Converts exports to dynamic symbols.
pub fn to_symbols(exports: &[Export], image_base: u64, sections: &[SectionHeader]) -> Vec<Symbol> {
    exports
        .iter()
        .enumerate()
        .map(|(index, export)| {
            let executable = sections
                .iter()
                .find(|s| s.contains_rva(export.rva))
                .is_some_and(SectionHeader::is_executable);
            Symbol {
                index,
                name: export.name.clone(),
                address: image_base.wrapping_add(u64::from(export.rva)),
                size: 0,
                kind: if executable {
                    SymbolKind::Text
                } else {
                    SymbolKind::Data
                },
            }
        })
        .collect()
}
