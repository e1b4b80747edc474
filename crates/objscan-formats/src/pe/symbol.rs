//! COFF symbol table parsing.

use crate::cursor::{to_usize, ByteView};
use crate::strtab::{fixed_name, StringTable};
use crate::ParseError;
use objscan_core::{Endianness, Section, Symbol, SymbolKind};

/// Size of one symbol table record, primary or auxiliary.
pub const SYMBOL_SIZE: usize = 18;

// Special section numbers
pub const IMAGE_SYM_UNDEFINED: i16 = 0;
pub const IMAGE_SYM_ABSOLUTE: i16 = -1;
pub const IMAGE_SYM_DEBUG: i16 = -2;

// Storage classes
pub const IMAGE_SYM_CLASS_EXTERNAL: u8 = 2;
pub const IMAGE_SYM_CLASS_STATIC: u8 = 3;
pub const IMAGE_SYM_CLASS_LABEL: u8 = 6;
pub const IMAGE_SYM_CLASS_FILE: u8 = 103;
pub const IMAGE_SYM_CLASS_SECTION: u8 = 104;
pub const IMAGE_SYM_CLASS_WEAK_EXTERNAL: u8 = 105;

/// Derived type for functions (bits 4-5 of the type field).
pub const IMAGE_SYM_DTYPE_FUNCTION: u16 = 2;

/// A primary COFF symbol record.
#[derive(Debug, Clone)]
pub struct CoffSymbol {
    /// Inline name, or zero followed by a string table offset
    pub raw_name: [u8; 8],
    pub value: u32,
    /// 1-based section number, or one of the special values
    pub section_number: i16,
    pub typ: u16,
    pub storage_class: u8,
    pub number_of_aux_symbols: u8,
}

impl CoffSymbol {
    /// Parse a symbol record at `offset`.
    pub fn parse(view: ByteView<'_>, offset: usize) -> Result<Self, ParseError> {
        let mut r = view.reader(offset, Endianness::Little)?;
        Ok(Self {
            raw_name: r.array::<8>()?,
            value: r.u32()?,
            section_number: r.u16()? as i16,
            typ: r.u16()?,
            storage_class: r.u8()?,
            number_of_aux_symbols: r.u8()?,
        })
    }

    /// Decodes the symbol name from the inline field or the string table.
    pub fn name(&self, strings: &StringTable<'_>) -> String {
        if self.raw_name[..4] == [0; 4] {
            let offset = u32::from_le_bytes([
                self.raw_name[4],
                self.raw_name[5],
                self.raw_name[6],
                self.raw_name[7],
            ]);
            strings.name_or_empty(offset as usize, "COFF symbol name")
        } else {
            fixed_name(&self.raw_name)
        }
    }

    pub fn derived_type(&self) -> u16 {
        (self.typ >> 4) & 0x3
    }

    pub fn is_function(&self) -> bool {
        self.derived_type() == IMAGE_SYM_DTYPE_FUNCTION
    }

    /// Returns true for a static symbol carrying a section definition record.
    pub fn has_aux_section(&self) -> bool {
        self.storage_class == IMAGE_SYM_CLASS_STATIC
            && self.value == 0
            && self.number_of_aux_symbols > 0
    }

    pub fn kind(&self) -> SymbolKind {
        let derived = if self.is_function() {
            SymbolKind::Text
        } else {
            SymbolKind::Data
        };
        match self.storage_class {
            IMAGE_SYM_CLASS_STATIC if self.has_aux_section() => SymbolKind::Section,
            IMAGE_SYM_CLASS_STATIC | IMAGE_SYM_CLASS_EXTERNAL | IMAGE_SYM_CLASS_WEAK_EXTERNAL => {
                derived
            }
            IMAGE_SYM_CLASS_SECTION => SymbolKind::Section,
            IMAGE_SYM_CLASS_FILE => SymbolKind::File,
            IMAGE_SYM_CLASS_LABEL => SymbolKind::Label,
            _ => SymbolKind::Unknown,
        }
    }

    /// Resolves the symbol's address against the unified section list.
    pub fn address(&self, sections: &[Section]) -> u64 {
        match self.section_number {
            IMAGE_SYM_UNDEFINED | IMAGE_SYM_DEBUG => 0,
            IMAGE_SYM_ABSOLUTE => u64::from(self.value),
            n if n > 0 => sections
                .get(n as usize - 1)
                .map_or(0, |s| s.address)
                .wrapping_add(u64::from(self.value)),
            // Reserved negative section numbers
            _ => 0,
        }
    }

    /// Size from the first auxiliary record, when it carries one.
    pub fn size(&self, aux: &[u8]) -> u64 {
        let field = |at: usize| {
            aux.get(at..at + 4)
                .map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        };
        if self.has_aux_section() {
            // Section definition: Length
            u64::from(field(0))
        } else if self.storage_class == IMAGE_SYM_CLASS_EXTERNAL
            && self.is_function()
            && self.section_number > 0
        {
            // Function definition: TotalSize
            u64::from(field(4))
        } else {
            0
        }
    }
}

/// Decodes the symbol table into unified symbols.
///
/// Auxiliary records are consumed with their primary record; each symbol's
/// index is the table position of its primary record.
pub fn parse_symbols(
    view: ByteView<'_>,
    pointer_to_symbol_table: u32,
    number_of_symbols: u32,
    strings: &StringTable<'_>,
    sections: &[Section],
) -> Result<Vec<Symbol>, ParseError> {
    if pointer_to_symbol_table == 0 || number_of_symbols == 0 {
        return Ok(Vec::new());
    }

    let count = to_usize(number_of_symbols.into(), "COFF symbol count")?;
    let offset = pointer_to_symbol_table as usize;
    let len = view.table(offset, count, SYMBOL_SIZE)?.len();
    let table = view.slice(offset, len)?;

    let mut symbols = Vec::new();
    let mut index = 0;
    while index < count {
        let entry = CoffSymbol::parse(table, index * SYMBOL_SIZE)?;
        let aux_count = usize::from(entry.number_of_aux_symbols);
        if index + aux_count >= count {
            return Err(ParseError::invalid_structure(
                "COFF symbol",
                (table.base() + index * SYMBOL_SIZE) as u64,
                format!("{aux_count} auxiliary records run past the symbol table"),
            ));
        }
        let aux = table.bytes((index + 1) * SYMBOL_SIZE, aux_count * SYMBOL_SIZE)?;

        let kind = entry.kind();
        let name = if entry.storage_class == IMAGE_SYM_CLASS_FILE {
            fixed_name(aux)
        } else {
            entry.name(strings)
        };
        let address = match kind {
            SymbolKind::Unknown | SymbolKind::File => 0,
            _ => entry.address(sections),
        };
        log::trace!(
            "COFF symbol {index}: {name} class={} section={}",
            entry.storage_class,
            entry.section_number
        );

        symbols.push(Symbol {
            index,
            name,
            address,
            size: entry.size(aux),
            kind,
        });
        index += 1 + aux_count;
    }
    Ok(symbols)
}
