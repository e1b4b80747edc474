//! PE (Portable Executable) and plain COFF decoder.
//!
//! PE images are reached through the DOS stub and the `PE\0\0` signature.
//! Plain COFF objects start directly with the COFF file header and share the
//! section and symbol decoding, minus the optional header.

mod exports;
mod header;
mod section;
mod symbol;

pub use exports::{Export, ExportDirectory};
pub use header::{
    is_coff_machine, CoffHeader, DataDirectory, DosHeader, OptionalHeader, DOS_LFANEW_OFFSET,
    DOS_MAGIC, PE_SIGNATURE,
};
pub use section::SectionHeader;
pub use symbol::CoffSymbol;

use crate::cursor::{to_usize, ByteView};
use crate::strtab::StringTable;
use crate::{normalize_align, BinaryFormat, ParseError};
use objscan_core::{Architecture, Endianness, Format, Section, Symbol};

/// A parsed PE image or COFF object.
#[derive(Debug)]
pub struct Pe {
    /// DOS header (absent for plain COFF).
    pub dos_header: Option<DosHeader>,
    /// COFF file header.
    pub coff_header: CoffHeader,
    /// Optional header (absent for plain COFF).
    pub optional_header: Option<OptionalHeader>,
    /// Raw section headers.
    pub section_headers: Vec<SectionHeader>,
    /// Exports (empty for plain COFF).
    pub exports: Vec<Export>,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
    dynamic_symbols: Vec<Symbol>,
}

impl Pe {
    /// Parse a PE image.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let view = ByteView::new(data);
        let dos_header = DosHeader::parse(view)?;

        let pe_offset = dos_header.e_lfanew as usize;
        let signature = view.u32(pe_offset, Endianness::Little)?;
        if signature != PE_SIGNATURE {
            return Err(ParseError::invalid_magic(
                "PE\\0\\0",
                &signature.to_le_bytes(),
            ));
        }

        let coff_offset = pe_offset + 4;
        let coff_header = CoffHeader::parse(view, coff_offset)?;
        let optional_offset = coff_offset + header::COFF_HEADER_SIZE;
        let optional_header = OptionalHeader::parse(view.slice(
            optional_offset,
            usize::from(coff_header.size_of_optional_header),
        )?)?;
        log::debug!(
            "PE {} machine={:#x} image_base={:#x} sections={} symbols={}",
            if optional_header.is_64bit() { "PE32+" } else { "PE32" },
            coff_header.machine,
            optional_header.image_base,
            coff_header.number_of_sections,
            coff_header.number_of_symbols
        );

        Self::parse_tables(
            view,
            Some(dos_header),
            coff_header,
            Some(optional_header),
            coff_offset,
        )
    }

    /// Parse a plain COFF object.
    pub fn parse_coff(data: &[u8]) -> Result<Self, ParseError> {
        let view = ByteView::new(data);
        let coff_header = CoffHeader::parse(view, 0)?;
        log::debug!(
            "COFF machine={:#x} sections={} symbols={}",
            coff_header.machine,
            coff_header.number_of_sections,
            coff_header.number_of_symbols
        );
        Self::parse_tables(view, None, coff_header, None, 0)
    }

    /// Decodes everything after the headers. `coff_offset` is the position
    /// of the COFF file header.
    fn parse_tables(
        view: ByteView<'_>,
        dos_header: Option<DosHeader>,
        coff_header: CoffHeader,
        optional_header: Option<OptionalHeader>,
        coff_offset: usize,
    ) -> Result<Self, ParseError> {
        let strings = Self::string_table(view, &coff_header)?;

        let table_offset = coff_offset
            + header::COFF_HEADER_SIZE
            + usize::from(coff_header.size_of_optional_header);
        let count = usize::from(coff_header.number_of_sections);
        view.table(table_offset, count, section::SECTION_HEADER_SIZE)?;
        let section_headers = (0..count)
            .map(|i| SectionHeader::parse(view, table_offset + i * section::SECTION_HEADER_SIZE))
            .collect::<Result<Vec<_>, _>>()?;

        let sections = section_headers
            .iter()
            .enumerate()
            .map(|(index, sh)| {
                Self::to_section(view, index, sh, &strings, optional_header.as_ref())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let symbols = symbol::parse_symbols(
            view,
            coff_header.pointer_to_symbol_table,
            coff_header.number_of_symbols,
            &strings,
            &sections,
        )?;

        let (exports, dynamic_symbols) = match optional_header
            .as_ref()
            .and_then(|opt| opt.export_directory().map(|dir| (opt.image_base, dir)))
        {
            Some((image_base, dir)) => {
                let exports = exports::parse_exports(view, dir, &section_headers)?;
                let symbols = exports::to_symbols(&exports, image_base, &section_headers);
                (exports, symbols)
            }
            None => (Vec::new(), Vec::new()),
        };
        log::debug!(
            "PE/COFF: {} sections, {} symbols, {} exports",
            sections.len(),
            symbols.len(),
            dynamic_symbols.len()
        );

        Ok(Self {
            dos_header,
            coff_header,
            optional_header,
            section_headers,
            exports,
            sections,
            symbols,
            dynamic_symbols,
        })
    }

    /// Locates the string table that follows the symbol table.
    fn string_table<'a>(
        view: ByteView<'a>,
        coff_header: &CoffHeader,
    ) -> Result<StringTable<'a>, ParseError> {
        if coff_header.pointer_to_symbol_table == 0 {
            return Ok(StringTable::empty());
        }
        let offset = u64::from(coff_header.pointer_to_symbol_table)
            + u64::from(coff_header.number_of_symbols) * symbol::SYMBOL_SIZE as u64;
        let offset = to_usize(offset, "COFF string table offset")?;
        // The length counts its own four bytes.
        let len = view.u32(offset, Endianness::Little)?.max(4);
        Ok(StringTable::new(view.slice(offset, len as usize)?))
    }

    fn to_section(
        view: ByteView<'_>,
        index: usize,
        sh: &SectionHeader,
        strings: &StringTable<'_>,
        optional_header: Option<&OptionalHeader>,
    ) -> Result<Section, ParseError> {
        let raw_size = u64::from(sh.size_of_raw_data);
        let virtual_size = u64::from(sh.virtual_size);

        let (address, size, align, file_len) = match optional_header {
            Some(opt) => (
                opt.image_base.wrapping_add(u64::from(sh.virtual_address)),
                if virtual_size != 0 { virtual_size } else { raw_size },
                normalize_align(u64::from(opt.section_alignment)),
                if virtual_size != 0 {
                    raw_size.min(virtual_size)
                } else {
                    raw_size
                },
            ),
            None => (
                u64::from(sh.virtual_address),
                raw_size,
                sh.coff_alignment(),
                raw_size,
            ),
        };

        let file_range = if sh.pointer_to_raw_data == 0 || sh.size_of_raw_data == 0 {
            None
        } else {
            let offset = u64::from(sh.pointer_to_raw_data);
            view.check_range(offset, file_len)?;
            Some((offset, file_len))
        };

        Ok(Section {
            index,
            name: sh.name(strings),
            address,
            size,
            align,
            file_range,
        })
    }

    /// Returns true if this is a PE32+ image.
    pub fn is_64bit(&self) -> bool {
        self.optional_header
            .as_ref()
            .is_some_and(OptionalHeader::is_64bit)
    }

    /// Returns the image base, 0 for plain COFF.
    pub fn image_base(&self) -> u64 {
        self.optional_header
            .as_ref()
            .map_or(0, |opt| opt.image_base)
    }

    /// Convert RVA to file offset.
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        exports::rva_to_offset(rva, &self.section_headers)
    }
}

impl BinaryFormat for Pe {
    fn format(&self) -> Format {
        match &self.optional_header {
            Some(opt) if opt.is_64bit() => Format::Pe32Plus,
            Some(_) => Format::Pe32,
            None => Format::Coff,
        }
    }

    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn architecture(&self) -> Architecture {
        self.coff_header.architecture()
    }

    fn entry_point(&self) -> Option<u64> {
        let opt = self.optional_header.as_ref()?;
        if opt.address_of_entry_point == 0 {
            return None;
        }
        Some(opt.image_base.wrapping_add(u64::from(opt.address_of_entry_point)))
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
