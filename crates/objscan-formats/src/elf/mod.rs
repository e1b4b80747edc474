//! ELF (Executable and Linkable Format) decoder.
//!
//! Supports 32-bit and 64-bit files in either byte order, including the
//! extended section numbering used by objects with more than 0xff00 sections.

mod header;
mod section;
mod symbol;

pub use header::{ElfClass, ElfHeader, ElfType, ELF_MAGIC};
pub use section::SectionHeader;
pub use symbol::SymbolEntry;

use crate::cursor::{to_usize, ByteView};
use crate::strtab::StringTable;
use crate::{normalize_align, BinaryFormat, ParseError};
use objscan_core::{Architecture, Endianness, Format, Section, Symbol};

/// A parsed ELF binary.
#[derive(Debug)]
pub struct Elf {
    /// Parsed ELF header.
    pub header: ElfHeader,
    /// Raw section headers, in table order.
    pub section_headers: Vec<SectionHeader>,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
    dynamic_symbols: Vec<Symbol>,
}

impl Elf {
    /// Parse an ELF file from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let view = ByteView::new(data);
        let header = ElfHeader::parse(view)?;
        log::debug!(
            "ELF {:?} {:?} machine={} shoff={:#x} shnum={} shstrndx={}",
            header.class,
            header.endianness,
            header.e_machine,
            header.e_shoff,
            header.e_shnum,
            header.e_shstrndx
        );

        let section_headers = Self::parse_section_headers(view, &header)?;
        let section_names = Self::section_names(view, &header, &section_headers)?;

        let mut sections = Vec::with_capacity(section_headers.len());
        for (index, sh) in section_headers.iter().enumerate() {
            let name = section_names.name_or_empty(sh.sh_name as usize, "ELF section name");
            sections.push(Self::to_section(view, index, name, sh)?);
        }

        let symbols = Self::parse_symbols(
            view,
            &header,
            &section_headers,
            section::SHT_SYMTAB,
        )?;
        let dynamic_symbols = Self::parse_symbols(
            view,
            &header,
            &section_headers,
            section::SHT_DYNSYM,
        )?;
        log::debug!(
            "ELF: {} sections, {} symbols, {} dynamic symbols",
            sections.len(),
            symbols.len(),
            dynamic_symbols.len()
        );

        Ok(Self {
            header,
            section_headers,
            sections,
            symbols,
            dynamic_symbols,
        })
    }

    fn parse_section_headers(
        view: ByteView<'_>,
        header: &ElfHeader,
    ) -> Result<Vec<SectionHeader>, ParseError> {
        if header.e_shoff == 0 {
            return Ok(Vec::new());
        }

        let entry_size = header.e_shentsize as usize;
        let native_size = header.class.section_header_size();
        if entry_size < native_size {
            return Err(ParseError::invalid_structure(
                "ELF header",
                header.shentsize_offset(),
                format!("section header size {entry_size} is smaller than {native_size}"),
            ));
        }

        let offset = to_usize(header.e_shoff, "section header offset")?;
        let mut count = header.e_shnum as usize;
        if count == 0 {
            // Extended numbering: the real count lives in section 0.
            let first = SectionHeader::parse(view, offset, header.class, header.endianness)?;
            count = to_usize(first.sh_size, "section header count")?;
        }

        // One check for the whole table before anything is allocated.
        view.table(offset, count, entry_size)?;

        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let sh = SectionHeader::parse(
                view,
                offset + i * entry_size,
                header.class,
                header.endianness,
            )?;
            log::trace!(
                "ELF section {i}: type={} addr={:#x} size={:#x}",
                sh.type_name(),
                sh.sh_addr,
                sh.sh_size
            );
            headers.push(sh);
        }
        Ok(headers)
    }

    /// Locates the section name string table.
    fn section_names<'a>(
        view: ByteView<'a>,
        header: &ElfHeader,
        headers: &[SectionHeader],
    ) -> Result<StringTable<'a>, ParseError> {
        let index = if header.e_shstrndx == symbol::SHN_XINDEX {
            headers.first().map_or(0, |first| first.sh_link as usize)
        } else {
            header.e_shstrndx as usize
        };

        if index == symbol::SHN_UNDEF as usize {
            return Ok(StringTable::empty());
        }
        match headers.get(index) {
            Some(sh) if sh.has_file_data() => Self::table_view(view, sh).map(StringTable::new),
            _ => {
                log::warn!("ELF: section name table {index} is unusable; sections are unnamed");
                Ok(StringTable::empty())
            }
        }
    }

    fn table_view<'a>(view: ByteView<'a>, sh: &SectionHeader) -> Result<ByteView<'a>, ParseError> {
        view.slice(
            to_usize(sh.sh_offset, "section offset")?,
            to_usize(sh.sh_size, "section size")?,
        )
    }

    fn to_section(
        view: ByteView<'_>,
        index: usize,
        name: String,
        sh: &SectionHeader,
    ) -> Result<Section, ParseError> {
        let file_range = if sh.has_file_data() {
            view.check_range(sh.sh_offset, sh.sh_size)?;
            Some((sh.sh_offset, sh.sh_size))
        } else {
            None
        };

        Ok(Section {
            index,
            name,
            address: sh.sh_addr,
            size: sh.sh_size,
            align: normalize_align(sh.sh_addralign),
            file_range,
        })
    }

    /// Decodes the first symbol table of type `sh_type`, if any.
    fn parse_symbols(
        view: ByteView<'_>,
        header: &ElfHeader,
        headers: &[SectionHeader],
        sh_type: u32,
    ) -> Result<Vec<Symbol>, ParseError> {
        let Some((table_index, table)) = headers
            .iter()
            .enumerate()
            .find(|(_, sh)| sh.sh_type == sh_type)
        else {
            return Ok(Vec::new());
        };

        let native_size = header.class.symbol_size();
        let entry_size = match to_usize(table.sh_entsize, "symbol entry size")? {
            0 => native_size,
            size if size < native_size => {
                return Err(ParseError::invalid_structure(
                    "ELF symbol table",
                    table.sh_offset,
                    format!("entry size {size} in section {table_index} is smaller than {native_size}"),
                ))
            }
            size => size,
        };

        let entries = Self::table_view(view, table)?;
        let count = entries.len() / entry_size;

        let strtab = match headers.get(table.sh_link as usize) {
            Some(sh) if sh.has_file_data() => StringTable::new(Self::table_view(view, sh)?),
            _ => {
                log::warn!(
                    "ELF: symbol table {table_index} links to unusable string table {}",
                    table.sh_link
                );
                StringTable::empty()
            }
        };

        let mut symbols = Vec::with_capacity(count);
        for index in 0..count {
            let entry = SymbolEntry::parse(
                entries,
                index * entry_size,
                header.class,
                header.endianness,
            )?;

            let name = if entry.st_name == 0 {
                String::new()
            } else {
                strtab.name_or_empty(entry.st_name as usize, "ELF symbol name")
            };

            symbols.push(entry.to_symbol(index, name));
        }
        Ok(symbols)
    }
}

impl BinaryFormat for Elf {
    fn format(&self) -> Format {
        match self.header.class {
            ElfClass::Elf32 => Format::Elf32,
            ElfClass::Elf64 => Format::Elf64,
        }
    }

    fn endianness(&self) -> Endianness {
        self.header.endianness
    }

    fn architecture(&self) -> Architecture {
        self.header.architecture()
    }

    fn entry_point(&self) -> Option<u64> {
        if self.header.e_entry != 0 {
            Some(self.header.e_entry)
        } else {
            None
        }
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
