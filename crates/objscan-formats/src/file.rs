//! The format-agnostic view of a parsed binary.

use crate::detect::{detect_format, BinaryType};
use crate::index::SectionIndex;
use crate::{BinaryFormat, Elf, LookupError, MachO, ParseError, Pe};
use objscan_core::{Architecture, Endianness, Format, Section, Symbol};

/// A decoded binary of any supported format.
enum Binary {
    Elf(Elf),
    MachO(MachO),
    Pe(Pe),
}

impl Binary {
    fn parse(data: &[u8]) -> Result<Self, ParseError> {
        Ok(match detect_format(data)? {
            BinaryType::Elf => Binary::Elf(Elf::parse(data)?),
            BinaryType::MachO | BinaryType::MachOFat => Binary::MachO(MachO::parse(data)?),
            BinaryType::Pe => Binary::Pe(Pe::parse(data)?),
            BinaryType::Coff => Binary::Pe(Pe::parse_coff(data)?),
        })
    }

    fn as_format(&self) -> &dyn BinaryFormat {
        match self {
            Binary::Elf(elf) => elf,
            Binary::MachO(macho) => macho,
            Binary::Pe(pe) => pe,
        }
    }
}

/// A parsed object file.
///
/// `File` owns copies of everything it reports, so the input buffer can be
/// dropped once [`File::parse`] returns. It is never mutated after
/// construction and can be shared between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    format: Format,
    endianness: Endianness,
    architecture: Architecture,
    entry_point: Option<u64>,
    sections: SectionIndex,
    symbols: Vec<Symbol>,
    dynamic_symbols: Vec<Symbol>,
}

impl File {
    /// Parses `data` as ELF, Mach-O, PE or COFF.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let binary = Binary::parse(data)?;
        let format = binary.as_format();
        let file = Self {
            format: format.format(),
            endianness: format.endianness(),
            architecture: format.architecture(),
            entry_point: format.entry_point(),
            sections: SectionIndex::new(format.sections().to_vec()),
            symbols: format.symbols().to_vec(),
            dynamic_symbols: format.dynamic_symbols().to_vec(),
        };
        log::debug!(
            "parsed {} ({}): {} sections, {} symbols, {} dynamic symbols",
            file.format,
            file.architecture.name(),
            file.sections.len(),
            file.symbols.len(),
            file.dynamic_symbols.len()
        );
        Ok(file)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Returns the entry point address, if the binary declares one.
    pub fn entry_point(&self) -> Option<u64> {
        self.entry_point
    }

    /// All sections, in table order.
    pub fn sections(&self) -> &[Section] {
        self.sections.sections()
    }

    /// The regular symbol table, empty if the binary has none.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// The dynamic (exported/imported) symbols, empty if the binary has none.
    pub fn dynamic_symbols(&self) -> &[Symbol] {
        &self.dynamic_symbols
    }

    pub fn section_by_index(&self, index: usize) -> Result<&Section, LookupError> {
        self.sections.by_index(index)
    }

    /// Returns the first section named `name`.
    pub fn section_by_name(&self, name: &str) -> Result<&Section, LookupError> {
        self.sections.by_name(name)
    }
}
