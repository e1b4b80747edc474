//! Unified symbol record.

use std::fmt;

/// A symbol from a regular or dynamic symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// Position within the owning table. This is not a section index.
    pub index: usize,
    /// Symbol name (may be empty for some symbols).
    pub name: String,
    /// Resolved virtual address, 0 for undefined symbols.
    pub address: u64,
    /// Size of the symbol (0 if the format does not record one).
    pub size: u64,
    /// Coarse classification.
    pub kind: SymbolKind,
}

/// Symbol classification shared by every format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolKind {
    /// Function or other executable code.
    Text,
    /// Data object (variable, array, etc.).
    Data,
    /// Section symbol.
    Section,
    /// Source file name symbol.
    File,
    /// Untyped location.
    Label,
    /// Thread-local storage object.
    Tls,
    /// Anything else.
    Unknown,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 7] = [
        SymbolKind::Text,
        SymbolKind::Data,
        SymbolKind::Section,
        SymbolKind::File,
        SymbolKind::Label,
        SymbolKind::Tls,
        SymbolKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Data => "Data",
            Self::Section => "Section",
            Self::File => "File",
            Self::Label => "Label",
            Self::Tls => "Tls",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = String;

    /// Case-insensitive parse of the names returned by [`SymbolKind::as_str`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown symbol kind: {s}"))
    }
}
