//! Object-file format tags.

use std::fmt;

/// The concrete container format of a parsed file.
///
/// The string forms returned by [`Format::as_str`] are stable identifiers
/// and safe to hand across a binding boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "&'static str", try_from = "String"))]
pub enum Format {
    Elf32,
    Elf64,
    MachO32,
    MachO64,
    Pe32,
    Pe32Plus,
    Coff,
    Unknown,
}

impl Format {
    /// Every tag, in declaration order.
    pub const ALL: [Format; 8] = [
        Format::Elf32,
        Format::Elf64,
        Format::MachO32,
        Format::MachO64,
        Format::Pe32,
        Format::Pe32Plus,
        Format::Coff,
        Format::Unknown,
    ];

    /// Stable lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elf32 => "elf32",
            Self::Elf64 => "elf64",
            Self::MachO32 => "macho32",
            Self::MachO64 => "macho64",
            Self::Pe32 => "pe32",
            Self::Pe32Plus => "pe32+",
            Self::Coff => "coff",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Format> for &'static str {
    fn from(format: Format) -> Self {
        format.as_str()
    }
}

impl TryFrom<String> for Format {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown format tag: {s}"))
    }
}
