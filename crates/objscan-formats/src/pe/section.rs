//! PE/COFF section table parsing.

use crate::cursor::ByteView;
use crate::strtab::{fixed_name, StringTable};
use crate::ParseError;
use objscan_core::Endianness;

/// Section header size
pub const SECTION_HEADER_SIZE: usize = 40;

/// Section characteristics
pub const IMAGE_SCN_CNT_CODE: u32 = 0x00000020;
pub const IMAGE_SCN_ALIGN_MASK: u32 = 0x00F00000;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x20000000;

/// PE/COFF Section Header
#[derive(Debug, Clone)]
pub struct SectionHeader {
    /// Raw name field (inline name or string table reference)
    pub raw_name: [u8; 8],
    /// Virtual size
    pub virtual_size: u32,
    /// Virtual address (RVA)
    pub virtual_address: u32,
    /// Size of raw data
    pub size_of_raw_data: u32,
    /// Pointer to raw data
    pub pointer_to_raw_data: u32,
    /// Pointer to relocations
    pub pointer_to_relocations: u32,
    /// Number of relocations
    pub number_of_relocations: u16,
    /// Characteristics
    pub characteristics: u32,
}

impl SectionHeader {
    /// Parse a section header at `offset`.
    pub fn parse(view: ByteView<'_>, offset: usize) -> Result<Self, ParseError> {
        let mut r = view.reader(offset, Endianness::Little)?;
        let raw_name = r.array::<8>()?;
        let virtual_size = r.u32()?;
        let virtual_address = r.u32()?;
        let size_of_raw_data = r.u32()?;
        let pointer_to_raw_data = r.u32()?;
        let pointer_to_relocations = r.u32()?;
        let _pointer_to_linenumbers = r.u32()?;
        let number_of_relocations = r.u16()?;
        let _number_of_linenumbers = r.u16()?;
        let characteristics = r.u32()?;

        Ok(Self {
            raw_name,
            virtual_size,
            virtual_address,
            size_of_raw_data,
            pointer_to_raw_data,
            pointer_to_relocations,
            number_of_relocations,
            characteristics,
        })
    }

    /// Decodes the section name.
    ///
    /// Names longer than eight bytes are stored in the string table and
    /// referenced as `/<decimal>` or `//<base64>`. A reference that does not
    /// parse or does not resolve gives an empty name.
    pub fn name(&self, strings: &StringTable<'_>) -> String {
        if self.raw_name[0] != b'/' {
            return fixed_name(&self.raw_name);
        }

        let offset = if self.raw_name[1] == b'/' {
            parse_base64_offset(&self.raw_name[2..])
        } else {
            parse_decimal_offset(&self.raw_name[1..])
        };
        match offset {
            Some(offset) => strings.name_or_empty(offset, "COFF section name"),
            None => {
                log::warn!(
                    "COFF section name {:?} is not a valid string table reference; using an empty name",
                    fixed_name(&self.raw_name)
                );
                String::new()
            }
        }
    }

    /// Returns true if this section holds code or is mapped executable.
    pub fn is_executable(&self) -> bool {
        self.characteristics & (IMAGE_SCN_CNT_CODE | IMAGE_SCN_MEM_EXECUTE) != 0
    }

    /// Alignment encoded in the `IMAGE_SCN_ALIGN_*` bits, 1 when absent.
    pub fn coff_alignment(&self) -> u64 {
        match (self.characteristics & IMAGE_SCN_ALIGN_MASK) >> 20 {
            n @ 1..=14 => 1 << (n - 1),
            // 0 is unset, 0xF is reserved
            _ => 1,
        }
    }

    /// Returns the end of the section's extent in memory.
    pub fn virtual_end(&self) -> u64 {
        u64::from(self.virtual_address) + u64::from(self.virtual_size.max(self.size_of_raw_data))
    }

    /// Returns true if `rva` falls inside this section in memory.
    pub fn contains_rva(&self, rva: u32) -> bool {
        (u64::from(self.virtual_address)..self.virtual_end()).contains(&u64::from(rva))
    }

    /// Translates `rva` to a file offset, if it lies in this section's raw data.
    pub fn rva_to_offset(&self, rva: u32) -> Option<u64> {
        let delta = rva.checked_sub(self.virtual_address)?;
        if delta < self.size_of_raw_data {
            Some(u64::from(self.pointer_to_raw_data) + u64::from(delta))
        } else {
            None
        }
    }
}

fn parse_decimal_offset(digits: &[u8]) -> Option<usize> {
    let end = digits.iter().position(|&b| b == 0).unwrap_or(digits.len());
    std::str::from_utf8(&digits[..end]).ok()?.parse().ok()
}

fn parse_base64_offset(digits: &[u8]) -> Option<usize> {
    let mut value: u64 = 0;
    for &b in digits.iter().take_while(|&&b| b != 0) {
        let digit = match b {
            b'A'..=b'Z' => b - b'A',
            b'a'..=b'z' => b - b'a' + 26,
            b'0'..=b'9' => b - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            _ => return None,
        };
        value = value * 64 + u64::from(digit);
    }
    usize::try_from(value).ok()
}
