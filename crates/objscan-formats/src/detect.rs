//! Format detection from magic bytes.

use crate::cursor::ByteView;
use crate::{elf, macho, pe, ParseError};
use objscan_core::Endianness;

/// Container family picked by [`detect_format`].
///
/// The word width (ELF32 vs ELF64, PE32 vs PE32+) is settled by the decoder
/// for the family, which has to read further into the header anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryType {
    Elf,
    MachO,
    /// Universal binary holding one or more Mach-O slices.
    MachOFat,
    /// PE image behind an `MZ` stub.
    Pe,
    /// Plain COFF object without a DOS stub.
    Coff,
}

/// Detect the binary format from magic bytes.
///
/// Only the bytes needed to tell the formats apart are read. A buffer that
/// carries a recognized magic but is too short to hold the matching header
/// is still reported as that format, so the decoder can fail with
/// [`ParseError::OutOfBounds`] instead of claiming the format is unknown.
pub fn detect_format(data: &[u8]) -> Result<BinaryType, ParseError> {
    let view = ByteView::new(data);

    if let Ok(magic) = view.array::<4>(0) {
        if magic == elf::ELF_MAGIC {
            return Ok(BinaryType::Elf);
        }
        match u32::from_be_bytes(magic) {
            macho::MH_MAGIC | macho::MH_CIGAM | macho::MH_MAGIC_64 | macho::MH_CIGAM_64 => {
                return Ok(BinaryType::MachO)
            }
            macho::FAT_MAGIC | macho::FAT_MAGIC_64 => return Ok(BinaryType::MachOFat),
            _ => {}
        }
    }

    if let Ok(mz) = view.u16(0, Endianness::Little) {
        if mz == pe::DOS_MAGIC {
            return detect_pe(view);
        }
        if pe::is_coff_machine(mz) {
            return Ok(BinaryType::Coff);
        }
    }

    Err(ParseError::UnknownFormat)
}

fn detect_pe(view: ByteView<'_>) -> Result<BinaryType, ParseError> {
    // A stub too short to hold e_lfanew, or an e_lfanew pointing past the
    // end, is a truncated PE rather than an unknown format.
    let Ok(e_lfanew) = view.u32(pe::DOS_LFANEW_OFFSET, Endianness::Little) else {
        return Ok(BinaryType::Pe);
    };
    match view.u32(e_lfanew as usize, Endianness::Little) {
        Ok(pe::PE_SIGNATURE) => Ok(BinaryType::Pe),
        Ok(_) => Err(ParseError::UnknownFormat),
        Err(_) => Ok(BinaryType::Pe),
    }
}
