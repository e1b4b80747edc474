//! Property-based tests for the format decoders and the `File` view.
//!
//! Decoders must handle arbitrary input without panicking, give the same
//! answer twice, and never report ranges outside the buffer.

mod common;

use proptest::prelude::*;

use objscan_formats::elf::Elf;
use objscan_formats::macho::MachO;
use objscan_formats::pe::Pe;
use objscan_formats::{detect_format, BinaryFormat, BinaryType, File, ParseError};

/// Structural facts every successfully parsed file must satisfy.
fn check_invariants(file: &File, len: usize) -> Result<(), TestCaseError> {
    for (i, section) in file.sections().iter().enumerate() {
        prop_assert_eq!(section.index, i);
        prop_assert!(section.align.is_power_of_two());
        if let Some((offset, size)) = section.file_range {
            prop_assert!(offset.checked_add(size).is_some_and(|end| end <= len as u64));
        }
    }
    // Regular symbols keep their table positions, which may skip entries.
    for pair in file.symbols().windows(2) {
        prop_assert!(pair[0].index < pair[1].index);
    }
    for (i, symbol) in file.dynamic_symbols().iter().enumerate() {
        prop_assert_eq!(symbol.index, i);
    }
    Ok(())
}

fn fixture() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(common::all().into_iter().map(|(_, data)| data).collect::<Vec<_>>())
}

// =============================================================================
// ELF Parser Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(5000))]

    /// ELF parsing never panics on arbitrary input.
    #[test]
    fn elf_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = Elf::parse(&data);
    }

    /// ELF headers with a valid identification and random fields.
    #[test]
    fn elf_magic_handling(
        class in 1u8..=2,
        encoding in 1u8..=2,
        rest in prop::collection::vec(any::<u8>(), 52..256)
    ) {
        let mut data = vec![0x7F, b'E', b'L', b'F', class, encoding, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&rest);
        let _ = Elf::parse(&data);
    }

    /// Forged section counts fail before any per-entry work.
    #[test]
    fn elf_section_count_handling(shnum in any::<u16>(), shoff in any::<u32>()) {
        let mut data = common::elf(true, false);
        data[40..48].copy_from_slice(&u64::from(shoff).to_le_bytes());
        data[60..62].copy_from_slice(&shnum.to_le_bytes());
        if let Ok(elf) = Elf::parse(&data) {
            prop_assert_eq!(elf.sections().len(), elf.section_headers.len());
        }
    }
}

// =============================================================================
// Mach-O Parser Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(5000))]

    /// Mach-O parsing never panics on arbitrary input.
    #[test]
    fn macho_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = MachO::parse(&data);
    }

    /// Mach-O magic number handling.
    #[test]
    fn macho_magic_handling(
        magic in prop::sample::select(vec![
            0xFEEDFACE_u32,
            0xFEEDFACF,
            0xCEFAEDFE,
            0xCFFAEDFE,
            0xCAFEBABE,
            0xCAFEBABF,
        ]),
        rest in prop::collection::vec(any::<u8>(), 28..256)
    ) {
        let mut data = magic.to_be_bytes().to_vec();
        data.extend_from_slice(&rest);
        let _ = MachO::parse(&data);
    }

    /// Mach-O load command count handling.
    #[test]
    fn macho_load_cmd_count_handling(ncmds in any::<u32>(), sizeofcmds in any::<u32>()) {
        let mut data = common::macho(true, false);
        data[16..20].copy_from_slice(&ncmds.to_le_bytes());
        data[20..24].copy_from_slice(&sizeofcmds.to_le_bytes());
        let _ = MachO::parse(&data);
    }

    /// Fat headers with forged slice tables.
    #[test]
    fn macho_fat_arch_handling(
        nfat in 0u32..64,
        offset in any::<u32>(),
        size in any::<u32>()
    ) {
        let mut data = common::macho_fat();
        data[4..8].copy_from_slice(&nfat.to_be_bytes());
        data[16..20].copy_from_slice(&offset.to_be_bytes());
        data[20..24].copy_from_slice(&size.to_be_bytes());
        let _ = MachO::parse(&data);
    }
}

// =============================================================================
// PE Parser Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(5000))]

    /// PE parsing never panics on arbitrary input.
    #[test]
    fn pe_parse_never_panics(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = Pe::parse(&data);
        let _ = Pe::parse_coff(&data);
    }

    /// PE DOS header magic handling.
    #[test]
    fn pe_dos_magic_handling(
        pe_offset in 64u32..256,
        rest in prop::collection::vec(any::<u8>(), 256..512)
    ) {
        let mut data = vec![0u8; 64];
        data[0..2].copy_from_slice(b"MZ");
        data[0x3C..0x40].copy_from_slice(&pe_offset.to_le_bytes());
        data.resize(pe_offset as usize, 0);
        data.extend_from_slice(b"PE\0\0");
        data.extend_from_slice(&rest);
        let _ = Pe::parse(&data);
    }

    /// Forged section and symbol counts in a COFF header.
    #[test]
    fn coff_count_handling(
        nsections in any::<u16>(),
        symtab in any::<u32>(),
        nsyms in any::<u32>()
    ) {
        let mut data = common::coff();
        data[2..4].copy_from_slice(&nsections.to_le_bytes());
        data[8..12].copy_from_slice(&symtab.to_le_bytes());
        data[12..16].copy_from_slice(&nsyms.to_le_bytes());
        let _ = Pe::parse_coff(&data);
    }

    /// Forged export directory location.
    #[test]
    fn pe_export_directory_handling(rva in any::<u32>(), size in any::<u32>()) {
        let mut data = common::pe(true);
        // first data directory of the PE32+ optional header
        let at = 0x98 + 112;
        data[at..at + 4].copy_from_slice(&rva.to_le_bytes());
        data[at + 4..at + 8].copy_from_slice(&size.to_le_bytes());
        if let Ok(pe) = Pe::parse(&data) {
            prop_assert!(pe.dynamic_symbols().len() <= pe.exports.len());
        }
    }
}

// =============================================================================
// Format Detection Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(3000))]

    /// Format detection never panics.
    #[test]
    fn detect_format_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = detect_format(&data);
    }

    /// ELF magic should be detected as ELF.
    #[test]
    fn elf_magic_detected(rest in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut data = vec![0x7F, b'E', b'L', b'F'];
        data.extend_from_slice(&rest);
        prop_assert_eq!(detect_format(&data), Ok(BinaryType::Elf));
    }

    /// PE magic should be detected as PE.
    #[test]
    fn pe_magic_detected(rest in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut data = vec![0u8; 0x80];
        data[0..2].copy_from_slice(b"MZ");
        data[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        data.extend_from_slice(b"PE\0\0");
        data.extend_from_slice(&rest);
        prop_assert_eq!(detect_format(&data), Ok(BinaryType::Pe));
    }
}

// =============================================================================
// File Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// File parsing is deterministic.
    #[test]
    fn file_parse_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(File::parse(&data), File::parse(&data));
    }

    /// Corrupting bytes of a valid image never panics, and whatever still
    /// parses is internally consistent.
    #[test]
    fn corrupted_images_stay_consistent(
        data in fixture(),
        edits in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8)
    ) {
        let mut data = data;
        for (at, byte) in edits {
            let at = at.index(data.len());
            data[at] = byte;
        }
        if let Ok(file) = File::parse(&data) {
            check_invariants(&file, data.len())?;
        }
    }

    /// Cutting a valid image short fails with OutOfBounds.
    #[test]
    fn truncated_images_fail(data in fixture(), cut in any::<prop::sample::Index>()) {
        let len = 4 + cut.index(data.len() - 4);
        let result = File::parse(&data[..len]);
        prop_assert!(
            matches!(result, Err(ParseError::OutOfBounds { .. })),
            "cut to {} of {} bytes: {:?}",
            len,
            data.len(),
            result
        );
    }

    /// Lookups agree with the section list for any valid image.
    #[test]
    fn lookups_match_sections(data in fixture(), index in any::<usize>()) {
        let file = File::parse(&data).unwrap();
        check_invariants(&file, data.len())?;
        let count = file.sections().len();
        match file.section_by_index(index) {
            Ok(section) => prop_assert_eq!(section.index, index),
            Err(_) => prop_assert!(index >= count),
        }
    }
}
