#![no_main]

use libfuzzer_sys::fuzz_target;
use objscan_formats::{detect_format, File};

fuzz_target!(|data: &[u8]| {
    let detected = detect_format(data);

    // Parse errors are expected for malformed input; panics are not.
    let Ok(file) = File::parse(data) else {
        return;
    };
    assert!(detected.is_ok());

    let _ = file.format().as_str();
    let _ = file.architecture().name();
    let _ = file.entry_point();

    for (i, section) in file.sections().iter().enumerate() {
        assert_eq!(section.index, i);
        assert!(section.align.is_power_of_two());
        if let Some((offset, len)) = section.file_range {
            assert!(offset + len <= data.len() as u64);
        }
        let found = file.section_by_name(&section.name);
        if !section.name.is_empty() {
            assert!(found.is_ok_and(|s| s.index <= i));
        }
    }
    assert!(file.section_by_index(file.sections().len()).is_err());

    for symbol in file.symbols().iter().chain(file.dynamic_symbols()) {
        let _ = symbol.name.len();
        let _ = symbol.address;
        let _ = symbol.size;
        let _ = symbol.kind.as_str();
    }

    // Parsing is a pure function of the input.
    assert_eq!(File::parse(data).ok().as_ref(), Some(&file));
});
