#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use objscan_formats::macho::MachO;
use objscan_formats::{BinaryFormat, File};

const MH_MAGIC: u32 = 0xfeedface;
const MH_MAGIC_64: u32 = 0xfeedfacf;
const FAT_MAGIC: u32 = 0xcafebabe;

const LC_SEGMENT: u32 = 0x1;
const LC_SYMTAB: u32 = 0x2;
const LC_DYSYMTAB: u32 = 0xb;
const LC_SEGMENT_64: u32 = 0x19;
const LC_MAIN: u32 = 0x80000028;

#[derive(Debug, Arbitrary)]
struct FuzzedMachO {
    is_64bit: bool,
    is_big_endian: bool,
    /// Wrap the image in a one-slice fat header.
    fat: bool,
    cputype: u32,
    filetype: u32,

    segments: Vec<FuzzedSegment>,
    symtab: Option<FuzzedSymtab>,
    dysymtab: Option<[u32; 6]>,
    main_entryoff: Option<u64>,

    /// Lands right after the load commands, where the offsets above point.
    payload: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
struct FuzzedSegment {
    segname: [u8; 16],
    vmaddr: u64,
    fileoff: u64,
    filesize: u64,
    sections: Vec<FuzzedSection>,
}

#[derive(Debug, Arbitrary)]
struct FuzzedSection {
    sectname: [u8; 16],
    addr: u64,
    size: u64,
    offset: u16,
    align: u8,
    flags: u32,
}

#[derive(Debug, Arbitrary)]
struct FuzzedSymtab {
    symoff: u16,
    nsyms: u16,
    stroff: u16,
    strsize: u16,
}

struct Writer {
    data: Vec<u8>,
    big: bool,
}

impl Writer {
    fn u32(&mut self, v: u32) {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.data.extend_from_slice(&bytes);
    }

    fn u64(&mut self, v: u64) {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.data.extend_from_slice(&bytes);
    }

    fn word(&mut self, is_64: bool, v: u64) {
        if is_64 {
            self.u64(v)
        } else {
            self.u32(v as u32)
        }
    }
}

impl FuzzedMachO {
    fn to_bytes(&self) -> Vec<u8> {
        let is_64 = self.is_64bit;
        let mut cmds = Writer {
            data: Vec::new(),
            big: self.is_big_endian,
        };
        let mut ncmds = 0u32;

        for seg in &self.segments {
            let (header, section_size) = if is_64 { (72, 80) } else { (56, 68) };
            cmds.u32(if is_64 { LC_SEGMENT_64 } else { LC_SEGMENT });
            cmds.u32((header + seg.sections.len() * section_size) as u32);
            cmds.data.extend_from_slice(&seg.segname);
            cmds.word(is_64, seg.vmaddr);
            cmds.word(is_64, 0x1000);
            cmds.word(is_64, seg.fileoff);
            cmds.word(is_64, seg.filesize);
            cmds.u32(7);
            cmds.u32(5);
            cmds.u32(seg.sections.len() as u32);
            cmds.u32(0);

            for sect in &seg.sections {
                cmds.data.extend_from_slice(&sect.sectname);
                cmds.data.extend_from_slice(&seg.segname);
                cmds.word(is_64, sect.addr);
                cmds.word(is_64, sect.size);
                cmds.u32(sect.offset.into());
                cmds.u32(sect.align.into());
                cmds.u32(0); // reloff
                cmds.u32(0); // nreloc
                cmds.u32(sect.flags);
                cmds.u32(0); // reserved1
                cmds.u32(0); // reserved2
                if is_64 {
                    cmds.u32(0); // reserved3
                }
            }
            ncmds += 1;
        }

        if let Some(symtab) = &self.symtab {
            cmds.u32(LC_SYMTAB);
            cmds.u32(24);
            cmds.u32(symtab.symoff.into());
            cmds.u32(symtab.nsyms.into());
            cmds.u32(symtab.stroff.into());
            cmds.u32(symtab.strsize.into());
            ncmds += 1;
        }

        if let Some(ranges) = &self.dysymtab {
            cmds.u32(LC_DYSYMTAB);
            cmds.u32(80);
            for &v in ranges {
                cmds.u32(v % 64);
            }
            for _ in 0..12 {
                cmds.u32(0);
            }
            ncmds += 1;
        }

        if let Some(entryoff) = self.main_entryoff {
            cmds.u32(LC_MAIN);
            cmds.u32(24);
            cmds.u64(entryoff);
            cmds.u64(0);
            ncmds += 1;
        }

        let mut image = Writer {
            data: Vec::new(),
            big: self.is_big_endian,
        };
        image.u32(if is_64 { MH_MAGIC_64 } else { MH_MAGIC });
        image.u32(self.cputype);
        image.u32(0);
        image.u32(self.filetype);
        image.u32(ncmds);
        image.u32(cmds.data.len() as u32);
        image.u32(0);
        if is_64 {
            image.u32(0);
        }
        image.data.extend_from_slice(&cmds.data);
        image.data.extend_from_slice(&self.payload);

        if !self.fat {
            return image.data;
        }
        let mut fat = Writer {
            data: Vec::new(),
            big: true,
        };
        fat.u32(FAT_MAGIC);
        fat.u32(1);
        fat.u32(self.cputype);
        fat.u32(0);
        fat.u32(0x1000);
        fat.u32(image.data.len() as u32);
        fat.u32(12);
        fat.data.resize(0x1000, 0);
        fat.data.extend_from_slice(&image.data);
        fat.data
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(fuzzed) = FuzzedMachO::arbitrary(&mut Unstructured::new(data)) {
        test_macho_parsing(&fuzzed.to_bytes());
    }

    // Also test raw input
    test_macho_parsing(data);
});

fn test_macho_parsing(data: &[u8]) {
    let Ok(macho) = MachO::parse(data) else {
        return;
    };
    let _ = macho.architecture();
    let _ = macho.entry_point();
    let _ = macho.segment_by_name("__TEXT");
    let _ = macho.segment_by_name("__LINKEDIT");

    for section in macho.sections() {
        assert!(section.align.is_power_of_two());
        if let Some((offset, len)) = section.file_range {
            assert!(offset + len <= data.len() as u64);
        }
    }
    for symbol in macho.symbols().iter().chain(macho.dynamic_symbols()) {
        let _ = symbol.name.len();
        let _ = symbol.kind;
    }

    // The facade must agree with the decoder.
    let file = File::parse(data).expect("facade rejected a valid Mach-O");
    assert_eq!(file.sections(), macho.sections());
    assert_eq!(file.symbols(), macho.symbols());
}
