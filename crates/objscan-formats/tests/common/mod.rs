//! In-memory builders for small, valid object files.
//!
//! Every image ends inside a range its headers declare (a section header
//! table, a string table or section contents), so cutting bytes off the end
//! always leaves a declared range unreadable.

#![allow(dead_code)]

/// Byte sink that writes integers in a fixed byte order.
pub struct Out {
    pub buf: Vec<u8>,
    big: bool,
}

impl Out {
    pub fn new(big: bool) -> Self {
        Self {
            buf: Vec::new(),
            big,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.bytes(&bytes)
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.bytes(&bytes)
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        let bytes = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.bytes(&bytes)
    }

    /// Writes an address-sized word.
    pub fn word(&mut self, is_64: bool, v: u64) -> &mut Self {
        if is_64 {
            self.u64(v)
        } else {
            self.u32(v as u32)
        }
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn pad_to(&mut self, len: usize) -> &mut Self {
        assert!(self.buf.len() <= len, "already past {len:#x}");
        self.buf.resize(len, 0);
        self
    }
}

/// Builds a NUL-separated string table with a leading empty string and
/// returns it with the offset of each name.
pub fn string_table(names: &[&str]) -> (Vec<u8>, Vec<u32>) {
    let mut table = vec![0u8];
    let mut offsets = Vec::with_capacity(names.len());
    for name in names {
        offsets.push(table.len() as u32);
        table.extend_from_slice(name.as_bytes());
        table.push(0);
    }
    (table, offsets)
}

fn fixed<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

// =============================================================================
// ELF
// =============================================================================

pub const ELF_TEXT_ADDR: u64 = 0x40_1000;
pub const ELF_DATA_ADDR: u64 = 0x40_2000;
pub const ELF_BSS_ADDR: u64 = 0x40_2040;

pub const ELF_SECTION_NAMES: [&str; 9] = [
    "",
    ".text",
    ".data",
    ".bss",
    ".dynstr",
    ".dynsym",
    ".strtab",
    ".symtab",
    ".shstrtab",
];

struct ElfSection {
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    contents: Vec<u8>,
    nobits_size: u64,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
}

impl ElfSection {
    fn new(name: u32, sh_type: u32, flags: u64, addr: u64, contents: Vec<u8>) -> Self {
        Self {
            name,
            sh_type,
            flags,
            addr,
            contents,
            nobits_size: 0,
            link: 0,
            info: 0,
            align: 1,
            entsize: 0,
        }
    }
}

fn elf_symbol(out: &mut Out, is_64: bool, name: u32, info: u8, shndx: u16, value: u64, size: u64) {
    if is_64 {
        out.u32(name).u8(info).u8(0).u16(shndx).u64(value).u64(size);
    } else {
        out.u32(name)
            .u32(value as u32)
            .u32(size as u32)
            .u8(info)
            .u8(0)
            .u16(shndx);
    }
}

/// An executable with `.text`, `.data`, `.bss`, a dynamic symbol table and
/// a regular symbol table. The section header table is last.
///
/// Machines: x86-64 (64 LE), x86 (32 LE), PowerPC64 (64 BE), PowerPC (32 BE).
pub fn elf(is_64: bool, big: bool) -> Vec<u8> {
    let machine: u16 = match (is_64, big) {
        (true, false) => 62,
        (false, false) => 3,
        (true, true) => 21,
        (false, true) => 20,
    };
    let header_size: usize = if is_64 { 64 } else { 52 };
    let shentsize: u16 = if is_64 { 64 } else { 40 };
    let sym_size: u64 = if is_64 { 24 } else { 16 };

    let (dynstr, dyn_names) = string_table(&["puts", "counter"]);
    let (strtab, names) = string_table(&["main", "counter", "buffer"]);
    let (shstrtab, sh_names) = string_table(&ELF_SECTION_NAMES[1..]);

    let mut dynsym = Out::new(big);
    elf_symbol(&mut dynsym, is_64, 0, 0, 0, 0, 0);
    elf_symbol(&mut dynsym, is_64, dyn_names[0], 0x12, 0, 0, 0);
    elf_symbol(&mut dynsym, is_64, dyn_names[1], 0x11, 2, ELF_DATA_ADDR, 8);

    let mut symtab = Out::new(big);
    elf_symbol(&mut symtab, is_64, 0, 0, 0, 0, 0);
    elf_symbol(&mut symtab, is_64, 0, 0x03, 1, ELF_TEXT_ADDR, 0);
    elf_symbol(&mut symtab, is_64, names[0], 0x12, 1, ELF_TEXT_ADDR, 16);
    elf_symbol(&mut symtab, is_64, names[1], 0x11, 2, ELF_DATA_ADDR, 8);
    elf_symbol(&mut symtab, is_64, names[2], 0x11, 3, ELF_BSS_ADDR, 0x40);

    let mut text = ElfSection::new(sh_names[0], 1, 0x6, ELF_TEXT_ADDR, vec![0x90; 16]);
    text.align = 16;
    let mut data = ElfSection::new(sh_names[1], 1, 0x3, ELF_DATA_ADDR, vec![0xaa; 8]);
    data.align = 8;
    let mut bss = ElfSection::new(sh_names[2], 8, 0x3, ELF_BSS_ADDR, Vec::new());
    bss.nobits_size = 0x40;
    bss.align = 32;
    let dynstr = ElfSection::new(sh_names[3], 3, 0x2, 0, dynstr);
    let mut dynsym = ElfSection::new(sh_names[4], 11, 0x2, 0, dynsym.buf);
    dynsym.link = 4;
    dynsym.info = 1;
    dynsym.align = 8;
    dynsym.entsize = sym_size;
    let strtab = ElfSection::new(sh_names[5], 3, 0, 0, strtab);
    let mut symtab = ElfSection::new(sh_names[6], 2, 0, 0, symtab.buf);
    symtab.link = 6;
    symtab.info = 2;
    symtab.align = 8;
    symtab.entsize = sym_size;
    let shstrtab = ElfSection::new(sh_names[7], 3, 0, 0, shstrtab);
    let sections = [text, data, bss, dynstr, dynsym, strtab, symtab, shstrtab];

    let mut body = Vec::new();
    let mut offsets = Vec::with_capacity(sections.len());
    for section in &sections {
        offsets.push((header_size + body.len()) as u64);
        body.extend_from_slice(&section.contents);
    }
    let shoff = (header_size + body.len()) as u64;

    let mut out = Out::new(big);
    out.bytes(&[0x7f, b'E', b'L', b'F'])
        .u8(if is_64 { 2 } else { 1 })
        .u8(if big { 2 } else { 1 })
        .u8(1)
        .u8(0)
        .bytes(&[0; 8]);
    out.u16(2).u16(machine).u32(1);
    out.word(is_64, ELF_TEXT_ADDR).word(is_64, 0).word(is_64, shoff);
    out.u32(0)
        .u16(header_size as u16)
        .u16(0)
        .u16(0)
        .u16(shentsize)
        .u16(sections.len() as u16 + 1)
        .u16(sections.len() as u16);
    assert_eq!(out.len(), header_size);
    out.bytes(&body);

    // null section
    out.bytes(&[0; 64][..usize::from(shentsize)]);
    for (section, offset) in sections.iter().zip(offsets) {
        let size = if section.sh_type == 8 {
            section.nobits_size
        } else {
            section.contents.len() as u64
        };
        out.u32(section.name).u32(section.sh_type);
        out.word(is_64, section.flags)
            .word(is_64, section.addr)
            .word(is_64, offset)
            .word(is_64, size);
        out.u32(section.link).u32(section.info);
        out.word(is_64, section.align).word(is_64, section.entsize);
    }
    out.buf
}

// =============================================================================
// Mach-O
// =============================================================================

pub const CPU_TYPE_X86: u32 = 7;
pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;
pub const CPU_TYPE_ARM64: u32 = 0x0100_000c;
pub const CPU_TYPE_POWERPC: u32 = 18;
pub const CPU_TYPE_POWERPC64: u32 = 0x0100_0012;

/// Layout facts of a [`macho`] image, for assertions.
#[derive(Debug, Clone, Copy)]
pub struct MachLayout {
    pub text_vmaddr: u64,
    pub text_offset: u64,
    pub data_offset: u64,
}

impl MachLayout {
    pub fn new(is_64: bool) -> Self {
        let segment = |nsects: usize| {
            if is_64 {
                72 + nsects * 80
            } else {
                56 + nsects * 68
            }
        };
        let header = if is_64 { 32 } else { 28 };
        // __TEXT, __DATA, LC_SYMTAB, LC_DYSYMTAB, LC_MAIN
        let commands = segment(1) + segment(2) + 24 + 80 + 24;
        let text_offset = (header + commands) as u64;
        Self {
            text_vmaddr: if is_64 { 0x1_0000_0000 } else { 0x1000 },
            text_offset,
            data_offset: text_offset + 16,
        }
    }

    pub fn text_addr(&self) -> u64 {
        self.text_vmaddr + self.text_offset
    }

    pub fn data_addr(&self) -> u64 {
        self.text_vmaddr + 0x1000
    }
}

fn macho_default_cpu(is_64: bool, big: bool) -> u32 {
    match (is_64, big) {
        (true, false) => CPU_TYPE_X86_64,
        (false, false) => CPU_TYPE_X86,
        (true, true) => CPU_TYPE_POWERPC64,
        (false, true) => CPU_TYPE_POWERPC,
    }
}

/// An executable with `__TEXT,__text`, `__DATA,__data`, `__DATA,__bss`,
/// a symbol table (one local, two exported, one imported symbol), a dynamic
/// symbol table and `LC_MAIN`. The string table is last.
pub fn macho(is_64: bool, big: bool) -> Vec<u8> {
    macho_with_cpu(is_64, big, macho_default_cpu(is_64, big))
}

pub fn macho_with_cpu(is_64: bool, big: bool, cputype: u32) -> Vec<u8> {
    let layout = MachLayout::new(is_64);
    let nlist_size = if is_64 { 16 } else { 12 };
    let (strtab, names) = string_table(&["_helper", "_main", "_counter", "_puts"]);
    let symoff = layout.data_offset + 8;
    let stroff = symoff + 4 * nlist_size;

    let mut cmds = Out::new(big);
    macho_segment(
        &mut cmds,
        is_64,
        "__TEXT",
        layout.text_vmaddr,
        0,
        layout.data_offset,
        &[("__text", layout.text_addr(), 16, layout.text_offset, 4, 0x8000_0400)],
    );
    macho_segment(
        &mut cmds,
        is_64,
        "__DATA",
        layout.data_addr(),
        layout.data_offset,
        8,
        &[
            ("__data", layout.data_addr(), 8, layout.data_offset, 3, 0),
            ("__bss", layout.data_addr() + 8, 0x40, 0, 5, 0x1),
        ],
    );
    // LC_SYMTAB
    cmds.u32(0x2)
        .u32(24)
        .u32(symoff as u32)
        .u32(4)
        .u32(stroff as u32)
        .u32(strtab.len() as u32);
    // LC_DYSYMTAB: 1 local, 2 exported from 1, 1 undefined from 3
    cmds.u32(0xb).u32(80);
    for v in [0, 1, 1, 2, 3, 1] {
        cmds.u32(v);
    }
    for _ in 0..12 {
        cmds.u32(0);
    }
    // LC_MAIN
    cmds.u32(0x8000_0028).u32(24).u64(layout.text_offset).u64(0);

    let mut out = Out::new(big);
    out.u32(if is_64 { 0xfeed_facf } else { 0xfeed_face })
        .u32(cputype)
        .u32(3)
        .u32(0x2)
        .u32(5)
        .u32(cmds.len() as u32)
        .u32(0);
    if is_64 {
        out.u32(0);
    }
    out.bytes(&cmds.buf);
    assert_eq!(out.len() as u64, layout.text_offset);
    out.bytes(&[0xcc; 16]).bytes(&[0x55; 8]);

    for (strx, n_type, n_sect, value) in [
        (names[0], 0x0e, 1, layout.text_addr() + 8),
        (names[1], 0x0f, 1, layout.text_addr()),
        (names[2], 0x0f, 2, layout.data_addr()),
        (names[3], 0x01, 0, 0),
    ] {
        out.u32(strx).u8(n_type).u8(n_sect).u16(0).word(is_64, value);
    }
    assert_eq!(out.len() as u64, stroff);
    out.bytes(&strtab);
    out.buf
}

fn macho_segment(
    out: &mut Out,
    is_64: bool,
    segname: &str,
    vmaddr: u64,
    fileoff: u64,
    filesize: u64,
    sections: &[(&str, u64, u64, u64, u32, u32)],
) {
    let (header, section_size) = if is_64 { (72, 80) } else { (56, 68) };
    out.u32(if is_64 { 0x19 } else { 0x1 })
        .u32((header + sections.len() * section_size) as u32)
        .bytes(&fixed::<16>(segname));
    out.word(is_64, vmaddr)
        .word(is_64, 0x1000)
        .word(is_64, fileoff)
        .word(is_64, filesize);
    out.u32(7).u32(5).u32(sections.len() as u32).u32(0);
    for &(sectname, addr, size, offset, align, flags) in sections {
        out.bytes(&fixed::<16>(sectname)).bytes(&fixed::<16>(segname));
        out.word(is_64, addr).word(is_64, size);
        out.u32(offset as u32)
            .u32(align)
            .u32(0)
            .u32(0)
            .u32(flags)
            .u32(0)
            .u32(0);
        if is_64 {
            out.u32(0);
        }
    }
}

pub const FAT_ARM64_OFFSET: u64 = 0x1000;
pub const FAT_X86_64_OFFSET: u64 = 0x2000;

/// A universal binary whose table lists an x86-64 slice first, although the
/// arm64 slice is stored first in the file.
pub fn macho_fat() -> Vec<u8> {
    let arm64 = macho_with_cpu(true, false, CPU_TYPE_ARM64);
    let x86_64 = macho_with_cpu(true, false, CPU_TYPE_X86_64);

    let mut out = Out::new(true);
    out.u32(0xcafe_babe).u32(2);
    out.u32(CPU_TYPE_X86_64)
        .u32(3)
        .u32(FAT_X86_64_OFFSET as u32)
        .u32(x86_64.len() as u32)
        .u32(12);
    out.u32(CPU_TYPE_ARM64)
        .u32(0)
        .u32(FAT_ARM64_OFFSET as u32)
        .u32(arm64.len() as u32)
        .u32(12);
    out.pad_to(FAT_ARM64_OFFSET as usize).bytes(&arm64);
    out.pad_to(FAT_X86_64_OFFSET as usize).bytes(&x86_64);
    out.buf
}

// =============================================================================
// PE / COFF
// =============================================================================

pub const PE32_IMAGE_BASE: u64 = 0x40_0000;
pub const PE64_IMAGE_BASE: u64 = 0x1_4000_0000;
pub const PE_SECTION_ALIGNMENT: u32 = 0x1000;
pub const PE_SYMBOL_TABLE: usize = 0x600;
pub const PE_LONG_SYMBOL: &str = "a_long_symbol_name";

fn coff_section(
    out: &mut Out,
    name: [u8; 8],
    virtual_size: u32,
    virtual_address: u32,
    raw_size: u32,
    raw_ptr: u32,
    characteristics: u32,
) {
    out.bytes(&name)
        .u32(virtual_size)
        .u32(virtual_address)
        .u32(raw_size)
        .u32(raw_ptr)
        .u32(0)
        .u32(0)
        .u16(0)
        .u16(0)
        .u32(characteristics);
}

fn coff_symbol(
    out: &mut Out,
    name: [u8; 8],
    value: u32,
    section: i16,
    typ: u16,
    class: u8,
    aux: u8,
) {
    out.bytes(&name)
        .u32(value)
        .u16(section as u16)
        .u16(typ)
        .u8(class)
        .u8(aux);
}

/// Name field pointing into the string table.
fn long_name(offset: u32) -> [u8; 8] {
    let mut name = [0u8; 8];
    name[4..].copy_from_slice(&offset.to_le_bytes());
    name
}

/// `.rdata` contents holding an export directory at RVA 0x2000: `alpha`
/// (code), `beta` (data), one forwarder and one ordinal-only export.
fn export_data() -> Vec<u8> {
    let mut raw = vec![0u8; 0x200];
    // directory: name, base, functions, names, and the three table RVAs
    put_u32(&mut raw, 12, 0x2060);
    put_u32(&mut raw, 16, 1);
    put_u32(&mut raw, 20, 4);
    put_u32(&mut raw, 24, 2);
    put_u32(&mut raw, 28, 0x2028);
    put_u32(&mut raw, 32, 0x2038);
    put_u32(&mut raw, 36, 0x2040);
    for (i, rva) in [0x1000, 0x2090, 0x2070, 0x1010].into_iter().enumerate() {
        put_u32(&mut raw, 0x28 + i * 4, rva);
    }
    put_u32(&mut raw, 0x38, 0x2050);
    put_u32(&mut raw, 0x3c, 0x2058);
    put_u16(&mut raw, 0x40, 0);
    put_u16(&mut raw, 0x42, 1);
    raw[0x50..0x56].copy_from_slice(b"alpha\0");
    raw[0x58..0x5d].copy_from_slice(b"beta\0");
    raw[0x60..0x6c].copy_from_slice(b"fixture.dll\0");
    raw[0x70..0x7e].copy_from_slice(b"KERNEL32.Sleep");
    raw
}

/// A DLL with `.text`, `.rdata` (exports) and `.bss`. The PE32+ variant
/// also carries a COFF symbol table and string table, which end the file;
/// the PE32 variant ends with `.rdata`.
pub fn pe(is_64: bool) -> Vec<u8> {
    let optional_size: u16 = if is_64 { 240 } else { 224 };
    let image_base = if is_64 { PE64_IMAGE_BASE } else { PE32_IMAGE_BASE };
    let (symbol_table, symbol_count) = if is_64 { (PE_SYMBOL_TABLE as u32, 7) } else { (0, 0) };

    let mut out = Out::new(false);
    out.bytes(b"MZ").pad_to(0x3c).u32(0x80).pad_to(0x80);
    out.bytes(b"PE\0\0");
    out.u16(if is_64 { 0x8664 } else { 0x14c })
        .u16(3)
        .u32(0)
        .u32(symbol_table)
        .u32(symbol_count)
        .u16(optional_size)
        .u16(0x2002);

    let optional_start = out.len();
    out.u16(if is_64 { 0x20b } else { 0x10b })
        .u8(14)
        .u8(0)
        .u32(0x200)
        .u32(0x200)
        .u32(0)
        .u32(0x1000)
        .u32(0x1000);
    if is_64 {
        out.u64(image_base);
    } else {
        out.u32(0x2000).u32(image_base as u32);
    }
    out.u32(PE_SECTION_ALIGNMENT).u32(0x200);
    out.bytes(&[0; 16]);
    out.u32(0x4000).u32(0x200).u32(0).u16(3).u16(0);
    for _ in 0..4 {
        out.word(is_64, 0x1000);
    }
    out.u32(0).u32(16);
    // export directory, then 15 empty directories
    out.u32(0x2000).u32(0x80);
    out.bytes(&[0; 15 * 8]);
    assert_eq!(out.len() - optional_start, usize::from(optional_size));

    coff_section(&mut out, fixed(".text"), 0x200, 0x1000, 0x200, 0x200, 0x6000_0020);
    coff_section(&mut out, fixed(".rdata"), 0x200, 0x2000, 0x200, 0x400, 0x4000_0040);
    coff_section(&mut out, fixed(".bss"), 0x100, 0x3000, 0, 0, 0xc000_0080);

    out.pad_to(0x200).bytes(&[0xc3; 0x200]);
    out.bytes(&export_data());

    if is_64 {
        assert_eq!(out.len(), PE_SYMBOL_TABLE);
        let (strings, offsets) = string_table(&[PE_LONG_SYMBOL]);
        // .file + aux
        coff_symbol(&mut out, fixed(".file"), 0, -2, 0, 103, 1);
        out.bytes(&fixed::<18>("fixture.c"));
        // .text section definition + aux
        coff_symbol(&mut out, fixed(".text"), 0, 1, 0, 3, 1);
        out.u32(0x200).bytes(&[0; 14]);
        coff_symbol(&mut out, fixed("main"), 0x10, 1, 0x20, 2, 0);
        coff_symbol(&mut out, long_name(offsets[0] + 3), 0x90, 2, 0, 2, 0);
        coff_symbol(&mut out, fixed("__imp_x"), 0, 0, 0, 2, 0);
        // The length includes its own four bytes; string_table's leading
        // NUL is dropped in favour of the length field.
        out.u32(3 + strings.len() as u32).bytes(&strings[1..]);
    }
    out.buf
}

/// A relocatable x86-64 COFF object with `.text` and a long-named
/// `.debug_info`, three symbols and a string table, which ends the file.
pub fn coff() -> Vec<u8> {
    let (strings, offsets) = string_table(&[".debug_info", "extern_fn"]);
    // String table offsets count the four length bytes, not the leading NUL.
    let str_offset = |i: usize| offsets[i] + 3;

    let mut out = Out::new(false);
    out.u16(0x8664).u16(2).u32(0).u32(124).u32(4).u16(0).u16(0);

    coff_section(&mut out, fixed(".text"), 0, 0, 16, 100, 0x6050_0020);
    let mut debug_name = [0u8; 8];
    let reference = format!("/{}", str_offset(0));
    debug_name[..reference.len()].copy_from_slice(reference.as_bytes());
    coff_section(&mut out, debug_name, 0, 0, 8, 116, 0x4210_0040);
    assert_eq!(out.len(), 100);

    out.bytes(&[0x90; 16]).bytes(&[0; 8]);

    coff_symbol(&mut out, fixed(".text"), 0, 1, 0, 3, 1);
    out.u32(16).bytes(&[0; 14]);
    coff_symbol(&mut out, fixed("main"), 4, 1, 0x20, 2, 0);
    coff_symbol(&mut out, long_name(str_offset(1)), 0, 0, 0x20, 2, 0);
    out.u32(3 + strings.len() as u32).bytes(&strings[1..]);
    out.buf
}

/// Every fixture, labelled, for tests that run over all formats.
pub fn all() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("elf32-le", elf(false, false)),
        ("elf32-be", elf(false, true)),
        ("elf64-le", elf(true, false)),
        ("elf64-be", elf(true, true)),
        ("macho32-le", macho(false, false)),
        ("macho32-be", macho(false, true)),
        ("macho64-le", macho(true, false)),
        ("macho64-be", macho(true, true)),
        ("macho-fat", macho_fat()),
        ("pe32", pe(false)),
        ("pe32+", pe(true)),
        ("coff", coff()),
    ]
}
