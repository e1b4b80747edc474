//! # objscan-core
//!
//! Format-agnostic records describing what an object file contains. The
//! parsers in `objscan-formats` decode ELF, Mach-O, PE and COFF images into
//! these types, so callers only ever deal with one shape of symbol and one
//! shape of section.

pub mod arch;
pub mod format;
pub mod section;
pub mod symbol;

pub use arch::{Architecture, Endianness};
pub use format::Format;
pub use section::Section;
pub use symbol::{Symbol, SymbolKind};
