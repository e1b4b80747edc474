//! NUL-terminated string tables and fixed-width names.

use crate::cursor::ByteView;
use crate::ParseError;

/// A table of NUL-terminated strings addressed by byte offset.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    view: ByteView<'a>,
}

impl<'a> StringTable<'a> {
    pub fn new(view: ByteView<'a>) -> Self {
        Self { view }
    }

    pub fn empty() -> Self {
        Self {
            view: ByteView::new(&[]),
        }
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Returns the string at `offset`.
    ///
    /// Fails with [`ParseError::InvalidEncoding`] if the offset is past the
    /// end of the table, the string is not terminated inside it, or the
    /// bytes are not UTF-8.
    pub fn get(&self, offset: usize) -> Result<&'a str, ParseError> {
        let bytes = self.view.cstr(offset)?;
        std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidEncoding { offset })
    }

    /// Returns the string at `offset`, or an empty string if it is unusable.
    pub fn name_or_empty(&self, offset: usize, what: &str) -> String {
        match self.get(offset) {
            Ok(name) => name.to_owned(),
            Err(err) => {
                log::warn!("{what}: {err}; using an empty name");
                String::new()
            }
        }
    }
}

/// Decodes a NUL-padded fixed-width name field.
pub fn fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
