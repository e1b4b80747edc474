//! Bounds-checked reads over the input buffer.
//!
//! Every decoder reads the file through [`ByteView`] and [`Reader`]. Offsets
//! and sizes taken from headers are never used to index the buffer directly:
//! a range that does not fit fails with [`ParseError::OutOfBounds`], and
//! offset arithmetic that does not fit a `usize` fails with
//! [`ParseError::Overflow`].

use crate::ParseError;
use objscan_core::Endianness;

/// A read-only window into the input buffer.
///
/// `base` is the position of the window inside the original buffer, so
/// offsets read from a sub-view (a fat Mach-O slice, say) can be reported
/// against the buffer the caller handed in.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
    base: usize,
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, base: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of this view inside the original buffer.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Returns `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], ParseError> {
        let end = offset.checked_add(len).ok_or(ParseError::Overflow {
            context: "byte range",
        })?;
        if end > self.data.len() {
            return Err(ParseError::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            });
        }
        Ok(&self.data[offset..end])
    }

    /// Checks that a range given as raw header fields lies inside the view.
    pub fn check_range(&self, offset: u64, len: u64) -> Result<(), ParseError> {
        let offset = to_usize(offset, "range offset")?;
        let len = to_usize(len, "range length")?;
        self.bytes(offset, len).map(|_| ())
    }

    /// Returns a sub-view of `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<ByteView<'a>, ParseError> {
        let data = self.bytes(offset, len)?;
        Ok(Self {
            data,
            base: self.base + offset,
        })
    }

    /// Returns the sub-view from `offset` to the end of this view.
    pub fn tail(&self, offset: usize) -> Result<ByteView<'a>, ParseError> {
        if offset > self.data.len() {
            return Err(ParseError::OutOfBounds {
                offset,
                len: 0,
                size: self.data.len(),
            });
        }
        self.slice(offset, self.data.len() - offset)
    }

    /// Returns a table of `count` entries of `entry_size` bytes each.
    ///
    /// The whole table is checked at once, so a forged count fails here
    /// before any per-entry work is done.
    pub fn table(
        &self,
        offset: usize,
        count: usize,
        entry_size: usize,
    ) -> Result<&'a [u8], ParseError> {
        let len = count.checked_mul(entry_size).ok_or(ParseError::Overflow {
            context: "table size",
        })?;
        self.bytes(offset, len)
    }

    /// Returns the bytes from `offset` up to (not including) the next NUL.
    pub fn cstr(&self, offset: usize) -> Result<&'a [u8], ParseError> {
        let rest = self
            .data
            .get(offset..)
            .filter(|rest| !rest.is_empty())
            .ok_or(ParseError::InvalidEncoding { offset })?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ParseError::InvalidEncoding { offset })?;
        Ok(&rest[..end])
    }

    pub fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], ParseError> {
        let bytes = self.bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn u8(&self, offset: usize) -> Result<u8, ParseError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u16(&self, offset: usize, endian: Endianness) -> Result<u16, ParseError> {
        let bytes = self.array::<2>(offset)?;
        Ok(match endian {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn u32(&self, offset: usize, endian: Endianness) -> Result<u32, ParseError> {
        let bytes = self.array::<4>(offset)?;
        Ok(match endian {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn u64(&self, offset: usize, endian: Endianness) -> Result<u64, ParseError> {
        let bytes = self.array::<8>(offset)?;
        Ok(match endian {
            Endianness::Little => u64::from_le_bytes(bytes),
            Endianness::Big => u64::from_be_bytes(bytes),
        })
    }

    /// Starts a sequential reader at `offset`.
    pub fn reader(&self, offset: usize, endian: Endianness) -> Result<Reader<'a>, ParseError> {
        Ok(Reader {
            view: self.tail(offset)?,
            pos: 0,
            endian,
        })
    }
}

/// Sequential field reader used to decode fixed-layout headers.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    view: ByteView<'a>,
    pos: usize,
    endian: Endianness,
}

impl<'a> Reader<'a> {
    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.bytes(len).map(|_| ())
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let out = self.view.bytes(self.pos, len)?;
        self.pos += len;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let out = self.view.array::<N>(self.pos)?;
        self.pos += N;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, ParseError> {
        let v = self.view.u8(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn u16(&mut self) -> Result<u16, ParseError> {
        let v = self.view.u16(self.pos, self.endian)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn u32(&mut self) -> Result<u32, ParseError> {
        let v = self.view.u32(self.pos, self.endian)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn u64(&mut self) -> Result<u64, ParseError> {
        let v = self.view.u64(self.pos, self.endian)?;
        self.pos += 8;
        Ok(v)
    }

    /// Reads an address-sized word: 8 bytes when `is_64`, else 4.
    pub fn word(&mut self, is_64: bool) -> Result<u64, ParseError> {
        if is_64 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }
}

/// Converts a header-supplied 64-bit quantity to `usize`.
pub fn to_usize(value: u64, context: &'static str) -> Result<usize, ParseError> {
    usize::try_from(value).map_err(|_| ParseError::Overflow { context })
}
