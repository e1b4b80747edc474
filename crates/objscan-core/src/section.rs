//! Unified section record.

/// One entry of a format's section table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section {
    /// 0-based position in the section table.
    pub index: usize,
    /// Section name (empty when the string table has no usable entry).
    pub name: String,
    /// Virtual address where the section is loaded (0 if unmapped).
    pub address: u64,
    /// Size in memory, in bytes.
    pub size: u64,
    /// Required alignment; always a power of two, 1 meaning no constraint.
    pub align: u64,
    /// `(offset, length)` of the on-disk contents, if the section has any.
    pub file_range: Option<(u64, u64)>,
}
