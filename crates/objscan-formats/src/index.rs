//! By-index and by-name section lookup.

use std::collections::HashMap;

use crate::LookupError;
use objscan_core::Section;

/// Lookup structures built once over a file's section list.
///
/// Sections are stored in table order, so lookup by index is a slice access.
/// The name map keeps the first section for each name; unnamed sections are
/// not entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionIndex {
    sections: Vec<Section>,
    by_name: HashMap<String, usize>,
}

impl SectionIndex {
    pub fn new(sections: Vec<Section>) -> Self {
        let mut by_name = HashMap::with_capacity(sections.len());
        for (position, section) in sections.iter().enumerate() {
            if !section.name.is_empty() {
                by_name.entry(section.name.clone()).or_insert(position);
            }
        }
        Self { sections, by_name }
    }

    /// All sections, in table order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn by_index(&self, index: usize) -> Result<&Section, LookupError> {
        self.sections
            .get(index)
            .ok_or(LookupError::IndexOutOfRange {
                index,
                count: self.sections.len(),
            })
    }

    pub fn by_name(&self, name: &str) -> Result<&Section, LookupError> {
        self.by_name
            .get(name)
            .map(|&position| &self.sections[position])
            .ok_or_else(|| LookupError::NotFound {
                name: name.to_string(),
            })
    }
}
