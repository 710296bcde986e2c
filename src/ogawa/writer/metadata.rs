//! Interning of short metadata strings shared across headers.

use std::collections::HashMap;

use crate::core::MetaData;
use crate::ogawa::property_info::INLINE_METADATA;

/// Most entries the table can hold besides the empty entry 0.
const MAX_ENTRIES: usize = 254;

/// Longest string that may be interned.
const MAX_ENTRY_LEN: usize = 255;

/// Archive-wide metadata table. Index 0 is the empty string; strings that do
/// not fit are stored inline with index `0xff`.
#[derive(Debug, Default)]
pub(crate) struct MetaDataTable {
    entries: Vec<String>,
    index: HashMap<String, u8>,
}

impl MetaDataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for `meta_data` and its serialized text, interning it when
    /// there is room.
    pub fn index_of(&mut self, meta_data: &MetaData) -> (u8, String) {
        let text = meta_data.serialize();
        if text.is_empty() {
            return (0, text);
        }
        if let Some(&i) = self.index.get(&text) {
            return (i, text);
        }
        if self.entries.len() >= MAX_ENTRIES || text.len() > MAX_ENTRY_LEN {
            return (INLINE_METADATA, text);
        }
        self.entries.push(text.clone());
        let i = self.entries.len() as u8;
        self.index.insert(text.clone(), i);
        (i, text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `u8` length + bytes for every entry after the implicit empty one.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.entries.iter().map(|e| e.len() + 1).sum());
        for entry in &self.entries {
            buf.push(entry.len() as u8);
            buf.extend_from_slice(entry.as_bytes());
        }
        buf
    }
}
