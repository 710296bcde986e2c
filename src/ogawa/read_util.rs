//! Decoding of the archive tables and header blocks.
//!
//! Every function here works on the bytes of one data block; fetching the
//! block is the caller's business.

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};

use super::property_info::{ChangeRange, PropertyInfo, INLINE_METADATA};
use super::writer::constants::{COMPOUND_TRAILER_SIZE, OBJECT_TRAILER_SIZE};
use crate::core::{Digest, MetaData, ObjectHeader, PropertyHeader, PropertyType, TimeSampling};
use crate::util::{Dimensions, Error, Result};

/// Newest archive format version understood.
pub const ALEMBIC_OGAWA_FILE_VERSION: i32 = 0;

/// Oldest library version whose archives use this layout.
pub const MIN_ALEMBIC_VERSION: i32 = 9999;

/// Byte cursor whose short reads become structure errors naming `what`.
struct Fields<'a> {
    cursor: Cursor<&'a [u8]>,
    what: &'static str,
}

impl<'a> Fields<'a> {
    fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            what,
        }
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        (len - self.cursor.position().min(len)) as usize
    }

    fn pos(&self) -> usize {
        self.cursor.position() as usize
    }

    fn truncated(&self, err: io::Error) -> Error {
        Error::invalid(format!("{} truncated at byte {}: {err}", self.what, self.pos()))
    }

    fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|e| self.truncated(e))
    }

    fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|e| self.truncated(e))
    }

    fn f64(&mut self) -> Result<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(|e| self.truncated(e))
    }

    /// A `u8`, `u16` or `u32` depending on `hint`.
    fn sized(&mut self, hint: u8) -> Result<u32> {
        let value = match hint {
            0 => self.cursor.read_u8().map(u32::from),
            1 => self.cursor.read_u16::<LittleEndian>().map(u32::from),
            _ => self.cursor.read_u32::<LittleEndian>(),
        };
        value.map_err(|e| self.truncated(e))
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::invalid(format!(
                "{} truncated at byte {}: need {len} bytes, have {}",
                self.what,
                self.pos(),
                self.remaining()
            )));
        }
        let start = self.pos();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    fn string(&mut self, len: usize) -> Result<String> {
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(Error::from)
    }
}

/// Little-endian `i32` stored alone in a block.
pub fn parse_i32(bytes: &[u8], what: &'static str) -> Result<i32> {
    if bytes.len() != 4 {
        return Err(Error::invalid(format!("{what} is {} bytes, expected 4", bytes.len())));
    }
    let mut cursor = Cursor::new(bytes);
    cursor.read_i32::<LittleEndian>().map_err(Error::from)
}

/// The time sampling table and the sample count recorded for each entry.
pub fn parse_time_samplings(bytes: &[u8]) -> Result<(Vec<TimeSampling>, Vec<u32>)> {
    let mut fields = Fields::new(bytes, "time sampling table");
    let mut samplings = Vec::new();
    let mut max_samples = Vec::new();
    while fields.remaining() > 0 {
        max_samples.push(fields.u32()?);
        let time_per_cycle = fields.f64()?;
        let count = fields.u32()? as usize;
        if count == 0 || count.saturating_mul(8) > fields.remaining() {
            return Err(Error::invalid(format!(
                "time sampling {} claims {count} stored times",
                samplings.len()
            )));
        }
        let times = (0..count).map(|_| fields.f64()).collect::<Result<Vec<_>>>()?;
        samplings.push(TimeSampling::from_stored(time_per_cycle, times)?);
    }
    if samplings.is_empty() {
        samplings.push(TimeSampling::identity());
        max_samples.push(0);
    }
    Ok((samplings, max_samples))
}

/// The interned metadata table; entry 0 is always empty.
pub fn parse_indexed_metadata(bytes: &[u8]) -> Result<Vec<MetaData>> {
    let mut fields = Fields::new(bytes, "indexed metadata");
    let mut table = vec![MetaData::new()];
    while fields.remaining() > 0 {
        let len = fields.u8()? as usize;
        let text = fields.string(len)?;
        table.push(MetaData::parse(&text));
    }
    if table.len() > usize::from(INLINE_METADATA) {
        return Err(Error::invalid(format!("{} indexed metadata entries", table.len())));
    }
    Ok(table)
}

fn lookup_metadata(table: &[MetaData], index: u8) -> Result<MetaData> {
    table
        .get(usize::from(index))
        .cloned()
        .ok_or_else(|| Error::invalid(format!("metadata index {index} not in table of {}", table.len())))
}

/// Child headers of an object plus the two hashes that close the block.
#[derive(Clone, Debug)]
pub struct ParsedObjectHeaders {
    pub children: Vec<ObjectHeader>,
    pub properties_hash: Digest,
    pub children_hash: Digest,
}

pub fn parse_object_headers(
    bytes: &[u8],
    parent_path: &str,
    table: &[MetaData],
) -> Result<ParsedObjectHeaders> {
    if bytes.is_empty() {
        return Ok(ParsedObjectHeaders {
            children: Vec::new(),
            properties_hash: Digest::ZERO,
            children_hash: Digest::ZERO,
        });
    }
    if bytes.len() < OBJECT_TRAILER_SIZE {
        return Err(Error::invalid(format!("object headers block of {} bytes", bytes.len())));
    }
    let (entries, trailer) = bytes.split_at(bytes.len() - OBJECT_TRAILER_SIZE);
    let (properties_hash, children_hash) = trailer.split_at(16);

    let mut fields = Fields::new(entries, "object header");
    let mut children = Vec::new();
    while fields.remaining() > 0 {
        let name_len = fields.u32()? as usize;
        if name_len == 0 {
            return Err(Error::invalid("object header with empty name"));
        }
        let name = fields.string(name_len)?;
        let md_index = fields.u8()?;
        let meta_data = if md_index == INLINE_METADATA {
            let len = fields.u32()? as usize;
            MetaData::parse(&fields.string(len)?)
        } else {
            lookup_metadata(table, md_index)?
        };
        children.push(ObjectHeader::child_of(parent_path, name, meta_data));
    }

    Ok(ParsedObjectHeaders {
        children,
        properties_hash: Digest::from_slice(properties_hash).unwrap_or_default(),
        children_hash: Digest::from_slice(children_hash).unwrap_or_default(),
    })
}

/// One decoded property header entry.
#[derive(Clone, Debug)]
pub struct ParsedPropertyHeader {
    pub header: PropertyHeader,
    pub info: PropertyInfo,
    pub range: ChangeRange,
    /// The entry exactly as stored; structural hashes cover these bytes.
    pub entry: Vec<u8>,
}

impl ParsedPropertyHeader {
    pub fn is_constant(&self) -> bool {
        self.range.is_constant()
    }
}

/// Headers of a compound's children plus the rollup that closes the block.
#[derive(Clone, Debug)]
pub struct ParsedPropertyHeaders {
    pub properties: Vec<ParsedPropertyHeader>,
    pub rollup: Digest,
}

pub fn parse_property_headers(bytes: &[u8], table: &[MetaData]) -> Result<ParsedPropertyHeaders> {
    if bytes.is_empty() {
        return Ok(ParsedPropertyHeaders {
            properties: Vec::new(),
            rollup: Digest::ZERO,
        });
    }
    if bytes.len() < COMPOUND_TRAILER_SIZE {
        return Err(Error::invalid(format!("property headers block of {} bytes", bytes.len())));
    }
    let (entries, trailer) = bytes.split_at(bytes.len() - COMPOUND_TRAILER_SIZE);

    let mut fields = Fields::new(entries, "property header");
    let mut properties = Vec::new();
    while fields.remaining() > 0 {
        let start = fields.pos();
        let info = PropertyInfo::decode(fields.u32()?)?;
        let hint = info.size_hint;

        let (range, time_sampling_index) = if info.property_type == PropertyType::Compound {
            (ChangeRange::default(), 0)
        } else {
            let num_samples = fields.sized(hint)?;
            let range = if info.explicit_changed {
                let first_changed = fields.sized(hint)?;
                let last_changed = fields.sized(hint)?;
                let range = ChangeRange {
                    num_samples,
                    first_changed,
                    last_changed,
                };
                range.validate()?;
                range
            } else {
                ChangeRange::implied(num_samples, info.constant)
            };
            let ts = if info.has_time_sampling { fields.sized(hint)? } else { 0 };
            (range, ts)
        };

        let name_len = fields.sized(hint)? as usize;
        if name_len == 0 {
            return Err(Error::invalid("property header with empty name"));
        }
        let name = fields.string(name_len)?;
        let meta_data = if info.metadata_index == INLINE_METADATA {
            let len = fields.sized(hint)? as usize;
            MetaData::parse(&fields.string(len)?)
        } else {
            lookup_metadata(table, info.metadata_index)?
        };

        let header = PropertyHeader {
            name,
            property_type: info.property_type,
            data_type: info.data_type,
            time_sampling_index,
            meta_data,
        };
        properties.push(ParsedPropertyHeader {
            header,
            info,
            range,
            entry: entries[start..fields.pos()].to_vec(),
        });
    }

    Ok(ParsedPropertyHeaders {
        properties,
        rollup: Digest::from_slice(trailer).unwrap_or_default(),
    })
}

/// Shape stored next to an array sample: one little-endian `u64` per rank.
pub fn parse_dimensions(bytes: &[u8]) -> Result<Dimensions> {
    if bytes.len() % 8 != 0 {
        return Err(Error::invalid(format!("dimensions block of {} bytes", bytes.len())));
    }
    let mut cursor = Cursor::new(bytes);
    let mut sizes = Vec::with_capacity(bytes.len() / 8);
    for _ in 0..bytes.len() / 8 {
        let size = cursor.read_u64::<LittleEndian>()?;
        sizes.push(usize::try_from(size).map_err(|_| Error::invalid(format!("dimension {size}")))?);
    }
    Ok(Dimensions::from_slice(&sizes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogawa::writer::write_util;
    use crate::util::DataType;

    #[test]
    fn test_time_sampling_table() -> Result<()> {
        let mut buf = Vec::new();
        write_util::push_time_sampling(&mut buf, &TimeSampling::identity(), 0);
        write_util::push_time_sampling(&mut buf, &TimeSampling::acyclic(vec![0.0, 0.5, 2.0])?, 3);
        let (table, max) = parse_time_samplings(&buf)?;
        assert_eq!(table.len(), 2);
        assert!(table[0].is_identity());
        assert_eq!(table[1].stored_times(), &[0.0, 0.5, 2.0]);
        assert_eq!(max, vec![0, 3]);

        buf.truncate(buf.len() - 4);
        assert!(matches!(parse_time_samplings(&buf), Err(Error::InvalidStructure(_))));
        Ok(())
    }

    #[test]
    fn test_empty_tables() -> Result<()> {
        let (table, _) = parse_time_samplings(&[])?;
        assert_eq!(table.len(), 1);
        assert_eq!(parse_indexed_metadata(&[])?.len(), 1);
        let headers = parse_property_headers(&[], &[])?;
        assert!(headers.properties.is_empty());
        assert_eq!(headers.rollup, Digest::ZERO);
        Ok(())
    }

    #[test]
    fn test_indexed_metadata() -> Result<()> {
        let buf = [&[7u8][..], b"a=1;b=2", &[0u8]].concat();
        let table = parse_indexed_metadata(&buf)?;
        assert_eq!(table.len(), 3);
        assert_eq!(table[1].get("b"), Some("2"));
        assert!(table[2].is_empty());
        Ok(())
    }

    #[test]
    fn test_object_headers() -> Result<()> {
        let mut md = MetaData::new();
        md.set("schema", "AbcGeom_Xform_v3");
        let table = vec![MetaData::new(), md.clone()];

        let mut buf = Vec::new();
        write_util::push_object_entry(&mut buf, "xf", 1, "");
        write_util::push_object_entry(&mut buf, "inline", INLINE_METADATA, "k=v");
        buf.extend_from_slice(&[1; 16]);
        buf.extend_from_slice(&[2; 16]);

        let parsed = parse_object_headers(&buf, "/root", &table)?;
        assert_eq!(parsed.children.len(), 2);
        assert_eq!(parsed.children[0].full_name, "/root/xf");
        assert_eq!(parsed.children[0].meta_data, md);
        assert_eq!(parsed.children[1].meta_data.get("k"), Some("v"));
        assert_eq!(parsed.properties_hash, Digest([1; 16]));
        assert_eq!(parsed.children_hash, Digest([2; 16]));

        // index past the table
        let mut bad = Vec::new();
        write_util::push_object_entry(&mut bad, "x", 9, "");
        bad.extend_from_slice(&[0; 32]);
        assert!(parse_object_headers(&bad, "/", &table).is_err());
        Ok(())
    }

    #[test]
    fn test_property_entry_keeps_raw_bytes() -> Result<()> {
        let header = PropertyHeader::array("P", DataType::VEC3F).with_time_sampling(2);
        let range = ChangeRange {
            num_samples: 5,
            first_changed: 2,
            last_changed: 3,
        };
        let leaf = write_util::LeafState {
            range,
            homogenous: true,
            scalar_like: false,
        };
        let mut buf = Vec::new();
        let entry = write_util::property_entry(&header, Some(&leaf), 0, "");
        buf.extend_from_slice(&entry);
        buf.extend_from_slice(&[9; 16]);

        let parsed = parse_property_headers(&buf, &[MetaData::new()])?;
        let p = &parsed.properties[0];
        assert_eq!(p.header, header);
        assert_eq!(p.range, range);
        assert!(p.info.homogenous && !p.info.scalar_like);
        assert_eq!(p.entry, entry);
        assert_eq!(parsed.rollup, Digest([9; 16]));
        Ok(())
    }

    #[test]
    fn test_dimensions() -> Result<()> {
        let bytes = [2u64.to_le_bytes(), 3u64.to_le_bytes()].concat();
        assert_eq!(parse_dimensions(&bytes)?.sizes(), &[2, 3]);
        assert!(parse_dimensions(&bytes[..5]).is_err());
        assert_eq!(parse_i32(&10810i32.to_le_bytes(), "version")?, 10810);
        assert!(parse_i32(&[0; 3], "version").is_err());
        Ok(())
    }
}
