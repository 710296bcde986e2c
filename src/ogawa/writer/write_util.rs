//! Encoding of header entries and archive tables.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::core::{PropertyHeader, TimeSampling};
use crate::ogawa::property_info::{size_hint_for, ChangeRange, PropertyInfo, INLINE_METADATA};
use crate::util::Dimensions;

/// Sample bookkeeping of a scalar or array property at finalization.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LeafState {
    pub range: ChangeRange,
    pub homogenous: bool,
    pub scalar_like: bool,
}

/// Write `value` in the width selected by `hint`.
pub(crate) fn write_with_hint(buf: &mut Vec<u8>, value: u32, hint: u8) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

/// One property header entry. `leaf` is `None` for compounds.
pub(crate) fn property_entry(
    header: &PropertyHeader,
    leaf: Option<&LeafState>,
    metadata_index: u8,
    inline_metadata: &str,
) -> Vec<u8> {
    let inline = metadata_index == INLINE_METADATA;
    let range = leaf.map(|l| l.range).unwrap_or_default();
    let explicit = leaf.is_some() && range.needs_explicit();
    let has_ts = leaf.is_some() && header.time_sampling_index != 0;

    let mut sized = vec![header.name.len() as u32];
    if inline {
        sized.push(inline_metadata.len() as u32);
    }
    if leaf.is_some() {
        sized.push(range.num_samples);
        if explicit {
            sized.extend([range.first_changed, range.last_changed]);
        }
        if has_ts {
            sized.push(header.time_sampling_index);
        }
    }
    let hint = size_hint_for(sized);

    let info = PropertyInfo {
        property_type: header.property_type,
        scalar_like: leaf.is_some_and(|l| l.scalar_like),
        size_hint: hint,
        data_type: header.data_type,
        has_time_sampling: has_ts,
        explicit_changed: explicit,
        homogenous: leaf.is_some_and(|l| l.homogenous),
        constant: leaf.is_some() && range.is_constant(),
        metadata_index,
    };

    let mut buf = Vec::with_capacity(16 + header.name.len() + inline_metadata.len());
    buf.extend_from_slice(&info.encode().to_le_bytes());
    if leaf.is_some() {
        write_with_hint(&mut buf, range.num_samples, hint);
        if explicit {
            write_with_hint(&mut buf, range.first_changed, hint);
            write_with_hint(&mut buf, range.last_changed, hint);
        }
        if has_ts {
            write_with_hint(&mut buf, header.time_sampling_index, hint);
        }
    }
    write_with_hint(&mut buf, header.name.len() as u32, hint);
    buf.extend_from_slice(header.name.as_bytes());
    if inline {
        write_with_hint(&mut buf, inline_metadata.len() as u32, hint);
        buf.extend_from_slice(inline_metadata.as_bytes());
    }
    buf
}

/// One child object header entry.
pub(crate) fn push_object_entry(buf: &mut Vec<u8>, name: &str, metadata_index: u8, inline_metadata: &str) {
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.push(metadata_index);
    if metadata_index == INLINE_METADATA {
        buf.extend_from_slice(&(inline_metadata.len() as u32).to_le_bytes());
        buf.extend_from_slice(inline_metadata.as_bytes());
    }
}

/// One time sampling table entry.
pub(crate) fn push_time_sampling(buf: &mut Vec<u8>, time_sampling: &TimeSampling, max_samples: u32) {
    let times = time_sampling.stored_times();
    buf.reserve(16 + 8 * times.len());
    // Vec<u8> writes cannot fail
    let _ = buf.write_u32::<LittleEndian>(max_samples);
    let _ = buf.write_f64::<LittleEndian>(time_sampling.stored_time_per_cycle());
    let _ = buf.write_u32::<LittleEndian>(times.len() as u32);
    for &t in times {
        let _ = buf.write_f64::<LittleEndian>(t);
    }
}

/// Stored form of an array sample's shape.
pub(crate) fn encode_dimensions(dims: &Dimensions) -> Vec<u8> {
    dims.sizes().iter().flat_map(|&d| (d as u64).to_le_bytes()).collect()
}

/// Human readable library version, recorded in archive metadata.
pub(crate) fn format_alembic_version(version: i32) -> String {
    let major = version / 10000;
    let minor = (version / 100) % 100;
    let patch = version % 100;
    let date = option_env!("ALEMBIC_BUILD_DATE").unwrap_or("unknown");
    let time = option_env!("ALEMBIC_BUILD_TIME").unwrap_or("unknown");
    format!("Alembic {major}.{minor}.{patch} (built {date} {time})")
}
