//! Lookup path navigation
//!
//! A path is a sequence of map keys and array indices, e.g.
//! `["country", "names", "en"]` or `["subdivisions", "0", "iso_code"]`.
//! Navigation decodes only the entries it must pass over; nothing is
//! materialized.
//!
//! Array indices are decimal and may be negative, counting back from the end
//! (`"-1"` is the last element).

use crate::decoder::{DataSection, EntryData, Value};
use crate::error::{MmdbError, Result};
use std::num::IntErrorKind;
use tracing::trace;

/// Follow `path` from the entry at `offset`.
///
/// An empty path yields the entry itself (with one pointer level resolved).
///
/// # Errors
///
/// - [`MmdbError::PathMismatch`] when a key is absent, an index is out of
///   range or not a number, or a scalar is reached with segments left.
/// - [`MmdbError::InvalidLookupPath`] when an index does not fit in 64 bits.
/// - [`MmdbError::InvalidData`] for malformed data, including non-string map
///   keys.
pub fn get_value<'a, S: AsRef<str>>(
    section: &DataSection<'a>,
    offset: u32,
    path: &[S],
) -> Result<EntryData<'a>> {
    let mut current = section.decode_one_follow(offset)?;

    for segment in path {
        let segment = segment.as_ref();
        trace!(segment, offset = current.offset, "following lookup path");
        current = match current.value {
            Value::Map(size) => lookup_in_map(section, &current, size, segment)?,
            Value::Array(size) => lookup_in_array(section, &current, size, segment)?,
            other => {
                return Err(MmdbError::PathMismatch(format!(
                    "cannot look up '{}' in a {} value",
                    segment,
                    other.data_type()
                )))
            }
        };
    }

    Ok(current)
}

fn lookup_in_map<'a>(
    section: &DataSection<'a>,
    map: &EntryData<'a>,
    size: u32,
    key: &str,
) -> Result<EntryData<'a>> {
    let mut offset = map.offset_to_next;
    for _ in 0..size {
        let key_entry = section.decode_one_follow(offset)?;
        let Value::Utf8String(candidate) = key_entry.value else {
            return Err(MmdbError::invalid_data(format!(
                "map key at offset {} is a {}, not a string",
                key_entry.offset,
                key_entry.value.data_type()
            )));
        };

        if candidate.as_bytes() == key.as_bytes() {
            return section.decode_one_follow(key_entry.offset_to_next);
        }

        let value = section.decode_one(key_entry.offset_to_next)?;
        offset = section.skip(&value)?;
    }

    Err(MmdbError::PathMismatch(format!("key '{}' not found", key)))
}

fn lookup_in_array<'a>(
    section: &DataSection<'a>,
    array: &EntryData<'a>,
    size: u32,
    segment: &str,
) -> Result<EntryData<'a>> {
    let index = parse_index(segment)?;
    let len = i64::from(size);

    let index = if index < 0 { index + len } else { index };
    if index < 0 || index >= len {
        return Err(MmdbError::PathMismatch(format!(
            "index {} is out of range for an array of {} elements",
            segment, size
        )));
    }

    let mut offset = array.offset_to_next;
    for _ in 0..index {
        let element = section.decode_one(offset)?;
        offset = section.skip(&element)?;
    }
    section.decode_one_follow(offset)
}

fn parse_index(segment: &str) -> Result<i64> {
    segment.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            MmdbError::InvalidLookupPath(format!("array index '{}' is out of range", segment))
        }
        _ => MmdbError::PathMismatch(format!("'{}' is not an array index", segment)),
    })
}
