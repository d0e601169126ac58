//! Database metadata
//!
//! The metadata is a single map stored after the last occurrence of
//! [`METADATA_MARKER`], encoded with the same rules as the data section.
//! Pointers inside it are relative to the byte after the marker.

use crate::decoder::{DataSection, EntryData, Value};
use crate::error::{MmdbError, Result};
use crate::path::get_value;
use serde::Serialize;

/// Bytes that precede the metadata map
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// The marker is only searched for in this many trailing bytes
pub const METADATA_SEARCH_WINDOW: usize = 128 * 1024;

/// Find the offset just past the last metadata marker in `data`.
///
/// Only the final [`METADATA_SEARCH_WINDOW`] bytes are searched.
pub fn find_metadata_marker(data: &[u8]) -> Option<usize> {
    let window_start = data.len().saturating_sub(METADATA_SEARCH_WINDOW);
    memchr::memmem::find_iter(&data[window_start..], METADATA_MARKER)
        .last()
        .map(|pos| window_start + pos + METADATA_MARKER.len())
}

/// A localized description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    /// Language tag, e.g. `en`
    pub language: String,
    /// Description text
    pub description: String,
}

/// Parsed database metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Bits per record: 24, 28 or 32
    pub record_size: u16,
    /// 4 or 6
    pub ip_version: u16,
    /// Free-form database type, e.g. `GeoLite2-Country`
    pub database_type: String,
    /// Locales the records carry names for
    pub languages: Vec<String>,
    /// Major format version (only 2 is supported)
    pub binary_format_major_version: u16,
    /// Minor format version
    pub binary_format_minor_version: u16,
    /// Build time, seconds since the Unix epoch
    pub build_epoch: u64,
    /// Descriptions in file order
    pub description: Vec<Description>,
}

impl Metadata {
    /// Parse the metadata map that starts at offset 0 of `bytes`.
    ///
    /// # Errors
    ///
    /// [`MmdbError::InvalidMetadata`] when a required key is missing, has the
    /// wrong wire type, or is zero where zero is meaningless.
    /// [`MmdbError::UnknownFormat`] when `record_size` is not 24, 28 or 32.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let section = DataSection::new(bytes);

        let node_count = match required(&section, "node_count")?.value {
            Value::Uint32(v) => v,
            other => return Err(wrong_type("node_count", "uint32", other)),
        };
        if node_count == 0 {
            return Err(MmdbError::invalid_metadata("node_count is zero"));
        }

        let record_size = required_u16(&section, "record_size")?;
        if record_size == 0 {
            return Err(MmdbError::invalid_metadata("record_size is zero"));
        }
        if !matches!(record_size, 24 | 28 | 32) {
            return Err(MmdbError::UnknownFormat(format!(
                "unsupported record size {}",
                record_size
            )));
        }

        let ip_version = required_u16(&section, "ip_version")?;
        if ip_version != 4 && ip_version != 6 {
            return Err(MmdbError::invalid_metadata(format!(
                "ip_version must be 4 or 6, got {}",
                ip_version
            )));
        }

        let database_type = match required(&section, "database_type")?.value {
            Value::Utf8String(s) => s.to_owned(),
            other => return Err(wrong_type("database_type", "utf8_string", other)),
        };

        let languages = parse_languages(&section)?;

        let binary_format_major_version = required_u16(&section, "binary_format_major_version")?;
        if binary_format_major_version == 0 {
            return Err(MmdbError::invalid_metadata("binary_format_major_version is zero"));
        }
        let binary_format_minor_version = required_u16(&section, "binary_format_minor_version")?;

        let build_epoch = match required(&section, "build_epoch")?.value {
            Value::Uint64(v) => v,
            other => return Err(wrong_type("build_epoch", "uint64", other)),
        };
        if build_epoch == 0 {
            return Err(MmdbError::invalid_metadata("build_epoch is zero"));
        }

        let description = parse_description(&section)?;

        Ok(Metadata {
            node_count,
            record_size,
            ip_version,
            database_type,
            languages,
            binary_format_major_version,
            binary_format_minor_version,
            build_epoch,
            description,
        })
    }

    /// Description in the given language, if present
    pub fn description_for(&self, language: &str) -> Option<&str> {
        self.description
            .iter()
            .find(|d| d.language == language)
            .map(|d| d.description.as_str())
    }

    /// Size of the search tree in bytes
    pub fn search_tree_size(&self) -> u64 {
        u64::from(self.node_count) * u64::from(self.record_size) * 2 / 8
    }
}

fn required<'a>(section: &DataSection<'a>, key: &str) -> Result<EntryData<'a>> {
    get_value(section, 0, &[key]).map_err(|e| match e {
        MmdbError::PathMismatch(_) => {
            MmdbError::invalid_metadata(format!("required key '{}' is missing", key))
        }
        MmdbError::InvalidData(msg) => MmdbError::invalid_metadata(msg),
        other => other,
    })
}

fn required_u16(section: &DataSection<'_>, key: &str) -> Result<u16> {
    match required(section, key)?.value {
        Value::Uint16(v) => Ok(v),
        other => Err(wrong_type(key, "uint16", other)),
    }
}

fn parse_languages(section: &DataSection<'_>) -> Result<Vec<String>> {
    let array = required(section, "languages")?;
    let Value::Array(count) = array.value else {
        return Err(wrong_type("languages", "array", array.value));
    };

    let mut languages = Vec::with_capacity(count.min(64) as usize);
    let mut offset = array.offset_to_next;
    for _ in 0..count {
        let entry = section
            .decode_one_follow(offset)
            .map_err(|e| MmdbError::invalid_metadata(format!("languages: {}", e)))?;
        match entry.value {
            Value::Utf8String(s) => languages.push(s.to_owned()),
            other => return Err(wrong_type("languages element", "utf8_string", other)),
        }
        offset = entry.offset_to_next;
    }
    Ok(languages)
}

fn parse_description(section: &DataSection<'_>) -> Result<Vec<Description>> {
    let map = required(section, "description")?;
    let Value::Map(count) = map.value else {
        return Err(wrong_type("description", "map", map.value));
    };

    let mut description = Vec::with_capacity(count.min(64) as usize);
    let mut offset = map.offset_to_next;
    for _ in 0..count {
        let key = section
            .decode_one_follow(offset)
            .map_err(|e| MmdbError::invalid_metadata(format!("description: {}", e)))?;
        let value = section
            .decode_one_follow(key.offset_to_next)
            .map_err(|e| MmdbError::invalid_metadata(format!("description: {}", e)))?;
        match (key.value, value.value) {
            (Value::Utf8String(language), Value::Utf8String(text)) => description.push(Description {
                language: language.to_owned(),
                description: text.to_owned(),
            }),
            (Value::Utf8String(_), other) => {
                return Err(wrong_type("description value", "utf8_string", other))
            }
            (other, _) => return Err(wrong_type("description key", "utf8_string", other)),
        }
        offset = value.offset_to_next;
    }
    Ok(description)
}

fn wrong_type(key: &str, expected: &str, found: Value<'_>) -> MmdbError {
    MmdbError::invalid_metadata(format!(
        "'{}' must be {}, found {}",
        key,
        expected,
        found.data_type()
    ))
}
