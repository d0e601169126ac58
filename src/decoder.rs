//! Data section decoding
//!
//! Every value in the data section starts with a control byte:
//!
//! ```text
//! bits 7-5: type (0 = extended, real type is 7 + next byte)
//! bits 4-0: size class
//!   0-28  the size itself
//!   29    size = 29 + next byte
//!   30    size = 285 + next two bytes (big-endian)
//!   31    size = 65821 + next three bytes (big-endian)
//! ```
//!
//! Pointers reuse the size bits differently: bits 4-3 select a 1-4 byte
//! operand and bits 2-0 are folded into the target for the shorter forms.
//!
//! Decoding never copies string or byte payloads. [`Value`] borrows them
//! straight out of the section, so they live exactly as long as the open
//! database.

use crate::checked::{fits, slice_at};
use crate::error::{MmdbError, Result};
use std::fmt;
use tracing::debug;

/// Nesting limit for recursive walks over maps and arrays
pub const MAXIMUM_DATA_STRUCTURE_DEPTH: usize = 512;

/// Wire type numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// Marker for the extended type byte (never a decoded type)
    Extended = 0,
    /// Offset into the data section
    Pointer = 1,
    /// UTF-8 text
    Utf8String = 2,
    /// 64-bit IEEE 754
    Double = 3,
    /// Opaque bytes
    Bytes = 4,
    /// Unsigned 16-bit
    Uint16 = 5,
    /// Unsigned 32-bit
    Uint32 = 6,
    /// Key/value pairs
    Map = 7,
    /// Signed 32-bit
    Int32 = 8,
    /// Unsigned 64-bit
    Uint64 = 9,
    /// Unsigned 128-bit
    Uint128 = 10,
    /// Ordered values
    Array = 11,
    /// Reserved
    Container = 12,
    /// Reserved
    EndMarker = 13,
    /// true/false
    Boolean = 14,
    /// 32-bit IEEE 754
    Float = 15,
}

impl DataType {
    /// Map a wire type number to a type, if it is one
    pub fn from_number(n: u16) -> Option<Self> {
        Some(match n {
            0 => DataType::Extended,
            1 => DataType::Pointer,
            2 => DataType::Utf8String,
            3 => DataType::Double,
            4 => DataType::Bytes,
            5 => DataType::Uint16,
            6 => DataType::Uint32,
            7 => DataType::Map,
            8 => DataType::Int32,
            9 => DataType::Uint64,
            10 => DataType::Uint128,
            11 => DataType::Array,
            12 => DataType::Container,
            13 => DataType::EndMarker,
            14 => DataType::Boolean,
            15 => DataType::Float,
            _ => return None,
        })
    }

    /// Name used by the dump format
    pub fn name(self) -> &'static str {
        match self {
            DataType::Extended => "extended",
            DataType::Pointer => "pointer",
            DataType::Utf8String => "utf8_string",
            DataType::Double => "double",
            DataType::Bytes => "bytes",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Map => "map",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Uint128 => "uint128",
            DataType::Array => "array",
            DataType::Container => "container",
            DataType::EndMarker => "end_marker",
            DataType::Boolean => "boolean",
            DataType::Float => "float",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded value
///
/// Maps and arrays only carry their element count; the elements follow in
/// the section starting at [`EntryData::offset_to_next`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Target offset within the data section
    Pointer(u32),
    /// UTF-8 text borrowed from the section
    Utf8String(&'a str),
    /// 64-bit float
    Double(f64),
    /// Raw bytes borrowed from the section
    Bytes(&'a [u8]),
    /// Unsigned 16-bit
    Uint16(u16),
    /// Unsigned 32-bit
    Uint32(u32),
    /// Map with this many key/value pairs
    Map(u32),
    /// Signed 32-bit
    Int32(i32),
    /// Unsigned 64-bit
    Uint64(u64),
    /// Unsigned 128-bit, big-endian
    Uint128([u8; 16]),
    /// Array with this many elements
    Array(u32),
    /// Boolean
    Boolean(bool),
    /// 32-bit float
    Float(f32),
}

impl<'a> Value<'a> {
    /// Wire type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Pointer(_) => DataType::Pointer,
            Value::Utf8String(_) => DataType::Utf8String,
            Value::Double(_) => DataType::Double,
            Value::Bytes(_) => DataType::Bytes,
            Value::Uint16(_) => DataType::Uint16,
            Value::Uint32(_) => DataType::Uint32,
            Value::Map(_) => DataType::Map,
            Value::Int32(_) => DataType::Int32,
            Value::Uint64(_) => DataType::Uint64,
            Value::Uint128(_) => DataType::Uint128,
            Value::Array(_) => DataType::Array,
            Value::Boolean(_) => DataType::Boolean,
            Value::Float(_) => DataType::Float,
        }
    }

    /// The string payload, if this is a string
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Value::Utf8String(s) => Some(s),
            _ => None,
        }
    }

    /// Any unsigned or non-negative integer widened to `u64`
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint16(v) => Some(v.into()),
            Value::Uint32(v) => Some(v.into()),
            Value::Uint64(v) => Some(v),
            Value::Int32(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Either float width as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            Value::Float(v) => Some(v.into()),
            _ => None,
        }
    }

    /// True for maps and arrays
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Array(_))
    }
}

/// One decoded entry and where it sits in the section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryData<'a> {
    /// The decoded value
    pub value: Value<'a>,
    /// Offset of the control byte
    pub offset: u32,
    /// Offset of whatever follows this entry. For maps and arrays this is
    /// the first child.
    pub offset_to_next: u32,
    /// Payload size: byte length for strings and bytes, element count for
    /// containers, operand width for pointers, 0 for booleans
    pub data_size: u32,
}

/// A bounds-checked view over a data section
#[derive(Clone, Copy)]
pub struct DataSection<'a> {
    bytes: &'a [u8],
}

impl<'a> DataSection<'a> {
    /// View `bytes` as a data section; offsets are relative to its start
    pub fn new(bytes: &'a [u8]) -> Self {
        DataSection { bytes }
    }

    /// Section size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the section holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the single entry at `offset` without following pointers.
    ///
    /// # Errors
    ///
    /// [`MmdbError::InvalidData`] if any byte the entry needs falls outside
    /// the section, the type is unknown or reserved, a fixed-width payload has
    /// the wrong size, or a string is not UTF-8.
    pub fn decode_one(&self, offset: u32) -> Result<EntryData<'a>> {
        let limit = self.bytes.len();
        let start = offset as usize;
        if !fits(start, 1, limit) {
            debug!(offset, section_size = limit, "control byte outside data section");
            return Err(MmdbError::invalid_data(format!(
                "offset {} is past the end of the data section ({} bytes)",
                offset, limit
            )));
        }

        let ctrl = self.bytes[start];
        let mut pos = start + 1;

        let mut type_num = u16::from(ctrl >> 5);
        if type_num == 0 {
            let ext = self.byte_at(pos, "extended type byte")?;
            type_num = 7 + u16::from(ext);
            pos += 1;
        }

        let data_type = match DataType::from_number(type_num) {
            Some(DataType::Extended | DataType::Container | DataType::EndMarker) | None => {
                debug!(offset, type_num, "unknown data type");
                return Err(MmdbError::invalid_data(format!(
                    "unknown data type {} at offset {}",
                    type_num, offset
                )));
            }
            Some(t) => t,
        };

        if data_type == DataType::Pointer {
            let psize = usize::from((ctrl >> 3) & 0x3) + 1;
            let operand = self.read_bytes(pos, psize, "pointer")?;
            let target = pointer_target(ctrl, operand);
            return Ok(EntryData {
                value: Value::Pointer(target),
                offset,
                offset_to_next: to_offset(pos + psize)?,
                data_size: psize as u32,
            });
        }

        let (size, pos) = self.read_size(ctrl, pos)?;

        match data_type {
            DataType::Map | DataType::Array => {
                let value = if data_type == DataType::Map {
                    Value::Map(size)
                } else {
                    Value::Array(size)
                };
                return Ok(EntryData {
                    value,
                    offset,
                    offset_to_next: to_offset(pos)?,
                    data_size: size,
                });
            }
            DataType::Boolean => {
                return Ok(EntryData {
                    value: Value::Boolean(size != 0),
                    offset,
                    offset_to_next: to_offset(pos)?,
                    data_size: 0,
                });
            }
            _ => {}
        }

        let len = size as usize;
        let payload = self.read_bytes(pos, len, data_type.name())?;

        let value = match data_type {
            DataType::Utf8String => {
                let s = std::str::from_utf8(payload).map_err(|e| {
                    debug!(offset, "string is not valid UTF-8");
                    MmdbError::invalid_data(format!(
                        "string at offset {} is not valid UTF-8: {}",
                        offset, e
                    ))
                })?;
                Value::Utf8String(s)
            }
            DataType::Bytes => Value::Bytes(payload),
            DataType::Double => {
                let raw: [u8; 8] = payload.try_into().map_err(|_| {
                    bad_width(offset, data_type, len, "exactly 8")
                })?;
                Value::Double(f64::from_be_bytes(raw))
            }
            DataType::Float => {
                let raw: [u8; 4] = payload.try_into().map_err(|_| {
                    bad_width(offset, data_type, len, "exactly 4")
                })?;
                Value::Float(f32::from_be_bytes(raw))
            }
            DataType::Uint16 => {
                if len > 2 {
                    return Err(bad_width(offset, data_type, len, "at most 2"));
                }
                Value::Uint16(uint_be(payload) as u16)
            }
            DataType::Uint32 => {
                if len > 4 {
                    return Err(bad_width(offset, data_type, len, "at most 4"));
                }
                Value::Uint32(uint_be(payload) as u32)
            }
            DataType::Int32 => {
                if len > 4 {
                    return Err(bad_width(offset, data_type, len, "at most 4"));
                }
                Value::Int32(uint_be(payload) as u32 as i32)
            }
            DataType::Uint64 => {
                if len > 8 {
                    return Err(bad_width(offset, data_type, len, "at most 8"));
                }
                Value::Uint64(uint_be(payload))
            }
            DataType::Uint128 => {
                if len > 16 {
                    return Err(bad_width(offset, data_type, len, "at most 16"));
                }
                let mut raw = [0u8; 16];
                raw[16 - len..].copy_from_slice(payload);
                Value::Uint128(raw)
            }
            // Handled above
            DataType::Extended
            | DataType::Pointer
            | DataType::Map
            | DataType::Array
            | DataType::Boolean
            | DataType::Container
            | DataType::EndMarker => {
                return Err(MmdbError::invalid_data(format!(
                    "{} at offset {} has no payload",
                    data_type, offset
                )))
            }
        };

        Ok(EntryData {
            value,
            offset,
            offset_to_next: to_offset(pos + len)?,
            data_size: size,
        })
    }

    /// Decode the entry at `offset`, resolving one level of pointer.
    ///
    /// When the pointee is a scalar, `offset_to_next` of the result is the
    /// byte after the pointer, so sequential walks continue past it. When the
    /// pointee is a map or array, `offset_to_next` stays at its first child.
    ///
    /// # Errors
    ///
    /// Anything [`decode_one`](Self::decode_one) reports, plus
    /// [`MmdbError::InvalidData`] for a pointer to a pointer.
    pub fn decode_one_follow(&self, offset: u32) -> Result<EntryData<'a>> {
        let entry = self.decode_one(offset)?;
        let Value::Pointer(target) = entry.value else {
            return Ok(entry);
        };

        let after_pointer = entry.offset_to_next;
        let mut resolved = self.decode_one(target)?;
        if let Value::Pointer(_) = resolved.value {
            debug!(offset, target, "pointer points at another pointer");
            return Err(MmdbError::invalid_data(format!(
                "pointer at offset {} points to another pointer at {}",
                offset, target
            )));
        }
        if !resolved.value.is_container() {
            resolved.offset_to_next = after_pointer;
        }
        Ok(resolved)
    }

    /// Offset just past `entry` and, for maps and arrays, everything nested
    /// inside it. Pointers inside are not followed.
    pub fn skip(&self, entry: &EntryData<'a>) -> Result<u32> {
        self.skip_at_depth(entry, 0)
    }

    fn skip_at_depth(&self, entry: &EntryData<'a>, depth: usize) -> Result<u32> {
        let children = match entry.value {
            Value::Map(n) => u64::from(n) * 2,
            Value::Array(n) => u64::from(n),
            _ => return Ok(entry.offset_to_next),
        };
        if depth >= MAXIMUM_DATA_STRUCTURE_DEPTH {
            return Err(MmdbError::invalid_data(format!(
                "data nested deeper than {} levels",
                MAXIMUM_DATA_STRUCTURE_DEPTH
            )));
        }

        let mut next = entry.offset_to_next;
        for _ in 0..children {
            let child = self.decode_one(next)?;
            next = self.skip_at_depth(&child, depth + 1)?;
        }
        Ok(next)
    }

    fn byte_at(&self, pos: usize, what: &str) -> Result<u8> {
        Ok(self.read_bytes(pos, 1, what)?[0])
    }

    fn read_bytes(&self, pos: usize, len: usize, what: &str) -> Result<&'a [u8]> {
        slice_at(self.bytes, pos, len).ok_or_else(|| {
            debug!(pos, len, section_size = self.bytes.len(), what, "read past data section");
            MmdbError::invalid_data(format!(
                "{} of {} bytes at offset {} is past the end of the data section",
                what, len, pos
            ))
        })
    }

    /// Apply the size-class rule; returns the size and the payload start.
    fn read_size(&self, ctrl: u8, pos: usize) -> Result<(u32, usize)> {
        let class = u32::from(ctrl & 0x1f);
        Ok(match class {
            0..=28 => (class, pos),
            29 => {
                let b = self.read_bytes(pos, 1, "size")?;
                (29 + u32::from(b[0]), pos + 1)
            }
            30 => {
                let b = self.read_bytes(pos, 2, "size")?;
                (285 + uint_be(b) as u32, pos + 2)
            }
            _ => {
                let b = self.read_bytes(pos, 3, "size")?;
                (65_821 + uint_be(b) as u32, pos + 3)
            }
        })
    }
}

impl fmt::Debug for DataSection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSection")
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Resolve a pointer operand to its target offset.
fn pointer_target(ctrl: u8, operand: &[u8]) -> u32 {
    let low = u32::from(ctrl & 0x7);
    let raw = uint_be(operand) as u32;
    match operand.len() {
        1 => (low << 8) + raw,
        2 => 2048 + (low << 16) + raw,
        3 => 526_336 + (low << 24) + raw,
        _ => raw,
    }
}

/// Big-endian unsigned integer from up to 8 bytes
fn uint_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

fn to_offset(pos: usize) -> Result<u32> {
    u32::try_from(pos)
        .map_err(|_| MmdbError::invalid_data(format!("offset {} does not fit in 32 bits", pos)))
}

fn bad_width(offset: u32, data_type: DataType, len: usize, expected: &str) -> MmdbError {
    debug!(offset, %data_type, len, "bad payload width");
    MmdbError::invalid_data(format!(
        "{} at offset {} has size {} (expected {})",
        data_type, offset, len, expected
    ))
}
