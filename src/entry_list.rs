//! Materialized values
//!
//! [`get_entry_data_list`] decodes a whole value tree into a flat,
//! pre-order list: a map is followed by its key and value entries in turn,
//! an array by its elements. Pointers are resolved, so the list never
//! contains one. All nodes live in a single [`DataPool`] and are freed
//! together when the list is dropped.

use crate::decoder::{DataSection, EntryData, Value, MAXIMUM_DATA_STRUCTURE_DEPTH};
use crate::error::{MmdbError, Result};
use crate::pool::{DataPool, NodeId, PoolList};
use serde_json::json;
use std::fmt::Write as _;
use std::io::Write;

/// First block size of the arena behind each list
pub const POOL_INIT_SIZE: usize = 64;

/// Indentation is capped at this many spaces
const MAX_INDENT: usize = 1023;

/// A value tree flattened in pre-order
#[derive(Debug)]
pub struct EntryDataList<'a> {
    nodes: PoolList<EntryData<'a>>,
}

/// Materialize the value at `offset` and everything it contains.
///
/// # Errors
///
/// [`MmdbError::InvalidData`] for malformed data or nesting deeper than
/// [`MAXIMUM_DATA_STRUCTURE_DEPTH`], [`MmdbError::OutOfMemory`] if the arena
/// cannot grow.
pub fn get_entry_data_list<'a>(section: &DataSection<'a>, offset: u32) -> Result<EntryDataList<'a>> {
    let mut pool = DataPool::new(POOL_INIT_SIZE)?;
    materialize(section, offset, &mut pool, 0)?;
    Ok(EntryDataList {
        nodes: pool.into_list(),
    })
}

fn materialize<'a>(
    section: &DataSection<'a>,
    offset: u32,
    pool: &mut DataPool<EntryData<'a>>,
    depth: usize,
) -> Result<NodeId> {
    if depth >= MAXIMUM_DATA_STRUCTURE_DEPTH {
        return Err(MmdbError::invalid_data(format!(
            "data nested deeper than {} levels at offset {}",
            MAXIMUM_DATA_STRUCTURE_DEPTH, offset
        )));
    }
    let depth = depth + 1;

    let entry = section.decode_one(offset)?;
    let (children, is_map) = match entry.value {
        Value::Pointer(target) => {
            let after_pointer = entry.offset_to_next;
            let mut pointee = section.decode_one(target)?;
            if let Value::Pointer(_) = pointee.value {
                return Err(MmdbError::invalid_data(format!(
                    "pointer at offset {} points to another pointer at {}",
                    offset, target
                )));
            }
            if pointee.value.is_container() {
                let id = materialize(section, target, pool, depth)?;
                pool.get_mut(id).offset_to_next = after_pointer;
                return Ok(id);
            }
            pointee.offset_to_next = after_pointer;
            return pool.alloc(pointee);
        }
        Value::Map(size) => (size, true),
        Value::Array(size) => (size, false),
        _ => return pool.alloc(entry),
    };

    let id = pool.alloc(entry)?;
    let mut next = entry.offset_to_next;
    for _ in 0..children {
        if is_map {
            let key = materialize(section, next, pool, depth)?;
            next = pool.get(key).offset_to_next;
        }
        let value = materialize(section, next, pool, depth)?;
        next = pool.get(value).offset_to_next;
    }
    pool.get_mut(id).offset_to_next = next;
    Ok(id)
}

impl<'a> EntryDataList<'a> {
    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true for a list built by [`get_entry_data_list`]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root value
    pub fn first(&self) -> Option<&EntryData<'a>> {
        self.nodes.first()
    }

    /// Node at pre-order position `index`
    pub fn get(&self, index: usize) -> Option<&EntryData<'a>> {
        self.nodes.get(index)
    }

    /// Iterate nodes in pre-order
    pub fn iter(&self) -> impl Iterator<Item = &EntryData<'a>> + '_ {
        self.nodes.iter()
    }

    /// Arena blocks backing the list
    pub fn block_count(&self) -> usize {
        self.nodes.block_count()
    }

    /// Write a human-readable rendering of the tree.
    ///
    /// Each scalar is printed with its type, e.g. `"Berlin" <utf8_string>` or
    /// `42 <uint32>`; maps and arrays open and close on their own lines and
    /// indent their contents by two spaces.
    ///
    /// # Errors
    ///
    /// [`MmdbError::InvalidData`] for a non-string map key or truncated list,
    /// [`MmdbError::Io`] if writing fails.
    pub fn dump<W: Write>(&self, out: &mut W, indent: usize) -> Result<()> {
        let mut nodes = self.nodes.iter();
        dump_value(&mut nodes, out, indent)
    }

    /// Render the dump into a string
    pub fn dump_to_string(&self, indent: usize) -> Result<String> {
        let mut buf = Vec::new();
        self.dump(&mut buf, indent)?;
        String::from_utf8(buf).map_err(|e| MmdbError::invalid_data(e.to_string()))
    }

    /// Convert the tree into JSON.
    ///
    /// `uint128` values and byte strings become hex strings; `uint64` stays a
    /// number.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut nodes = self.nodes.iter();
        to_json_value(&mut nodes)
    }
}

impl<'l, 'a> IntoIterator for &'l EntryDataList<'a> {
    type Item = &'l EntryData<'a>;
    type IntoIter = std::iter::Flatten<std::slice::Iter<'l, Vec<EntryData<'a>>>>;

    fn into_iter(self) -> Self::IntoIter {
        (&self.nodes).into_iter()
    }
}

fn next_node<'l, 'a, I>(nodes: &mut I) -> Result<&'l EntryData<'a>>
where
    I: Iterator<Item = &'l EntryData<'a>>,
    'a: 'l,
{
    nodes
        .next()
        .ok_or_else(|| MmdbError::invalid_data("entry list ended inside a map or array"))
}

fn dump_value<'l, 'a: 'l, I, W>(nodes: &mut I, out: &mut W, indent: usize) -> Result<()>
where
    I: Iterator<Item = &'l EntryData<'a>>,
    W: Write,
{
    let node = next_node(nodes)?;
    let pad = " ".repeat(indent.min(MAX_INDENT));

    match node.value {
        Value::Map(size) => {
            writeln!(out, "{}{{", pad)?;
            let inner = " ".repeat((indent + 2).min(MAX_INDENT));
            for _ in 0..size {
                let key = next_node(nodes)?;
                let Value::Utf8String(key) = key.value else {
                    return Err(MmdbError::invalid_data(format!(
                        "map key at offset {} is not a string",
                        key.offset
                    )));
                };
                writeln!(out, "{}\"{}\": ", inner, key)?;
                dump_value(nodes, out, indent + 4)?;
            }
            writeln!(out, "{}}}", pad)?;
        }
        Value::Array(size) => {
            writeln!(out, "{}[", pad)?;
            for _ in 0..size {
                dump_value(nodes, out, indent + 2)?;
            }
            writeln!(out, "{}]", pad)?;
        }
        Value::Utf8String(s) => writeln!(out, "{}\"{}\" <utf8_string>", pad, s)?,
        Value::Bytes(b) => writeln!(out, "{}{} <bytes>", pad, hex_upper(b))?,
        Value::Double(d) => writeln!(out, "{}{:.6} <double>", pad, d)?,
        Value::Float(f) => writeln!(out, "{}{:.6} <float>", pad, f)?,
        Value::Uint16(v) => writeln!(out, "{}{} <uint16>", pad, v)?,
        Value::Uint32(v) => writeln!(out, "{}{} <uint32>", pad, v)?,
        Value::Boolean(b) => writeln!(out, "{}{} <boolean>", pad, b)?,
        Value::Uint64(v) => writeln!(out, "{}{} <uint64>", pad, v)?,
        Value::Uint128(raw) => writeln!(out, "{}0x{} <uint128>", pad, hex_upper(&raw))?,
        Value::Int32(v) => writeln!(out, "{}{} <int32>", pad, v)?,
        Value::Pointer(p) => {
            return Err(MmdbError::invalid_data(format!(
                "unresolved pointer to {} in entry list",
                p
            )))
        }
    }
    Ok(())
}

fn to_json_value<'l, 'a: 'l, I>(nodes: &mut I) -> Result<serde_json::Value>
where
    I: Iterator<Item = &'l EntryData<'a>>,
{
    let node = next_node(nodes)?;
    Ok(match node.value {
        Value::Map(size) => {
            let mut map = serde_json::Map::new();
            for _ in 0..size {
                let key = next_node(nodes)?;
                let Value::Utf8String(key) = key.value else {
                    return Err(MmdbError::invalid_data(format!(
                        "map key at offset {} is not a string",
                        key.offset
                    )));
                };
                let value = to_json_value(nodes)?;
                map.insert(key.to_owned(), value);
            }
            serde_json::Value::Object(map)
        }
        Value::Array(size) => {
            let mut items = Vec::with_capacity(size.min(1024) as usize);
            for _ in 0..size {
                items.push(to_json_value(nodes)?);
            }
            serde_json::Value::Array(items)
        }
        Value::Utf8String(s) => json!(s),
        Value::Bytes(b) => json!(hex_upper(b)),
        Value::Double(d) => float_json(d),
        Value::Float(f) => float_json(f64::from(f)),
        Value::Uint16(v) => json!(v),
        Value::Uint32(v) => json!(v),
        Value::Boolean(b) => json!(b),
        Value::Uint64(v) => json!(v),
        Value::Uint128(raw) => json!(format!("0x{}", hex_upper(&raw))),
        Value::Int32(v) => json!(v),
        Value::Pointer(p) => {
            return Err(MmdbError::invalid_data(format!(
                "unresolved pointer to {} in entry list",
                p
            )))
        }
    })
}

fn float_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02X}", b);
    }
    s
}
