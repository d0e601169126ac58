//! Test fixture writer
//!
//! Builds small but well-formed MMDB files in memory: a binary search tree
//! with 24, 28 or 32-bit records, a data section, and a metadata map.

#![allow(dead_code)]

use mmdb_reader::metadata::METADATA_MARKER;
use std::io::Write;
use std::net::IpAddr;
use tempfile::NamedTempFile;

/// A value to encode into the data section
#[derive(Debug, Clone)]
pub enum V {
    Str(String),
    Bytes(Vec<u8>),
    U16(u16),
    U32(u32),
    I32(i32),
    U64(u64),
    U128(u128),
    Bool(bool),
    F32(f32),
    F64(f64),
    Map(Vec<(String, V)>),
    Array(Vec<V>),
    /// Raw pointer to a data section offset
    Ptr(u32),
}

pub fn s(text: &str) -> V {
    V::Str(text.to_string())
}

pub fn map(pairs: Vec<(&str, V)>) -> V {
    V::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn ctrl(out: &mut Vec<u8>, type_num: u8, size: usize) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 285 + 65536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_num <= 7 {
        out.push((type_num << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_num - 7);
    }
    out.extend_from_slice(&extra);
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    &bytes[skip..]
}

/// Encode a pointer with the smallest operand that holds `target`
pub fn encode_pointer(out: &mut Vec<u8>, target: u32) {
    if target < 2048 {
        out.push(0x20 | (target >> 8) as u8);
        out.push(target as u8);
    } else if target < 2048 + (1 << 19) {
        let v = target - 2048;
        out.push(0x20 | (1 << 3) | (v >> 16) as u8);
        out.extend_from_slice(&(v as u16).to_be_bytes());
    } else if target < 526_336 + (1 << 27) {
        let v = target - 526_336;
        out.push(0x20 | (2 << 3) | (v >> 24) as u8);
        out.extend_from_slice(&v.to_be_bytes()[1..]);
    } else {
        out.push(0x20 | (3 << 3));
        out.extend_from_slice(&target.to_be_bytes());
    }
}

pub fn encode(value: &V, out: &mut Vec<u8>) {
    match value {
        V::Str(text) => {
            ctrl(out, 2, text.len());
            out.extend_from_slice(text.as_bytes());
        }
        V::Bytes(b) => {
            ctrl(out, 4, b.len());
            out.extend_from_slice(b);
        }
        V::F64(d) => {
            ctrl(out, 3, 8);
            out.extend_from_slice(&d.to_be_bytes());
        }
        V::F32(f) => {
            ctrl(out, 15, 4);
            out.extend_from_slice(&f.to_be_bytes());
        }
        V::U16(v) => {
            let b = v.to_be_bytes();
            let b = minimal_be(&b);
            ctrl(out, 5, b.len());
            out.extend_from_slice(b);
        }
        V::U32(v) => {
            let b = v.to_be_bytes();
            let b = minimal_be(&b);
            ctrl(out, 6, b.len());
            out.extend_from_slice(b);
        }
        V::I32(v) => {
            let b = v.to_be_bytes();
            let b = if *v < 0 { &b[..] } else { minimal_be(&b) };
            ctrl(out, 8, b.len());
            out.extend_from_slice(b);
        }
        V::U64(v) => {
            let b = v.to_be_bytes();
            let b = minimal_be(&b);
            ctrl(out, 9, b.len());
            out.extend_from_slice(b);
        }
        V::U128(v) => {
            let b = v.to_be_bytes();
            let b = minimal_be(&b);
            ctrl(out, 10, b.len());
            out.extend_from_slice(b);
        }
        V::Bool(b) => ctrl(out, 14, usize::from(*b)),
        V::Map(pairs) => {
            ctrl(out, 7, pairs.len());
            for (k, v) in pairs {
                encode(&V::Str(k.clone()), out);
                encode(v, out);
            }
        }
        V::Array(items) => {
            ctrl(out, 11, items.len());
            for item in items {
                encode(item, out);
            }
        }
        V::Ptr(target) => encode_pointer(out, *target),
    }
}

#[derive(Debug, Clone, Copy)]
enum Rec {
    Node(u32),
    Empty,
    Data(u32),
}

/// Builder for a complete database file
pub struct MmdbWriter {
    ip_version: u16,
    record_size: u16,
    major_version: u16,
    database_type: String,
    data: Vec<u8>,
    nodes: Vec<[Rec; 2]>,
}

impl MmdbWriter {
    pub fn new(ip_version: u16, record_size: u16) -> Self {
        MmdbWriter {
            ip_version,
            record_size,
            major_version: 2,
            database_type: "Test-City".to_string(),
            data: Vec::new(),
            nodes: vec![[Rec::Empty, Rec::Empty]],
        }
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn database_type(mut self, name: &str) -> Self {
        self.database_type = name.to_string();
        self
    }

    /// Append a value to the data section, returning its offset
    pub fn append(&mut self, value: &V) -> u32 {
        let offset = self.data.len() as u32;
        encode(value, &mut self.data);
        offset
    }

    /// Append raw bytes to the data section, returning their offset
    pub fn append_raw(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Store `value` and point `cidr` at it
    pub fn insert(&mut self, cidr: &str, value: &V) -> u32 {
        let offset = self.append(value);
        self.insert_offset(cidr, offset);
        offset
    }

    /// Point `cidr` at an existing data offset.
    ///
    /// IPv4 networks in an IPv6 tree go under `::/96`.
    pub fn insert_offset(&mut self, cidr: &str, offset: u32) {
        let (addr, prefix) = cidr.split_once('/').expect("cidr needs a prefix");
        let addr: IpAddr = addr.parse().expect("valid network address");
        let prefix: usize = prefix.parse().expect("numeric prefix");

        let (bytes, prefix) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), 4) => (v4.octets().to_vec(), prefix),
            (IpAddr::V4(v4), _) => {
                let mut b = vec![0u8; 12];
                b.extend_from_slice(&v4.octets());
                (b, prefix + 96)
            }
            (IpAddr::V6(v6), 6) => (v6.octets().to_vec(), prefix),
            (IpAddr::V6(_), _) => panic!("IPv6 network in an IPv4 tree"),
        };
        assert!(prefix > 0, "the root cannot hold data");

        let mut node = 0usize;
        for i in 0..prefix {
            let bit = usize::from((bytes[i / 8] >> (7 - (i % 8))) & 1);
            if i == prefix - 1 {
                self.nodes[node][bit] = Rec::Data(offset);
                break;
            }
            node = match self.nodes[node][bit] {
                Rec::Node(n) => n as usize,
                _ => {
                    self.nodes.push([Rec::Empty, Rec::Empty]);
                    let n = self.nodes.len() - 1;
                    self.nodes[node][bit] = Rec::Node(n as u32);
                    n
                }
            };
        }
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    fn record_value(&self, rec: Rec) -> u32 {
        let node_count = self.node_count();
        match rec {
            Rec::Node(n) => n,
            Rec::Empty => node_count,
            Rec::Data(offset) => node_count + 16 + offset,
        }
    }

    pub fn tree_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for pair in &self.nodes {
            let left = self.record_value(pair[0]);
            let right = self.record_value(pair[1]);
            match self.record_size {
                24 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                28 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.push((((left >> 24) & 0x0f) << 4) as u8 | ((right >> 24) & 0x0f) as u8);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                32 => {
                    out.extend_from_slice(&left.to_be_bytes());
                    out.extend_from_slice(&right.to_be_bytes());
                }
                other => panic!("unsupported record size {}", other),
            }
        }
        out
    }

    pub fn metadata_value(&self) -> V {
        map(vec![
            ("node_count", V::U32(self.node_count())),
            ("record_size", V::U16(self.record_size)),
            ("ip_version", V::U16(self.ip_version)),
            ("database_type", s(&self.database_type)),
            ("languages", V::Array(vec![s("en"), s("de")])),
            ("binary_format_major_version", V::U16(self.major_version)),
            ("binary_format_minor_version", V::U16(0)),
            ("build_epoch", V::U64(1_700_000_000)),
            (
                "description",
                map(vec![("en", s("Test database")), ("de", s("Testdatenbank"))]),
            ),
        ])
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.tree_bytes();
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(METADATA_MARKER);
        encode(&self.metadata_value(), &mut out);
        out
    }

    pub fn write_temp(&self) -> NamedTempFile {
        write_temp(&self.build())
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}

pub fn country(iso: &str, name: &str) -> V {
    map(vec![
        ("iso_code", s(iso)),
        ("names", map(vec![("en", s(name))])),
    ])
}

pub fn city_record(iso: &str, name: &str, continent: (&str, &str), lat: f64, lon: f64) -> V {
    map(vec![
        ("country", country(iso, name)),
        (
            "continent",
            map(vec![
                ("code", s(continent.0)),
                ("names", map(vec![("en", s(continent.1))])),
            ]),
        ),
        (
            "location",
            map(vec![("latitude", V::F64(lat)), ("longitude", V::F64(lon))]),
        ),
    ])
}

/// A database with a few representative networks:
///
/// - `1.2.3.0/24`: US record with a two-element `subdivisions` array
/// - `89.160.20.0/24`: SE record whose `country` is a pointer to a shared map
/// - `2001:db8::/32` (IPv6 trees only): DE record
pub fn sample_writer(ip_version: u16, record_size: u16) -> MmdbWriter {
    let mut w = MmdbWriter::new(ip_version, record_size);

    let us = map(vec![
        ("country", country("US", "United States")),
        (
            "continent",
            map(vec![
                ("code", s("NA")),
                ("names", map(vec![("en", s("North America"))])),
            ]),
        ),
        (
            "location",
            map(vec![
                ("latitude", V::F64(37.751)),
                ("longitude", V::F64(-97.822)),
            ]),
        ),
        (
            "subdivisions",
            V::Array(vec![
                map(vec![("iso_code", s("CA"))]),
                map(vec![("iso_code", s("SF"))]),
            ]),
        ),
        ("population", V::U32(39_000_000)),
        ("is_anycast", V::Bool(false)),
    ]);
    w.insert("1.2.3.0/24", &us);

    let sweden = w.append(&country("SE", "Sweden"));
    let se = map(vec![
        ("country", V::Ptr(sweden)),
        ("city", map(vec![("names", map(vec![("en", s("Linköping"))]))])),
    ]);
    w.insert("89.160.20.0/24", &se);

    if ip_version == 6 {
        w.insert(
            "2001:db8::/32",
            &city_record("DE", "Germany", ("EU", "Europe"), 51.2993, 9.491),
        );
    }
    w
}

pub fn sample_db(ip_version: u16, record_size: u16) -> Vec<u8> {
    sample_writer(ip_version, record_size).build()
}
