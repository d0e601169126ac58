//! Search tree traversal
//!
//! The tree is a flat array of `node_count` nodes. Each node holds two
//! records, left (bit 0) and right (bit 1). A record value is:
//!
//! - `< node_count`: the next node to visit
//! - `== node_count`: no data for this network
//! - `> node_count`: data section offset `value - node_count - 16`
//!
//! IPv4 addresses in an IPv6 tree live under `::/96`, so their walk starts
//! at the node reached after 96 zero bits. That node is found once per open
//! database.

use crate::checked::fits;
use crate::error::{MmdbError, Result};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Bytes between the end of the tree and the start of the data section
pub const DATA_SECTION_SEPARATOR_SIZE: u32 = 16;

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32,
}

impl RecordSize {
    /// Bytes per node (two records)
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Offset of the right record within a node
    pub fn right_record_offset(self) -> usize {
        match self {
            RecordSize::Bits24 | RecordSize::Bits28 => 3,
            RecordSize::Bits32 => 4,
        }
    }

    /// Map a metadata `record_size` to a record layout
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            24 => Some(RecordSize::Bits24),
            28 => Some(RecordSize::Bits28),
            32 => Some(RecordSize::Bits32),
            _ => None,
        }
    }

    /// Size in bits
    pub fn bits(self) -> u16 {
        match self {
            RecordSize::Bits24 => 24,
            RecordSize::Bits28 => 28,
            RecordSize::Bits32 => 32,
        }
    }
}

/// What a record points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecordType {
    /// Another node in the tree
    SearchNode(u32),
    /// No data for this network
    Empty,
    /// Data section offset of the entry
    Data(u32),
    /// Record value that cannot appear in a valid tree
    Invalid,
}

/// Both records of one node, raw and classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchNode {
    /// Left record (bit 0)
    pub left_record: u32,
    /// Right record (bit 1)
    pub right_record: u32,
    /// Classification of the left record
    pub left_record_type: RecordType,
    /// Classification of the right record
    pub right_record_type: RecordType,
}

/// Outcome of walking the tree for one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHit {
    /// Data section offset, or `None` when the network has no data
    pub data_offset: Option<u32>,
    /// Number of address bits consumed, counted in tree bits
    pub netmask: u16,
}

/// Read-only view over the search tree region of a database
#[derive(Clone, Copy)]
pub struct SearchTree<'a> {
    data: &'a [u8],
    node_count: u32,
    record_size: RecordSize,
    data_section_size: u32,
}

impl<'a> SearchTree<'a> {
    /// `data` must cover at least the tree; `data_section_size` bounds data
    /// records.
    pub fn new(
        data: &'a [u8],
        node_count: u32,
        record_size: RecordSize,
        data_section_size: u32,
    ) -> Self {
        SearchTree {
            data,
            node_count,
            record_size,
            data_section_size,
        }
    }

    /// Number of nodes
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Record layout
    pub fn record_size(&self) -> RecordSize {
        self.record_size
    }

    /// Walk from `start_node`, having already consumed `start_bit` bits,
    /// following `address` (big-endian, `depth / 8` bytes).
    ///
    /// # Errors
    ///
    /// [`MmdbError::CorruptSearchTree`] if a node lies outside the tree, the
    /// final record is out of range, or the walk runs out of bits while still
    /// on a node.
    pub fn walk(&self, address: &[u8], start_node: u32, start_bit: u16, depth: u16) -> Result<TreeHit> {
        if address.len() * 8 < usize::from(depth) {
            return Err(MmdbError::AddressParse(format!(
                "{}-byte address is too short for a {}-bit tree",
                address.len(),
                depth
            )));
        }

        let mut value = start_node;
        let mut bit = start_bit;

        while bit < depth && value < self.node_count {
            let byte = address[usize::from(bit >> 3)];
            let side = (byte >> (7 - (bit & 7))) & 1;
            value = self.read_record(value, side)?;
            bit += 1;
        }

        let netmask = bit;
        if value == self.node_count {
            return Ok(TreeHit {
                data_offset: None,
                netmask,
            });
        }

        match self.classify(value) {
            RecordType::Data(offset) => Ok(TreeHit {
                data_offset: Some(offset),
                netmask,
            }),
            RecordType::SearchNode(_) => {
                debug!(node = value, netmask, "address bits exhausted inside the tree");
                Err(MmdbError::corrupt_tree(format!(
                    "walk ended on node {} after {} bits",
                    value, netmask
                )))
            }
            RecordType::Empty | RecordType::Invalid => {
                debug!(record = value, node_count = self.node_count, "record out of range");
                Err(MmdbError::corrupt_tree(format!(
                    "record value {} is outside the data section (node count {}, data section {} bytes)",
                    value, self.node_count, self.data_section_size
                )))
            }
        }
    }

    /// Follow left records from the root for up to 96 bits.
    ///
    /// Returns the node (or terminal record) reached and how many bits it
    /// took. This is where IPv4 lookups start in an IPv6 tree.
    pub fn find_ipv4_start(&self) -> Result<(u32, u16)> {
        let mut node = 0u32;
        let mut bit = 0u16;
        while bit < 96 && node < self.node_count {
            node = self.read_record(node, 0)?;
            bit += 1;
        }
        Ok((node, bit))
    }

    /// Read both records of `node`.
    ///
    /// # Errors
    ///
    /// [`MmdbError::InvalidNodeNumber`] if `node >= node_count`.
    pub fn read_node(&self, node: u32) -> Result<SearchNode> {
        if node >= self.node_count {
            return Err(MmdbError::InvalidNodeNumber {
                node,
                node_count: self.node_count,
            });
        }
        let (left_record, right_record) = self.read_records(node)?;
        Ok(SearchNode {
            left_record,
            right_record,
            left_record_type: self.classify(left_record),
            right_record_type: self.classify(right_record),
        })
    }

    /// Classify a record value
    pub fn classify(&self, record: u32) -> RecordType {
        if record == 0 {
            // The root can never be a child
            return RecordType::Invalid;
        }
        if record < self.node_count {
            return RecordType::SearchNode(record);
        }
        if record == self.node_count {
            return RecordType::Empty;
        }
        let past = record - self.node_count;
        if past < DATA_SECTION_SEPARATOR_SIZE || past >= self.data_section_size {
            return RecordType::Invalid;
        }
        RecordType::Data(past - DATA_SECTION_SEPARATOR_SIZE)
    }

    fn read_record(&self, node: u32, side: u8) -> Result<u32> {
        let (left, right) = self.read_records(node)?;
        Ok(if side == 0 { left } else { right })
    }

    fn read_records(&self, node: u32) -> Result<(u32, u32)> {
        let len = self.record_size.node_bytes();
        let start = (node as usize).checked_mul(len);
        let bytes = match start {
            Some(start) if fits(start, len, self.data.len()) => &self.data[start..start + len],
            _ => {
                debug!(node, tree_size = self.data.len(), "node outside search tree");
                return Err(MmdbError::corrupt_tree(format!(
                    "node {} lies outside the search tree",
                    node
                )));
            }
        };

        let r = self.record_size.right_record_offset();
        Ok(match self.record_size {
            RecordSize::Bits24 => (be24(&bytes[..3]), be24(&bytes[r..r + 3])),
            RecordSize::Bits28 => {
                let left = be24(&bytes[..3]) | (u32::from(bytes[3] & 0xf0) << 20);
                let right = be32(&bytes[3..7]) & 0x0fff_ffff;
                (left, right)
            }
            RecordSize::Bits32 => (be32(&bytes[..4]), be32(&bytes[r..r + 4])),
        })
    }
}

impl fmt::Debug for SearchTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchTree")
            .field("node_count", &self.node_count)
            .field("record_size", &self.record_size)
            .field("data_section_size", &self.data_section_size)
            .finish()
    }
}

fn be24(b: &[u8]) -> u32 {
    (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}

fn be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        assert_eq!(RecordSize::from_bits(24), Some(RecordSize::Bits24));
        assert_eq!(RecordSize::from_bits(28).map(|r| r.node_bytes()), Some(7));
        assert_eq!(RecordSize::Bits32.right_record_offset(), 4);
        assert_eq!(RecordSize::from_bits(16), None);
        assert_eq!(RecordSize::Bits28.bits(), 28);
    }

    #[test]
    fn test_read_24bit_records() {
        let tree = [0x00, 0x00, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0x14];
        let t = SearchTree::new(&tree, 2, RecordSize::Bits24, 32);
        let node = t.read_node(0).unwrap();
        assert_eq!(node.left_record, 1);
        assert_eq!(node.right_record, 2);
        assert_eq!(node.left_record_type, RecordType::SearchNode(1));
        assert_eq!(node.right_record_type, RecordType::Empty);

        let node = t.read_node(1).unwrap();
        assert_eq!(node.right_record_type, RecordType::Data(2));
    }

    #[test]
    fn test_read_28bit_records() {
        // left = 0x1_23_45_67, right = 0x8_9a_bc_de
        let tree = [0x23, 0x45, 0x67, 0x18, 0x9a, 0xbc, 0xde];
        let t = SearchTree::new(&tree, 1, RecordSize::Bits28, 16);
        let node = t.read_node(0).unwrap();
        assert_eq!(node.left_record, 0x0123_4567);
        assert_eq!(node.right_record, 0x089a_bcde);
    }

    #[test]
    fn test_read_32bit_records() {
        let tree = [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0x00];
        let t = SearchTree::new(&tree, 1, RecordSize::Bits32, 16);
        let node = t.read_node(0).unwrap();
        assert_eq!(node.left_record, 1);
        assert_eq!(node.right_record, 256);
    }

    #[test]
    fn test_read_node_out_of_range() {
        let tree = [0u8; 6];
        let t = SearchTree::new(&tree, 1, RecordSize::Bits24, 16);
        assert!(matches!(
            t.read_node(1),
            Err(MmdbError::InvalidNodeNumber { node: 1, node_count: 1 })
        ));
    }

    #[test]
    fn test_classify() {
        let t = SearchTree::new(&[], 10, RecordSize::Bits24, 100);
        assert_eq!(t.classify(0), RecordType::Invalid);
        assert_eq!(t.classify(5), RecordType::SearchNode(5));
        assert_eq!(t.classify(10), RecordType::Empty);
        assert_eq!(t.classify(12), RecordType::Invalid);
        assert_eq!(t.classify(26), RecordType::Data(0));
        assert_eq!(t.classify(109), RecordType::Data(83));
        assert_eq!(t.classify(110), RecordType::Invalid);
    }

    #[test]
    fn test_walk() {
        // node 0: left -> node 1, right -> empty
        // node 1: left -> data 0, right -> empty
        let tree = [0, 0, 1, 0, 0, 2, 0, 0, 18, 0, 0, 2];
        let t = SearchTree::new(&tree, 2, RecordSize::Bits24, 32);

        let hit = t.walk(&[0x00, 0, 0, 0], 0, 0, 32).unwrap();
        assert_eq!(hit, TreeHit { data_offset: Some(0), netmask: 2 });

        let hit = t.walk(&[0x80, 0, 0, 0], 0, 0, 32).unwrap();
        assert_eq!(hit, TreeHit { data_offset: None, netmask: 1 });
    }

    #[test]
    fn test_walk_corrupt_record() {
        // node 0 left -> 1000, far past the data section
        let tree = [0, 0x03, 0xe8, 0, 0, 1];
        let t = SearchTree::new(&tree, 1, RecordSize::Bits24, 20);
        assert!(matches!(
            t.walk(&[0, 0, 0, 0], 0, 0, 32),
            Err(MmdbError::CorruptSearchTree(_))
        ));
    }

    #[test]
    fn test_walk_node_outside_tree() {
        // node_count claims 3 nodes but only one is present
        let tree = [0, 0, 2, 0, 0, 3];
        let t = SearchTree::new(&tree, 3, RecordSize::Bits24, 20);
        assert!(matches!(
            t.walk(&[0, 0, 0, 0], 0, 0, 32),
            Err(MmdbError::CorruptSearchTree(_))
        ));
    }

    #[test]
    fn test_walk_runs_out_of_bits() {
        // node 0 left -> node 1, node 1 left -> node 0: never terminates by itself
        let tree = [0, 0, 1, 0, 0, 2, 0, 0, 0, 0, 0, 2];
        let t = SearchTree::new(&tree, 2, RecordSize::Bits24, 32);
        assert!(matches!(
            t.walk(&[0, 0, 0, 0], 0, 0, 32),
            Err(MmdbError::CorruptSearchTree(_))
        ));
    }

    #[test]
    fn test_find_ipv4_start() {
        // Left chain ends at the empty marker after two bits
        let tree = [0, 0, 1, 0, 0, 2, 0, 0, 2, 0, 0, 2];
        let t = SearchTree::new(&tree, 2, RecordSize::Bits24, 32);
        assert_eq!(t.find_ipv4_start().unwrap(), (2, 2));
    }
}
