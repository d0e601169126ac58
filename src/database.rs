//! Database handle
//!
//! [`Database`] ties the pieces together: it owns the mapped file, the parsed
//! [`Metadata`], and the section boundaries, and answers lookups against
//! them.
//!
//! A database file is laid out as:
//!
//! ```text
//! [search tree][16-byte separator][data section ... metadata marker][metadata]
//! ```
//!
//! The handle is immutable after open, so it can be shared between threads
//! and queried concurrently. Everything a lookup returns borrows from the
//! handle and cannot outlive it.

use crate::decoder::{DataSection, EntryData};
use crate::entry_list::{get_entry_data_list, EntryDataList};
use crate::error::{MmdbError, Result};
use crate::metadata::{find_metadata_marker, Metadata};
use crate::mmap::{MappedFile, MmapFile, OwnedBuffer};
use crate::path;
use crate::tree::{RecordSize, SearchNode, SearchTree, DATA_SECTION_SEPARATOR_SIZE};
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::Path;
use tracing::{debug, info};

/// The only supported binary format major version
pub const SUPPORTED_FORMAT_MAJOR_VERSION: u16 = 2;

/// How the file contents are made available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Memory-map the file read-only
    #[default]
    Mmap,
    /// Read the whole file into memory
    InMemory,
}

/// Options for opening a database
///
/// ```no_run
/// use mmdb_reader::{OpenMode, OpenOptions};
///
/// let db = OpenOptions::new()
///     .mode(OpenMode::InMemory)
///     .open("GeoLite2-Country.mmdb")?;
/// # Ok::<(), mmdb_reader::MmdbError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    mode: OpenMode,
}

impl OpenOptions {
    /// Default options (memory-mapped)
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose how the file is loaded
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Open the database at `path`
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Database> {
        let path = path.as_ref();
        let file: Box<dyn MappedFile> = match self.mode {
            OpenMode::Mmap => Box::new(MmapFile::open(path)?),
            OpenMode::InMemory => Box::new(OwnedBuffer::read(path)?),
        };
        Database::load(file, &path.display().to_string())
    }
}

/// An open database
pub struct Database {
    file: Box<dyn MappedFile>,
    metadata: Metadata,
    record_size: RecordSize,
    /// Offset of the data section in the file
    data_section_start: usize,
    /// Offset just past the metadata marker
    metadata_start: usize,
    /// Node and bit depth where IPv4 lookups start in an IPv6 tree
    ipv4_start: (u32, u16),
    /// Address width in bits
    depth: u16,
}

impl Database {
    /// Memory-map and open the database at `path`.
    ///
    /// # Errors
    ///
    /// - [`MmdbError::FileOpen`] if the file cannot be opened or mapped
    /// - [`MmdbError::InvalidMetadata`] if the metadata is missing or malformed,
    ///   or the sections it describes do not fit the file
    /// - [`MmdbError::UnknownFormat`] for an unsupported format version or record size
    /// - [`MmdbError::InvalidData`] if the data section is implausibly small
    /// - [`MmdbError::CorruptSearchTree`] if the IPv4 subtree cannot be located
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::default().open(path)
    }

    /// Open a database held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::load(Box::new(OwnedBuffer::new(bytes)), "<memory>")
    }

    /// Open a database over any [`MappedFile`]
    pub fn from_mapped(file: Box<dyn MappedFile>) -> Result<Self> {
        Self::load(file, "<mapped>")
    }

    fn load(file: Box<dyn MappedFile>, source: &str) -> Result<Self> {
        let bytes = file.as_slice();
        let file_size = bytes.len();

        let metadata_start = find_metadata_marker(bytes).ok_or_else(|| {
            debug!(source, file_size, "metadata marker not found");
            MmdbError::invalid_metadata("metadata section marker not found")
        })?;
        let metadata = Metadata::parse(&bytes[metadata_start..])?;

        if metadata.binary_format_major_version != SUPPORTED_FORMAT_MAJOR_VERSION {
            return Err(MmdbError::UnknownFormat(format!(
                "binary format version {}.{} is not supported",
                metadata.binary_format_major_version, metadata.binary_format_minor_version
            )));
        }
        let record_size = RecordSize::from_bits(metadata.record_size).ok_or_else(|| {
            MmdbError::UnknownFormat(format!("unsupported record size {}", metadata.record_size))
        })?;

        let search_tree_size = usize::try_from(metadata.search_tree_size())
            .map_err(|_| MmdbError::invalid_metadata("search tree size overflows"))?;
        let separator = DATA_SECTION_SEPARATOR_SIZE as usize;
        if !crate::checked::fits(search_tree_size, separator, file_size) {
            return Err(MmdbError::invalid_metadata(format!(
                "search tree of {} bytes does not fit in a {} byte file",
                search_tree_size, file_size
            )));
        }
        let data_section_start = search_tree_size + separator;
        let data_section_size = file_size - data_section_start;
        if data_section_size < 3 {
            return Err(MmdbError::invalid_data(format!(
                "data section is only {} bytes",
                data_section_size
            )));
        }

        let depth = if metadata.ip_version == 6 { 128 } else { 32 };
        let mut db = Database {
            file,
            metadata,
            record_size,
            data_section_start,
            metadata_start,
            ipv4_start: (0, 0),
            depth,
        };
        if db.metadata.ip_version == 6 {
            db.ipv4_start = db.search_tree().find_ipv4_start()?;
        }

        info!(
            source,
            database_type = %db.metadata.database_type,
            node_count = db.metadata.node_count,
            record_size = db.metadata.record_size,
            ip_version = db.metadata.ip_version,
            "opened database"
        );
        Ok(db)
    }

    /// Release the database.
    ///
    /// Equivalent to dropping it; anything borrowed from it must be gone.
    pub fn close(self) {
        debug!(database_type = %self.metadata.database_type, "closing database");
    }

    /// Parsed metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Record layout of the search tree
    pub fn record_size(&self) -> RecordSize {
        self.record_size
    }

    /// Total file size in bytes
    pub fn file_size(&self) -> usize {
        self.file.len()
    }

    /// The data section, from just after the separator to the end of the file
    pub fn data_section(&self) -> DataSection<'_> {
        DataSection::new(&self.file.as_slice()[self.data_section_start..])
    }

    /// The metadata map as a section of its own
    pub fn metadata_section(&self) -> DataSection<'_> {
        DataSection::new(&self.file.as_slice()[self.metadata_start..])
    }

    fn search_tree(&self) -> SearchTree<'_> {
        let data_section_size = self.file.len() - self.data_section_start;
        SearchTree::new(
            &self.file.as_slice()[..self.data_section_start],
            self.metadata.node_count,
            self.record_size,
            u32::try_from(data_section_size).unwrap_or(u32::MAX),
        )
    }

    /// Look up a numeric IP address given as text.
    ///
    /// Host names are not resolved; use [`lookup_host`](Self::lookup_host)
    /// for that.
    ///
    /// # Errors
    ///
    /// [`MmdbError::AddressParse`] if `ip` is not an IPv4 or IPv6 literal,
    /// otherwise as for [`lookup_addr`](Self::lookup_addr).
    pub fn lookup(&self, ip: &str) -> Result<LookupResult<'_>> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| MmdbError::AddressParse(ip.to_string()))?;
        self.lookup_addr(addr)
    }

    /// Look up the address of a socket address (the port is ignored)
    pub fn lookup_sockaddr(&self, addr: SocketAddr) -> Result<LookupResult<'_>> {
        self.lookup_addr(addr.ip())
    }

    /// Resolve `host` with the system resolver and look up its first address.
    ///
    /// # Errors
    ///
    /// [`MmdbError::Resolve`] if resolution fails or yields nothing.
    pub fn lookup_host(&self, host: &str) -> Result<LookupResult<'_>> {
        let resolve_error = |reason: String| MmdbError::Resolve {
            host: host.to_string(),
            reason,
        };
        let addr = (host, 0)
            .to_socket_addrs()
            .map_err(|e| resolve_error(e.to_string()))?
            .next()
            .ok_or_else(|| resolve_error("no addresses returned".to_string()))?;
        self.lookup_sockaddr(addr)
    }

    /// Look up an IP address.
    ///
    /// IPv4 addresses in an IPv6 database are looked up under `::/96`; their
    /// netmask is counted in IPv6 bits (see [`LookupResult::prefix_len`]).
    ///
    /// # Errors
    ///
    /// - [`MmdbError::Ipv6LookupInIpv4Db`] for an IPv6 address against an
    ///   IPv4-only database
    /// - [`MmdbError::CorruptSearchTree`] if the walk hits an invalid record
    pub fn lookup_addr(&self, addr: IpAddr) -> Result<LookupResult<'_>> {
        let tree = self.search_tree();
        let mut address = [0u8; 16];

        let (hit, ipv4_in_ipv6) = match addr {
            IpAddr::V4(v4) if self.metadata.ip_version == 4 => {
                address[..4].copy_from_slice(&v4.octets());
                (tree.walk(&address[..4], 0, 0, self.depth)?, false)
            }
            IpAddr::V4(v4) => {
                address[12..].copy_from_slice(&v4.octets());
                let (node, bit) = self.ipv4_start;
                (tree.walk(&address, node, bit, self.depth)?, true)
            }
            IpAddr::V6(v6) if self.metadata.ip_version == 4 => {
                return Err(MmdbError::Ipv6LookupInIpv4Db(v6));
            }
            IpAddr::V6(v6) => {
                address = v6.octets();
                (tree.walk(&address, 0, 0, self.depth)?, false)
            }
        };

        Ok(LookupResult {
            address: addr,
            found: hit.data_offset.is_some(),
            entry: self.entry_at(hit.data_offset.unwrap_or(0)),
            netmask: hit.netmask,
            ipv4_in_ipv6,
        })
    }

    /// Entry at a data section offset, e.g. from a
    /// [`RecordType::Data`](crate::tree::RecordType::Data) record
    pub fn entry_at(&self, offset: u32) -> Entry<'_> {
        Entry {
            section: self.data_section(),
            offset,
        }
    }

    /// Read both records of a search tree node.
    ///
    /// # Errors
    ///
    /// [`MmdbError::InvalidNodeNumber`] if `node` is not below `node_count`.
    pub fn read_node(&self, node: u32) -> Result<SearchNode> {
        self.search_tree().read_node(node)
    }

    /// Materialize the whole metadata map
    pub fn metadata_entry_data_list(&self) -> Result<EntryDataList<'_>> {
        get_entry_data_list(&self.metadata_section(), 0)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("database_type", &self.metadata.database_type)
            .field("ip_version", &self.metadata.ip_version)
            .field("node_count", &self.metadata.node_count)
            .field("record_size", &self.record_size)
            .field("file_size", &self.file.len())
            .finish()
    }
}

/// Outcome of a lookup
#[derive(Debug, Clone, Copy)]
pub struct LookupResult<'a> {
    /// True if the address has data
    pub found: bool,
    /// The data record; meaningful only when `found`
    pub entry: Entry<'a>,
    /// Tree bits consumed before the walk left the node range
    pub netmask: u16,
    address: IpAddr,
    ipv4_in_ipv6: bool,
}

impl<'a> LookupResult<'a> {
    /// The data record, if any
    pub fn entry(&self) -> Option<Entry<'a>> {
        self.found.then_some(self.entry)
    }

    /// The address that was looked up, after any host name resolution
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Prefix length in the address family that was looked up.
    ///
    /// Differs from `netmask` only for IPv4 addresses in an IPv6 database,
    /// where the 96 leading tree bits are not part of the IPv4 prefix. A
    /// record reached before bit 96 covers all of IPv4, so its prefix is 0.
    pub fn prefix_len(&self) -> u16 {
        if self.ipv4_in_ipv6 {
            self.netmask.saturating_sub(96)
        } else {
            self.netmask
        }
    }
}

/// A reference to a value in the data section
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    section: DataSection<'a>,
    offset: u32,
}

impl<'a> Entry<'a> {
    /// Data section offset of the value
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Decode the value itself, resolving a pointer
    pub fn decode(&self) -> Result<EntryData<'a>> {
        self.section.decode_one_follow(self.offset)
    }

    /// Follow a path of map keys and array indices from this value.
    ///
    /// ```no_run
    /// # let db = mmdb_reader::Database::open("GeoLite2-City.mmdb")?;
    /// let result = db.lookup("81.2.69.160")?;
    /// if let Some(entry) = result.entry() {
    ///     let name = entry.get_value(&["city", "names", "en"])?;
    ///     println!("{:?}", name.value.as_str());
    /// }
    /// # Ok::<(), mmdb_reader::MmdbError>(())
    /// ```
    pub fn get_value<S: AsRef<str>>(&self, path: &[S]) -> Result<EntryData<'a>> {
        path::get_value(&self.section, self.offset, path)
    }

    /// Materialize this value and everything nested in it
    pub fn get_entry_data_list(&self) -> Result<EntryDataList<'a>> {
        get_entry_data_list(&self.section, self.offset)
    }
}
