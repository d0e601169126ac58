//! Error types for the MMDB reader
//!
//! Every failure the reader can report is a variant of [`MmdbError`]. Each
//! variant also maps onto a stable numeric [`ErrorCode`], which is what
//! [`strerror`] describes. The numbers match the status codes used by
//! libmaxminddb so callers that log or persist them stay compatible.

use thiserror::Error;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, MmdbError>;

/// Main error type for reader operations
#[derive(Error, Debug)]
pub enum MmdbError {
    /// The database file is missing, unreadable, or could not be mapped
    #[error("cannot open database '{path}': {source}")]
    FileOpen {
        /// Path that was being opened
        path: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A search tree record is out of range, or the walk left the tree region
    #[error("corrupt search tree: {0}")]
    CorruptSearchTree(String),

    /// Metadata marker missing, required key missing or mistyped, or section bounds invalid
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Reading the database into memory failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arena exhausted or an allocation failed
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Unsupported binary format version or record size
    #[error("unknown database format: {0}")]
    UnknownFormat(String),

    /// Malformed data section content
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A lookup path segment could not be interpreted at all
    #[error("invalid lookup path: {0}")]
    InvalidLookupPath(String),

    /// A lookup path does not match the shape of the data
    #[error("lookup path does not match data: {0}")]
    PathMismatch(String),

    /// `read_node` was called with a node number outside the tree
    #[error("invalid node number {node} (node count {node_count})")]
    InvalidNodeNumber {
        /// Requested node
        node: u32,
        /// Number of nodes in the tree
        node_count: u32,
    },

    /// An IPv6 address was looked up in an IPv4-only database
    #[error("cannot look up IPv6 address {0} in an IPv4-only database")]
    Ipv6LookupInIpv4Db(std::net::Ipv6Addr),

    /// The lookup text is not a numeric IP address
    #[error("invalid IP address '{0}'")]
    AddressParse(String),

    /// Hostname resolution failed or yielded no addresses
    #[error("cannot resolve '{host}': {reason}")]
    Resolve {
        /// Host that was being resolved
        host: String,
        /// Resolver failure description
        reason: String,
    },
}

impl MmdbError {
    /// Numeric code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            MmdbError::FileOpen { .. } => ErrorCode::FileOpen,
            MmdbError::CorruptSearchTree(_) => ErrorCode::CorruptSearchTree,
            MmdbError::InvalidMetadata(_) => ErrorCode::InvalidMetadata,
            MmdbError::Io(_) => ErrorCode::Io,
            MmdbError::OutOfMemory(_) => ErrorCode::OutOfMemory,
            MmdbError::UnknownFormat(_) => ErrorCode::UnknownFormat,
            MmdbError::InvalidData(_) => ErrorCode::InvalidData,
            MmdbError::InvalidLookupPath(_) => ErrorCode::InvalidLookupPath,
            MmdbError::PathMismatch(_) => ErrorCode::PathMismatch,
            MmdbError::InvalidNodeNumber { .. } => ErrorCode::InvalidNodeNumber,
            MmdbError::Ipv6LookupInIpv4Db(_) => ErrorCode::Ipv6LookupInIpv4Db,
            MmdbError::AddressParse(_) | MmdbError::Resolve { .. } => ErrorCode::Address,
        }
    }

    /// Shorthand for [`MmdbError::InvalidData`]
    pub(crate) fn invalid_data(msg: impl Into<String>) -> Self {
        MmdbError::InvalidData(msg.into())
    }

    /// Shorthand for [`MmdbError::InvalidMetadata`]
    pub(crate) fn invalid_metadata(msg: impl Into<String>) -> Self {
        MmdbError::InvalidMetadata(msg.into())
    }

    /// Shorthand for [`MmdbError::CorruptSearchTree`]
    pub(crate) fn corrupt_tree(msg: impl Into<String>) -> Self {
        MmdbError::CorruptSearchTree(msg.into())
    }
}

/// Stable numeric status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Not an error
    Success = 0,
    /// See [`MmdbError::FileOpen`]
    FileOpen = 1,
    /// See [`MmdbError::CorruptSearchTree`]
    CorruptSearchTree = 2,
    /// See [`MmdbError::InvalidMetadata`]
    InvalidMetadata = 3,
    /// See [`MmdbError::Io`]
    Io = 4,
    /// See [`MmdbError::OutOfMemory`]
    OutOfMemory = 5,
    /// See [`MmdbError::UnknownFormat`]
    UnknownFormat = 6,
    /// See [`MmdbError::InvalidData`]
    InvalidData = 7,
    /// See [`MmdbError::InvalidLookupPath`]
    InvalidLookupPath = 8,
    /// See [`MmdbError::PathMismatch`]
    PathMismatch = 9,
    /// See [`MmdbError::InvalidNodeNumber`]
    InvalidNodeNumber = 10,
    /// See [`MmdbError::Ipv6LookupInIpv4Db`]
    Ipv6LookupInIpv4Db = 11,
    /// Address text could not be parsed or resolved (outside the database status range)
    Address = -1,
}

impl ErrorCode {
    /// Raw integer value
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Human readable description of this code
    pub fn description(self) -> &'static str {
        strerror(self.as_i32())
    }
}

/// Describe a numeric status code
///
/// Unknown codes yield `"Unknown error code"`.
pub fn strerror(code: i32) -> &'static str {
    match code {
        0 => "Success (not an error)",
        1 => "Error opening the specified MaxMind DB file",
        2 => "The MaxMind DB file's search tree is corrupt",
        3 => "The MaxMind DB file contains invalid metadata",
        4 => "An attempt to read data from the MaxMind DB file failed",
        5 => "A memory allocation call failed",
        6 => {
            "The MaxMind DB file is in a format this library can't handle \
             (unknown record size or binary format version)"
        }
        7 => {
            "The MaxMind DB file's data section contains bad data \
             (unknown data type or corrupt data)"
        }
        8 => {
            "The lookup path contained an invalid value \
             (like a negative integer for an array index)"
        }
        9 => {
            "The lookup path does not match the data (key that doesn't exist, \
             array index bigger than the array, expected array or map where none exists)"
        }
        10 => {
            "The read_node function was called with a node number \
             that does not exist in the search tree"
        }
        11 => "You attempted to look up an IPv6 address in an IPv4-only database",
        -1 => "The address could not be parsed or resolved",
        _ => "Unknown error code",
    }
}
