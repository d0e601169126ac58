//! mmdb-reader - Read-only MaxMind DB (MMDB) lookups
//!
//! Opens MMDB files (GeoIP2, GeoLite2, and anything else written in the
//! MaxMind DB format), finds the record for an IP address, and decodes it
//! without copying: strings and byte values borrow directly from the mapped
//! file.
//!
//! # Quick Start
//!
//! ```no_run
//! use mmdb_reader::Database;
//!
//! let db = Database::open("GeoLite2-Country.mmdb")?;
//!
//! let result = db.lookup("89.160.20.128")?;
//! if let Some(entry) = result.entry() {
//!     let code = entry.get_value(&["country", "iso_code"])?;
//!     println!("{:?} (/{})", code.value.as_str(), result.prefix_len());
//!
//!     // Or decode the whole record
//!     let list = entry.get_entry_data_list()?;
//!     list.dump(&mut std::io::stdout(), 2)?;
//! }
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```
//!
//! # Safety of malformed files
//!
//! Every offset read from the file is bounds-checked before use. Corrupt or
//! hostile input produces an [`MmdbError`], never a panic or an out-of-bounds
//! read. Recursive decoding is limited to
//! [`MAXIMUM_DATA_STRUCTURE_DEPTH`](decoder::MAXIMUM_DATA_STRUCTURE_DEPTH)
//! levels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MMDB File                           │
//! ├──────────────────────────────────────┤
//! │  1. Search tree (binary trie)        │
//! │  2. 16-byte separator                │
//! │  3. Data section                     │
//! │  4. Metadata marker + metadata map   │
//! └──────────────────────────────────────┘
//!          ↓ mmap()
//! ┌──────────────────────────────────────┐
//! │  Database (immutable, Send + Sync)   │
//! │  lookup → Entry → get_value / list   │
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checked;
/// Data section value decoding
pub mod decoder;
/// Database handle and lookups
pub mod database;
pub mod entry_list;
/// Error types and status codes
pub mod error;
pub mod geo;
pub mod metadata;
pub mod mmap;
pub mod path;
pub mod pool;
pub mod tree;

// Re-exports for Rust consumers

pub use crate::database::{Database, Entry, LookupResult, OpenMode, OpenOptions};
pub use crate::decoder::{DataType, EntryData, Value};
pub use crate::entry_list::EntryDataList;
pub use crate::error::{strerror, ErrorCode, MmdbError, Result};
pub use crate::geo::GeoLookup;
pub use crate::metadata::{Description, Metadata};
pub use crate::tree::{RecordSize, RecordType, SearchNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library version string
pub fn lib_version() -> &'static str {
    VERSION
}
