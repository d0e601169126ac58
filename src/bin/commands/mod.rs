pub mod dump_cmd;
pub mod lookup_cmd;
pub mod metadata_cmd;
pub mod node_cmd;

pub use dump_cmd::cmd_dump;
pub use lookup_cmd::cmd_lookup;
pub use metadata_cmd::cmd_metadata;
pub use node_cmd::cmd_node;

use anyhow::{Context, Result};
use mmdb_reader::{Database, LookupResult, MmdbError, OpenMode, OpenOptions};
use std::net::IpAddr;
use std::path::Path;

/// Open a database with a user-facing error
pub fn open_database(path: &Path, mode: OpenMode) -> Result<Database> {
    OpenOptions::new()
        .mode(mode)
        .open(path)
        .with_context(|| format!("Failed to load database: {}", path.display()))
}

/// Look up numeric IP text, falling back to host name resolution.
///
/// Returns the address that was actually looked up alongside the result.
pub fn lookup_target<'a>(db: &'a Database, target: &str) -> Result<(IpAddr, LookupResult<'a>)> {
    let result = match db.lookup(target) {
        Err(MmdbError::AddressParse(_)) => db.lookup_host(target),
        other => other,
    }
    .with_context(|| format!("Lookup failed for: {}", target))?;
    Ok((result.address(), result))
}
