use anyhow::{Context, Result};
use mmdb_reader::OpenMode;
use std::io::Write;
use std::path::PathBuf;

use super::{lookup_target, open_database};
use crate::cli_utils::format_cidr;

pub fn cmd_dump(database: PathBuf, mode: OpenMode, ip: String) -> Result<()> {
    let db = open_database(&database, mode)?;
    let (addr, result) = lookup_target(&db, &ip)?;

    let Some(entry) = result.entry() else {
        eprintln!("No record for {}", ip);
        std::process::exit(1);
    };

    let list = entry
        .get_entry_data_list()
        .with_context(|| format!("Failed to decode record for: {}", ip))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", format_cidr(addr, result.prefix_len()))?;
    list.dump(&mut out, 2).context("Failed to write dump")?;
    Ok(())
}
