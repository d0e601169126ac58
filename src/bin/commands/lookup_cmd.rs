use anyhow::{Context, Result};
use mmdb_reader::{MmdbError, OpenMode};
use serde_json::json;
use std::path::PathBuf;

use super::{lookup_target, open_database};
use crate::cli_utils::format_cidr;

pub fn cmd_lookup(database: PathBuf, mode: OpenMode, ip: String, path: Vec<String>) -> Result<()> {
    let db = open_database(&database, mode)?;
    let (addr, result) = lookup_target(&db, &ip)?;

    let Some(entry) = result.entry() else {
        eprintln!("No record for {}", ip);
        std::process::exit(1);
    };

    // Narrow to the requested value, if any
    let entry = if path.is_empty() {
        entry
    } else {
        match entry.get_value(&path) {
            Ok(data) => db.entry_at(data.offset),
            Err(MmdbError::PathMismatch(_)) => {
                eprintln!("No value at path: {}", path.join("/"));
                std::process::exit(1);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Invalid path: {}", path.join("/")))
            }
        }
    };

    let data = entry
        .get_entry_data_list()
        .and_then(|list| list.to_json())
        .with_context(|| format!("Failed to decode record for: {}", ip))?;

    let prefix_len = result.prefix_len();
    let mut output = json!({
        "network": format_cidr(addr, prefix_len),
        "prefix_len": prefix_len,
        "data": data,
    });
    if !path.is_empty() {
        output["path"] = json!(path);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
