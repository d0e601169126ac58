use anyhow::Result;
use mmdb_reader::OpenMode;
use serde_json::json;
use std::path::PathBuf;

use super::open_database;
use crate::cli_utils::format_unix_timestamp;

pub fn cmd_metadata(database: PathBuf, mode: OpenMode, json_output: bool) -> Result<()> {
    let db = open_database(&database, mode)?;
    let meta = db.metadata();

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "file_size": db.file_size(),
            "metadata": meta,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("  Database type:   {}", meta.database_type);
    println!(
        "  Format version:  {}.{}",
        meta.binary_format_major_version, meta.binary_format_minor_version
    );
    println!("  IP version:      IPv{}", meta.ip_version);
    println!("  Node count:      {}", meta.node_count);
    println!("  Record size:     {} bits", meta.record_size);
    println!(
        "  Build time:      {} ({})",
        format_unix_timestamp(meta.build_epoch),
        meta.build_epoch
    );
    if !meta.languages.is_empty() {
        println!("  Languages:       {}", meta.languages.join(", "));
    }
    if !meta.description.is_empty() {
        println!("  Description:");
        for d in &meta.description {
            println!("    {}: {}", d.language, d.description);
        }
    }
    Ok(())
}
