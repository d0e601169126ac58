use anyhow::{Context, Result};
use mmdb_reader::{OpenMode, RecordType};
use std::path::PathBuf;

use super::open_database;

pub fn cmd_node(database: PathBuf, mode: OpenMode, node: u32, json_output: bool) -> Result<()> {
    let db = open_database(&database, mode)?;
    let search_node = db
        .read_node(node)
        .with_context(|| format!("Cannot read node {}", node))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&search_node)?);
        return Ok(());
    }

    println!("Node {} of {}", node, db.metadata().node_count);
    println!(
        "  left:  {:>10}  {}",
        search_node.left_record,
        describe(search_node.left_record_type)
    );
    println!(
        "  right: {:>10}  {}",
        search_node.right_record,
        describe(search_node.right_record_type)
    );
    Ok(())
}

fn describe(record: RecordType) -> String {
    match record {
        RecordType::SearchNode(n) => format!("node {}", n),
        RecordType::Empty => "empty".to_string(),
        RecordType::Data(offset) => format!("data at offset {}", offset),
        RecordType::Invalid => "invalid".to_string(),
    }
}
