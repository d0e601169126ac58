mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_dump, cmd_lookup, cmd_metadata, cmd_node};

#[derive(Parser)]
#[command(name = "mmdb")]
#[command(
    about = "Query MaxMind DB (MMDB) IP lookup databases",
    long_about = "mmdb - Read-only lookups in MaxMind DB files (GeoIP2, GeoLite2 and compatible)\n\n\
    Examples:\n\
      mmdb lookup GeoLite2-Country.mmdb 81.2.69.160\n\
      mmdb lookup GeoLite2-City.mmdb 81.2.69.160 city names en\n\
      mmdb metadata GeoLite2-Country.mmdb --json\n\
      mmdb dump GeoLite2-Country.mmdb 2001:218::1\n\
      mmdb node GeoLite2-Country.mmdb 0"
)]
#[command(version)]
struct Cli {
    /// Log decoding and tree-walk diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read the whole file into memory instead of memory-mapping it
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an IP address (or host name) and print its record as JSON
    Lookup {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// IP address, or a host name to resolve
        #[arg(value_name = "IP")]
        ip: String,

        /// Optional path into the record (map keys and array indices; negative indices count from the end)
        #[arg(value_name = "PATH", allow_negative_numbers = true)]
        path: Vec<String>,
    },

    /// Show database metadata
    Metadata {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the record for an IP address with value types
    Dump {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// IP address to look up
        #[arg(value_name = "IP")]
        ip: String,
    },

    /// Show both records of a search tree node
    Node {
        /// Path to the .mmdb file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Node number
        #[arg(value_name = "NODE")]
        node: u32,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli_utils::init_logging(cli.verbose);
    let mode = if cli.in_memory {
        mmdb_reader::OpenMode::InMemory
    } else {
        mmdb_reader::OpenMode::Mmap
    };

    match cli.command {
        Commands::Lookup { database, ip, path } => cmd_lookup(database, mode, ip, path),
        Commands::Metadata { database, json } => cmd_metadata(database, mode, json),
        Commands::Dump { database, ip } => cmd_dump(database, mode, ip),
        Commands::Node {
            database,
            node,
            json,
        } => cmd_node(database, mode, node, json),
    }
}
