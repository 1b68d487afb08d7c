//! Offline inspection tool for a shaledb data directory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use shaledb::config::{DEFAULT_BLOCK_SIZE, DEFAULT_LOG_FILE};
use shaledb::{LogRecord, StorageConfig, StorageEngine};

/// Inspect a shaledb data directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./shaledb_data")]
    data_dir: PathBuf,

    /// Block size in bytes
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump the write-ahead log, newest record first
    Wal {
        /// Log file name within the data directory
        #[arg(long, default_value = DEFAULT_LOG_FILE)]
        log_file: String,
    },
    /// Show the block count of a file in the data directory
    Blocks {
        /// File name within the data directory
        file: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = StorageConfig::new(&args.data_dir).with_block_size(args.block_size);
    match args.command {
        Command::Wal { log_file } => {
            let engine = StorageEngine::new(config.with_log_file(log_file))?;
            for record in engine.log_manager().iter()? {
                match LogRecord::decode(&record?) {
                    Ok(record) => println!("{record}"),
                    Err(err) => println!("<unreadable record: {err}>"),
                }
            }
        }
        Command::Blocks { file } => {
            let engine = StorageEngine::new(config)?;
            let count = engine.file_manager().block_count(&file)?;
            println!("{file}: {count} blocks");
        }
    }
    Ok(())
}
