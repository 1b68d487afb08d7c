//! Storage kernel for an embedded relational database.
//!
//! This crate provides the durability core that higher layers build upon:
//!
//! - **Page / BlockId / FileManager**: fixed-size blocks in named files,
//!   moved whole between disk and in-memory pages with a little-endian,
//!   length-prefixed binary codec
//! - **LogManager / LogIterator**: an append-only write-ahead log with
//!   explicit flush control and a newest-first scan
//! - **Buffer / BufferManager / BufferList**: a bounded pool of pinned
//!   frames with log-before-data flush ordering
//! - **LogRecord**: the tagged record format carrying before-images for
//!   physical undo
//!
//! Transaction-level concurrency control, recovery orchestration, catalog
//! management and query processing are external collaborators: they
//! consume the pin/unpin, append/flush/iterate and encode/decode/undo
//! primitives exposed here. The kernel assumes a single process with
//! exclusive ownership of its data directory.

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod wal;

pub use buffer::{Buffer, BufferList, BufferManager, SharedBuffer};
pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use error::{StorageError, StorageResult};
pub use file::{BlockId, FileManager, Page, INT_SIZE};
pub use wal::{LogIterator, LogManager, LogRecord, Lsn, TxId};
