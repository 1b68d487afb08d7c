//! Storage layer error types.

use thiserror::Error;

use crate::file::BlockId;

/// Errors that can occur in the storage layer.
///
/// I/O and encoding faults propagate unchanged through every layer; only
/// [`StorageError::BufferAbort`] is meant to be caught, by the transaction
/// layer that issued the pin.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid page position: {pos} (page size {size})")]
    InvalidPosition { pos: usize, size: usize },

    #[error("short buffer: requested {requested} bytes but only {remaining} remain")]
    ShortBuffer { requested: usize, remaining: usize },

    #[error("short write: {requested} bytes do not fit in {remaining} remaining")]
    ShortWrite { requested: usize, remaining: usize },

    #[error("unknown log record type: {0}")]
    UnknownLogRecord(i64),

    #[error("log record of {size} bytes exceeds block capacity of {max}")]
    LogRecordTooLarge { size: usize, max: usize },

    #[error("no buffer available for block {0}")]
    BufferAbort(BlockId),

    #[error("block {0} is not pinned by this transaction")]
    PinNotHeld(BlockId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
