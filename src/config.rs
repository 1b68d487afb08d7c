//! Storage engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default block size in bytes, applied uniformly to every file.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Default bound on how long a pin call waits for a free frame.
pub const DEFAULT_PIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default name of the write-ahead log file within the data directory.
pub const DEFAULT_LOG_FILE: &str = "shaledb.log";

/// Configuration consumed by the storage kernel.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one file per named entity plus the log.
    pub db_dir: PathBuf,
    /// Block size in bytes.
    pub block_size: usize,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// How long a pin call may wait for an unpin before failing.
    pub pin_timeout: Duration,
    /// File name of the write-ahead log.
    pub log_file: String,
}

impl StorageConfig {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        StorageConfig {
            db_dir: db_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_pin_timeout(mut self, pin_timeout: Duration) -> Self {
        self.pin_timeout = pin_timeout;
        self
    }

    pub fn with_log_file(mut self, log_file: impl Into<String>) -> Self {
        self.log_file = log_file.into();
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_dir: PathBuf::from("shaledb_data"),
            block_size: DEFAULT_BLOCK_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            pin_timeout: DEFAULT_PIN_TIMEOUT,
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
