//! Composition root of the storage kernel.

use std::sync::Arc;

use log::debug;

use crate::buffer::{BufferList, BufferManager};
use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::file::FileManager;
use crate::wal::LogManager;

/// Wires the file, log and buffer managers of one data directory.
///
/// The engine owns nothing but shared handles; external collaborators
/// (the transaction and recovery layers) clone what they need and build
/// their own [`BufferList`]s on top.
pub struct StorageEngine {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
}

impl StorageEngine {
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        debug!(
            "opening storage engine at {:?} (block size {}, pool size {})",
            config.db_dir, config.block_size, config.pool_size
        );
        let fm = Arc::new(FileManager::new(&config.db_dir, config.block_size)?);
        let lm = Arc::new(LogManager::new(fm.clone(), config.log_file.clone())?);
        let bm = Arc::new(BufferManager::new(
            &fm,
            &lm,
            config.pool_size,
            config.pin_timeout,
        ));
        Ok(StorageEngine { fm, lm, bm })
    }

    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.fm
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.lm
    }

    pub fn buffer_manager(&self) -> &Arc<BufferManager> {
        &self.bm
    }

    /// Fresh per-transaction pin bookkeeping over this engine's pool.
    pub fn new_buffer_list(&self) -> BufferList {
        BufferList::new(self.bm.clone())
    }
}
