use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::file::{BlockId, FileManager, Page, INT_SIZE};
use crate::wal::iterator::LogIterator;
use crate::wal::record::Lsn;

/// Append-only log manager.
///
/// Records are packed into each block from the end backward: offset 0 of
/// every log block holds the boundary, the offset of the earliest record
/// currently in the block, so the most recent record always sits at the
/// boundary itself. The tail block is mirrored in memory and only written
/// to disk on demand, batching log writes across many appends.
pub struct LogManager {
    fm: Arc<FileManager>,
    file_name: String,
    inner: Mutex<LogState>,
}

struct LogState {
    page: Page,
    current_block: BlockId,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

impl LogManager {
    /// Opens the log file, adopting its last block as the tail, or appends
    /// the first block if the file is empty.
    pub fn new(fm: Arc<FileManager>, file_name: impl Into<String>) -> StorageResult<Self> {
        let file_name = file_name.into();
        let mut page = Page::new(fm.block_size());
        let count = fm.block_count(&file_name)?;
        let current_block = if count == 0 {
            Self::append_new_block(&fm, &file_name, &mut page)?
        } else {
            let blk = BlockId::new(file_name.clone(), count - 1);
            fm.read_block(&blk, &mut page)?;
            blk
        };
        Ok(LogManager {
            fm,
            file_name,
            inner: Mutex::new(LogState {
                page,
                current_block,
                latest_lsn: Lsn::default(),
                last_saved_lsn: Lsn::default(),
            }),
        })
    }

    /// Appends one record to the tail block, rolling to a fresh block
    /// first if the record does not fit, and returns its LSN.
    ///
    /// The returned LSN is not durable until a [`flush`](Self::flush) at
    /// or above it.
    pub fn append(&self, record: &[u8]) -> StorageResult<Lsn> {
        let mut state = self.inner.lock();
        let needed = Page::max_length(record.len());
        let capacity = self.fm.block_size();
        if needed + INT_SIZE > capacity {
            return Err(StorageError::LogRecordTooLarge {
                size: record.len(),
                max: capacity - 2 * INT_SIZE,
            });
        }
        let mut boundary = state.page.read_int(0)? as usize;
        if boundary < needed + INT_SIZE {
            self.flush_state(&mut state)?;
            let new_block = Self::append_new_block(&self.fm, &self.file_name, &mut state.page)?;
            trace!("log rolled to {}", new_block);
            state.current_block = new_block;
            boundary = state.page.read_int(0)? as usize;
        }
        let pos = boundary - needed;
        state.page.write_bytes(pos, record)?;
        state.page.write_int(0, pos as i64)?;
        state.latest_lsn = state.latest_lsn.next();
        Ok(state.latest_lsn)
    }

    /// Ensures every record up through `lsn` is durable. A no-op when
    /// `lsn` is already known to be on disk.
    pub fn flush(&self, lsn: Lsn) -> StorageResult<()> {
        let mut state = self.inner.lock();
        if lsn < state.last_saved_lsn {
            return Ok(());
        }
        self.flush_state(&mut state)
    }

    /// Flushes the tail and returns an iterator over the whole log,
    /// newest record first.
    pub fn iter(&self) -> StorageResult<LogIterator> {
        let mut state = self.inner.lock();
        self.flush_state(&mut state)?;
        LogIterator::new(self.fm.clone(), state.current_block.clone())
    }

    /// LSN of the most recently appended record.
    pub fn latest_lsn(&self) -> Lsn {
        self.inner.lock().latest_lsn
    }

    /// LSN known to be durably on disk.
    pub fn last_saved_lsn(&self) -> Lsn {
        self.inner.lock().last_saved_lsn
    }

    fn flush_state(&self, state: &mut LogState) -> StorageResult<()> {
        self.fm.write_block(&state.current_block, &state.page)?;
        state.last_saved_lsn = state.latest_lsn;
        Ok(())
    }

    fn append_new_block(
        fm: &FileManager,
        file_name: &str,
        page: &mut Page,
    ) -> StorageResult<BlockId> {
        let blk = fm.append_block(file_name)?;
        page.contents_mut().fill(0);
        // An empty block's boundary points past its far edge.
        page.write_int(0, fm.block_size() as i64)?;
        fm.write_block(&blk, page)?;
        Ok(blk)
    }
}
