//! Buffer pool.
//!
//! A fixed set of in-memory frames, each holding one page plus the
//! metadata needed to flush it safely: the assigned block, a pin count,
//! the transaction that dirtied it and the LSN of the last log record
//! describing a change to it. The [`BufferManager`] mediates all frame
//! access; a [`BufferList`] tracks one transaction's pins on top of it.

pub mod list;
pub mod manager;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageResult;
use crate::file::{BlockId, FileManager, Page};
use crate::wal::{LogManager, Lsn, TxId};

pub use list::BufferList;
pub use manager::BufferManager;

/// Shared handle to one pool frame.
pub type SharedBuffer = Arc<Mutex<Buffer>>;

/// One pool frame: a page and the block currently backing it.
///
/// A buffer is created unassigned at pool construction and lives as long
/// as the pool; it is reassigned to a different block only while its pin
/// count is zero.
pub struct Buffer {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    contents: Page,
    block: Option<BlockId>,
    pins: u32,
    tx: Option<TxId>,
    lsn: Option<Lsn>,
}

impl Buffer {
    pub(crate) fn new(fm: Arc<FileManager>, lm: Arc<LogManager>) -> Self {
        let contents = Page::new(fm.block_size());
        Buffer {
            fm,
            lm,
            contents,
            block: None,
            pins: 0,
            tx: None,
            lsn: None,
        }
    }

    pub fn contents(&self) -> &Page {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.contents
    }

    /// The block this frame currently holds, if any.
    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    /// The transaction that dirtied this frame; `None` means clean.
    pub fn modifying_tx(&self) -> Option<TxId> {
        self.tx
    }

    /// Records that `tx` modified the page. A `Some` LSN raises the
    /// frame's tracked LSN, never lowers it: the same page may be touched
    /// by several log records before it is flushed.
    pub fn set_modified(&mut self, tx: TxId, lsn: Option<Lsn>) {
        self.tx = Some(tx);
        if let Some(lsn) = lsn {
            self.lsn = Some(self.lsn.map_or(lsn, |current| current.max(lsn)));
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        self.pins = self.pins.saturating_sub(1);
    }

    /// Points this frame at `blk`: flushes the current contents first (a
    /// dirty page is never silently discarded by reassignment), reads the
    /// new block in and resets the pin count.
    pub(crate) fn assign_to_block(&mut self, blk: BlockId) -> StorageResult<()> {
        self.flush()?;
        self.fm.read_block(&blk, &mut self.contents)?;
        self.block = Some(blk);
        self.pins = 0;
        Ok(())
    }

    /// Writes the page back if dirty. The log is flushed up through this
    /// frame's LSN before the data page is written; a crash between the
    /// two leaves the log record durable, never the bare data change.
    pub(crate) fn flush(&mut self) -> StorageResult<()> {
        if self.tx.is_none() {
            return Ok(());
        }
        if let Some(blk) = &self.block {
            self.lm.flush(self.lsn.unwrap_or_default())?;
            self.fm.write_block(blk, &self.contents)?;
        }
        self.tx = None;
        Ok(())
    }
}
