use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::buffer::{Buffer, SharedBuffer};
use crate::error::{StorageError, StorageResult};
use crate::file::{BlockId, FileManager};
use crate::wal::{LogManager, TxId};

/// Fixed-size pool of buffers shared by all transactions.
///
/// The whole pin decision (lookup, frame choice, accounting) runs under
/// one lock, so "is there a free frame" and "claim it" are atomic with
/// respect to concurrent pinners. A pin against a full pool waits on the
/// unpin notification for a bounded time and then retries exactly once;
/// callers that still find no frame get [`StorageError::BufferAbort`] and
/// are expected to abort at a higher level rather than retry forever.
pub struct BufferManager {
    pool: Vec<SharedBuffer>,
    available: Mutex<usize>,
    unpinned: Condvar,
    timeout: Duration,
}

impl BufferManager {
    pub fn new(
        fm: &Arc<FileManager>,
        lm: &Arc<LogManager>,
        pool_size: usize,
        timeout: Duration,
    ) -> Self {
        let pool = (0..pool_size)
            .map(|_| Arc::new(Mutex::new(Buffer::new(fm.clone(), lm.clone()))))
            .collect();
        BufferManager {
            pool,
            available: Mutex::new(pool_size),
            unpinned: Condvar::new(),
            timeout,
        }
    }

    /// Number of frames currently unpinned.
    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    /// Pins the frame holding `blk`, assigning a free frame first if no
    /// frame holds it yet.
    pub fn pin(&self, blk: &BlockId) -> StorageResult<SharedBuffer> {
        let mut available = self.available.lock();
        if let Some(buffer) = self.try_to_pin(blk, &mut available)? {
            return Ok(buffer);
        }
        debug!("no frame free for {}, waiting up to {:?}", blk, self.timeout);
        let wait = self.unpinned.wait_for(&mut available, self.timeout);
        if wait.timed_out() {
            debug!("wait for {} timed out, retrying once", blk);
        }
        match self.try_to_pin(blk, &mut available)? {
            Some(buffer) => Ok(buffer),
            None => Err(StorageError::BufferAbort(blk.clone())),
        }
    }

    /// Releases one pin on `buffer`, waking one waiting pinner when the
    /// frame becomes free.
    pub fn unpin(&self, buffer: &SharedBuffer) {
        let mut available = self.available.lock();
        let mut frame = buffer.lock();
        frame.unpin();
        if !frame.is_pinned() {
            *available += 1;
            self.unpinned.notify_one();
        }
    }

    /// Flushes every frame dirtied by `tx`; called by the transaction
    /// layer at commit and rollback.
    pub fn flush_all(&self, tx: TxId) -> StorageResult<()> {
        for handle in &self.pool {
            let mut frame = handle.lock();
            if frame.modifying_tx() == Some(tx) {
                frame.flush()?;
            }
        }
        Ok(())
    }

    fn try_to_pin(
        &self,
        blk: &BlockId,
        available: &mut usize,
    ) -> StorageResult<Option<SharedBuffer>> {
        let handle = match self.find_existing(blk) {
            Some(handle) => handle,
            None => match self.choose_unpinned() {
                Some(handle) => {
                    handle.lock().assign_to_block(blk.clone())?;
                    handle
                }
                None => return Ok(None),
            },
        };
        let mut frame = handle.lock();
        if !frame.is_pinned() {
            *available -= 1;
        }
        frame.pin();
        drop(frame);
        Ok(Some(handle))
    }

    fn find_existing(&self, blk: &BlockId) -> Option<SharedBuffer> {
        self.pool
            .iter()
            .find(|handle| handle.lock().block() == Some(blk))
            .cloned()
    }

    /// First unpinned frame in pool order; there is deliberately no
    /// recency policy.
    fn choose_unpinned(&self) -> Option<SharedBuffer> {
        self.pool
            .iter()
            .find(|handle| !handle.lock().is_pinned())
            .cloned()
    }
}
