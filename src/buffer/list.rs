use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::{BufferManager, SharedBuffer};
use crate::error::{StorageError, StorageResult};
use crate::file::BlockId;

/// One transaction's view of its pinned buffers.
///
/// The same block may be pinned several times and must be unpinned the
/// same number of times before the pool is notified; the held pins are an
/// ordered multiset, the buffer map keeps one entry per distinct block.
pub struct BufferList {
    buffers: HashMap<BlockId, SharedBuffer>,
    pins: Vec<BlockId>,
    bm: Arc<BufferManager>,
}

impl BufferList {
    pub fn new(bm: Arc<BufferManager>) -> Self {
        BufferList {
            buffers: HashMap::new(),
            pins: Vec::new(),
            bm,
        }
    }

    /// The buffer backing `blk`, if this transaction holds it pinned.
    pub fn buffer(&self, blk: &BlockId) -> Option<&SharedBuffer> {
        self.buffers.get(blk)
    }

    /// Blocks currently held pinned, one entry per pin.
    pub fn held_pins(&self) -> &[BlockId] {
        &self.pins
    }

    pub fn pin(&mut self, blk: BlockId) -> StorageResult<()> {
        let buffer = self.bm.pin(&blk)?;
        self.buffers.insert(blk.clone(), buffer);
        self.pins.push(blk);
        Ok(())
    }

    /// Releases one pin on `blk`; the cached buffer mapping is dropped
    /// only once no pin on `blk` remains.
    pub fn unpin(&mut self, blk: &BlockId) -> StorageResult<()> {
        let buffer = self
            .buffers
            .get(blk)
            .ok_or_else(|| StorageError::PinNotHeld(blk.clone()))?;
        self.bm.unpin(buffer);
        if let Some(idx) = self.pins.iter().position(|held| held == blk) {
            self.pins.remove(idx);
        }
        if !self.pins.contains(blk) {
            self.buffers.remove(blk);
        }
        Ok(())
    }

    /// Releases every held pin, once per occurrence; called at transaction
    /// end. Safe to call on an already-empty list.
    pub fn unpin_all(&mut self) {
        for blk in self.pins.drain(..) {
            if let Some(buffer) = self.buffers.get(&blk) {
                self.bm.unpin(buffer);
            }
        }
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::engine::StorageEngine;
    use anyhow::Result;
    use std::time::Duration;
    use tempfile::tempdir;

    fn new_engine() -> Result<(StorageEngine, tempfile::TempDir)> {
        let dir = tempdir()?;
        let config = StorageConfig::new(dir.path())
            .with_block_size(400)
            .with_pool_size(3)
            .with_pin_timeout(Duration::from_millis(100));
        let engine = StorageEngine::new(config)?;
        for _ in 0..4 {
            engine.file_manager().append_block("t.tbl")?;
        }
        Ok((engine, dir))
    }

    #[test]
    fn test_double_pin_needs_double_unpin() -> Result<()> {
        let (engine, _dir) = new_engine()?;
        let mut list = engine.new_buffer_list();
        let blk = BlockId::new("t.tbl", 0);

        list.pin(blk.clone())?;
        list.pin(blk.clone())?;
        assert_eq!(list.held_pins().len(), 2);

        list.unpin(&blk)?;
        assert!(list.buffer(&blk).is_some(), "one pin still held");
        list.unpin(&blk)?;
        assert!(list.buffer(&blk).is_none());
        assert_eq!(engine.buffer_manager().available(), 3);
        Ok(())
    }

    #[test]
    fn test_unpin_of_unknown_block_fails() -> Result<()> {
        let (engine, _dir) = new_engine()?;
        let mut list = engine.new_buffer_list();
        assert!(matches!(
            list.unpin(&BlockId::new("t.tbl", 0)),
            Err(StorageError::PinNotHeld(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unpin_all_is_idempotent() -> Result<()> {
        let (engine, _dir) = new_engine()?;
        let mut list = engine.new_buffer_list();

        list.pin(BlockId::new("t.tbl", 0))?;
        list.pin(BlockId::new("t.tbl", 1))?;
        list.pin(BlockId::new("t.tbl", 0))?;

        list.unpin_all();
        assert!(list.held_pins().is_empty());
        assert_eq!(engine.buffer_manager().available(), 3);

        // A second call finds nothing to release and must not double-count.
        list.unpin_all();
        assert_eq!(engine.buffer_manager().available(), 3);
        Ok(())
    }
}
