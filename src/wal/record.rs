//! Tagged log record format.
//!
//! Every record begins with an operation tag integer; the tag values are
//! part of the on-disk format and must never change. SetInt and SetString
//! carry the before-image of the change so that recovery can undo it.

use std::fmt;

use crate::buffer::BufferList;
use crate::error::{StorageError, StorageResult};
use crate::file::{BlockId, Page, INT_SIZE};
use crate::wal::manager::LogManager;

/// Transaction number as stored in log records.
pub type TxId = i64;

/// Log sequence number: a monotonically increasing, 1-based identifier of
/// an appended log record, used to order durability. `Lsn(0)` means no
/// record has been assigned yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(pub u64);

impl Lsn {
    pub fn next(self) -> Lsn {
        Lsn(self.0 + 1)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LSN({})", self.0)
    }
}

// Stable wire values of the operation tags.
pub const CHECKPOINT: i64 = 0;
pub const START: i64 = 1;
pub const COMMIT: i64 = 2;
pub const ROLLBACK: i64 = 3;
pub const SET_INT: i64 = 4;
pub const SET_STRING: i64 = 5;

/// One write-ahead log record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// Quiescent point; owned by no transaction.
    Checkpoint,
    Start {
        tx: TxId,
    },
    Commit {
        tx: TxId,
    },
    Rollback {
        tx: TxId,
    },
    /// An integer was overwritten at `offset` of `block`; `old_val` is the
    /// value it had before.
    SetInt {
        tx: TxId,
        block: BlockId,
        offset: usize,
        old_val: i64,
    },
    /// A string was overwritten at `offset` of `block`; `old_val` is the
    /// value it had before.
    SetString {
        tx: TxId,
        block: BlockId,
        offset: usize,
        old_val: String,
    },
}

impl LogRecord {
    /// Decodes a raw record as produced by the `write_*` constructors.
    pub fn decode(bytes: &[u8]) -> StorageResult<LogRecord> {
        let mut page = Page::from_bytes(bytes.to_vec());
        let tag = page.read_int(0)?;
        match tag {
            CHECKPOINT => Ok(LogRecord::Checkpoint),
            START => Ok(LogRecord::Start {
                tx: page.read_int(INT_SIZE)?,
            }),
            COMMIT => Ok(LogRecord::Commit {
                tx: page.read_int(INT_SIZE)?,
            }),
            ROLLBACK => Ok(LogRecord::Rollback {
                tx: page.read_int(INT_SIZE)?,
            }),
            SET_INT => {
                let (tx, block, offset, vpos) = Self::decode_update_header(&mut page)?;
                Ok(LogRecord::SetInt {
                    tx,
                    block,
                    offset,
                    old_val: page.read_int(vpos)?,
                })
            }
            SET_STRING => {
                let (tx, block, offset, vpos) = Self::decode_update_header(&mut page)?;
                Ok(LogRecord::SetString {
                    tx,
                    block,
                    offset,
                    old_val: page.read_string(vpos)?,
                })
            }
            other => Err(StorageError::UnknownLogRecord(other)),
        }
    }

    /// Decodes the fields shared by SetInt and SetString and returns the
    /// position of the variant's value field.
    fn decode_update_header(page: &mut Page) -> StorageResult<(TxId, BlockId, usize, usize)> {
        let tx = page.read_int(INT_SIZE)?;
        let fpos = 2 * INT_SIZE;
        let name = page.read_bytes(fpos)?;
        let bpos = fpos + Page::max_length(name.len());
        let number = page.read_int(bpos)?;
        let opos = bpos + INT_SIZE;
        let offset = page.read_int(opos)?;
        let vpos = opos + INT_SIZE;
        let block = BlockId::new(String::from_utf8_lossy(&name).into_owned(), number as u64);
        Ok((tx, block, offset as usize, vpos))
    }

    /// The record's operation tag.
    pub fn op(&self) -> i64 {
        match self {
            LogRecord::Checkpoint => CHECKPOINT,
            LogRecord::Start { .. } => START,
            LogRecord::Commit { .. } => COMMIT,
            LogRecord::Rollback { .. } => ROLLBACK,
            LogRecord::SetInt { .. } => SET_INT,
            LogRecord::SetString { .. } => SET_STRING,
        }
    }

    /// The owning transaction, if any. Checkpoint records have no owner.
    pub fn tx_number(&self) -> Option<TxId> {
        match self {
            LogRecord::Checkpoint => None,
            LogRecord::Start { tx }
            | LogRecord::Commit { tx }
            | LogRecord::Rollback { tx }
            | LogRecord::SetInt { tx, .. }
            | LogRecord::SetString { tx, .. } => Some(*tx),
        }
    }

    /// Restores the before-image of a SetInt/SetString record through the
    /// transaction's pinned buffers; a no-op for every other variant.
    ///
    /// The undo write is attributed to the record's transaction but is not
    /// itself logged: compensation records are the recovery layer's
    /// concern, not this one's.
    pub fn undo(&self, buffers: &mut BufferList) -> StorageResult<()> {
        match self {
            LogRecord::SetInt {
                tx,
                block,
                offset,
                old_val,
            } => Self::undo_write(buffers, block, *tx, |page| page.write_int(*offset, *old_val)),
            LogRecord::SetString {
                tx,
                block,
                offset,
                old_val,
            } => Self::undo_write(buffers, block, *tx, |page| page.write_string(*offset, old_val)),
            _ => Ok(()),
        }
    }

    fn undo_write(
        buffers: &mut BufferList,
        block: &BlockId,
        tx: TxId,
        write: impl FnOnce(&mut Page) -> StorageResult<()>,
    ) -> StorageResult<()> {
        buffers.pin(block.clone())?;
        let buffer = buffers
            .buffer(block)
            .ok_or_else(|| StorageError::PinNotHeld(block.clone()))?
            .clone();
        {
            let mut buffer = buffer.lock();
            write(buffer.contents_mut())?;
            buffer.set_modified(tx, None);
        }
        buffers.unpin(block)
    }

    // Each write_* constructor encodes the record into an exact-size page
    // and appends it, returning the assigned LSN. The layouts are the
    // mirrors of decode above.

    pub fn write_checkpoint(lm: &LogManager) -> StorageResult<Lsn> {
        let mut page = Page::new(INT_SIZE);
        page.write_int(0, CHECKPOINT)?;
        lm.append(page.contents())
    }

    pub fn write_start(lm: &LogManager, tx: TxId) -> StorageResult<Lsn> {
        Self::write_lifecycle(lm, START, tx)
    }

    pub fn write_commit(lm: &LogManager, tx: TxId) -> StorageResult<Lsn> {
        Self::write_lifecycle(lm, COMMIT, tx)
    }

    pub fn write_rollback(lm: &LogManager, tx: TxId) -> StorageResult<Lsn> {
        Self::write_lifecycle(lm, ROLLBACK, tx)
    }

    fn write_lifecycle(lm: &LogManager, tag: i64, tx: TxId) -> StorageResult<Lsn> {
        let mut page = Page::new(2 * INT_SIZE);
        page.write_int(0, tag)?;
        page.write_int(INT_SIZE, tx)?;
        lm.append(page.contents())
    }

    pub fn write_set_int(
        lm: &LogManager,
        tx: TxId,
        block: &BlockId,
        offset: usize,
        old_val: i64,
    ) -> StorageResult<Lsn> {
        let vpos = Self::update_value_pos(block);
        let mut page = Page::new(vpos + INT_SIZE);
        Self::encode_update_header(&mut page, SET_INT, tx, block, offset)?;
        page.write_int(vpos, old_val)?;
        lm.append(page.contents())
    }

    pub fn write_set_string(
        lm: &LogManager,
        tx: TxId,
        block: &BlockId,
        offset: usize,
        old_val: &str,
    ) -> StorageResult<Lsn> {
        let vpos = Self::update_value_pos(block);
        let mut page = Page::new(vpos + Page::max_length(old_val.len()));
        Self::encode_update_header(&mut page, SET_STRING, tx, block, offset)?;
        page.write_string(vpos, old_val)?;
        lm.append(page.contents())
    }

    fn update_value_pos(block: &BlockId) -> usize {
        let fpos = 2 * INT_SIZE;
        let bpos = fpos + Page::max_length(block.file_name().len());
        bpos + 2 * INT_SIZE
    }

    fn encode_update_header(
        page: &mut Page,
        tag: i64,
        tx: TxId,
        block: &BlockId,
        offset: usize,
    ) -> StorageResult<()> {
        let fpos = 2 * INT_SIZE;
        let bpos = fpos + Page::max_length(block.file_name().len());
        let opos = bpos + INT_SIZE;
        page.write_int(0, tag)?;
        page.write_int(INT_SIZE, tx)?;
        page.write_string(fpos, block.file_name())?;
        page.write_int(bpos, block.number() as i64)?;
        page.write_int(opos, offset as i64)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Checkpoint => write!(f, "<CHECKPOINT>"),
            LogRecord::Start { tx } => write!(f, "<START {}>", tx),
            LogRecord::Commit { tx } => write!(f, "<COMMIT {}>", tx),
            LogRecord::Rollback { tx } => write!(f, "<ROLLBACK {}>", tx),
            LogRecord::SetInt {
                tx,
                block,
                offset,
                old_val,
            } => write!(f, "<SETINT {} {} {} {}>", tx, block, offset, old_val),
            LogRecord::SetString {
                tx,
                block,
                offset,
                old_val,
            } => write!(f, "<SETSTRING {} {} {} {}>", tx, block, offset, old_val),
        }
    }
}
