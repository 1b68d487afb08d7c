use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::error::StorageResult;
use crate::file::{BlockId, Page};

/// Files starting with this prefix hold uncommitted scratch data and are
/// removed on startup.
pub const TEMP_FILE_PREFIX: &str = "temp";

/// Owns the on-disk files of one data directory and moves whole blocks
/// between them and in-memory pages.
///
/// One descriptor per distinct file name, opened lazily and cached for the
/// process lifetime. All block I/O across all files is serialized by a
/// single mutex, so no two block transfers ever interleave.
pub struct FileManager {
    db_dir: PathBuf,
    block_size: usize,
    files: Mutex<HashMap<String, File>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl FileManager {
    /// Opens a data directory, creating it if absent and removing any
    /// residual temp files left behind by a crash.
    pub fn new(db_dir: impl Into<PathBuf>, block_size: usize) -> StorageResult<Self> {
        let db_dir = db_dir.into();
        fs::create_dir_all(&db_dir)?;
        for entry in fs::read_dir(&db_dir)? {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_string_lossy()
                .starts_with(TEMP_FILE_PREFIX);
            if is_temp && entry.file_type()?.is_file() {
                debug!("removing leftover temp file {:?}", entry.path());
                fs::remove_file(entry.path())?;
            }
        }
        Ok(FileManager {
            db_dir,
            block_size,
            files: Mutex::new(HashMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Number of blocks currently in the named file.
    pub fn block_count(&self, name: &str) -> StorageResult<u64> {
        let mut files = self.files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, name)?;
        Ok(file.metadata()?.len() / self.block_size as u64)
    }

    /// Reads one whole block into `page`. A block the file does not yet
    /// cover, or a partial tail, reads as zeros for the missing range.
    pub fn read_block(&self, blk: &BlockId, page: &mut Page) -> StorageResult<()> {
        let mut files = self.files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, blk.file_name())?;
        let offset = blk.number() * self.block_size as u64;
        let file_len = file.metadata()?.len();
        let contents = page.contents_mut();
        contents.fill(0);
        if offset < file_len {
            file.seek(SeekFrom::Start(offset))?;
            let available = ((file_len - offset) as usize).min(contents.len());
            file.read_exact(&mut contents[..available])?;
        }
        page.rewind();
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes one whole block from `page` and syncs it to disk.
    pub fn write_block(&self, blk: &BlockId, page: &Page) -> StorageResult<()> {
        let mut files = self.files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, blk.file_name())?;
        file.seek(SeekFrom::Start(blk.number() * self.block_size as u64))?;
        file.write_all(page.contents())?;
        file.sync_all()?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Extends the named file by one zero-filled block and returns its id.
    pub fn append_block(&self, name: &str) -> StorageResult<BlockId> {
        let mut files = self.files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, name)?;
        let number = file.metadata()?.len() / self.block_size as u64;
        file.seek(SeekFrom::Start(number * self.block_size as u64))?;
        file.write_all(&vec![0u8; self.block_size])?;
        file.sync_all()?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("appended block {} to {}", number, name);
        Ok(BlockId::new(name, number))
    }

    /// Number of block writes performed since construction.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of block reads performed since construction.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn open_file<'a>(
        db_dir: &Path,
        files: &'a mut HashMap<String, File>,
        name: &str,
    ) -> StorageResult<&'a mut File> {
        match files.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(db_dir.join(name))?;
                Ok(entry.insert(file))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_block_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), 400)?;
        let blk = fm.append_block("data.tbl")?;

        let mut page = Page::new(400);
        page.write_int(0, 99)?;
        page.write_string(40, "round trip")?;
        fm.write_block(&blk, &page)?;

        let mut read_back = Page::new(400);
        fm.read_block(&blk, &mut read_back)?;
        assert_eq!(read_back.read_int(0)?, 99);
        assert_eq!(read_back.read_string(40)?, "round trip");
        Ok(())
    }

    #[test]
    fn test_append_block_numbers_increase_from_zero() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), 128)?;
        for expected in 0..5 {
            let blk = fm.append_block("grow.tbl")?;
            assert_eq!(blk.number(), expected);
            assert_eq!(blk.file_name(), "grow.tbl");
        }
        assert_eq!(fm.block_count("grow.tbl")?, 5);
        Ok(())
    }

    #[test]
    fn test_block_count_of_fresh_file_is_zero() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), 128)?;
        assert_eq!(fm.block_count("fresh.tbl")?, 0);
        Ok(())
    }

    #[test]
    fn test_read_past_end_yields_zeros() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), 128)?;
        let mut page = Page::new(128);
        page.write_int(0, 77)?;
        fm.read_block(&BlockId::new("empty.tbl", 3), &mut page)?;
        assert!(page.contents().iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_temp_files_removed_on_startup() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("temp_scratch1"), b"junk")?;
        fs::write(dir.path().join("tempsort"), b"junk")?;
        fs::write(dir.path().join("users.tbl"), b"keep")?;

        let _fm = FileManager::new(dir.path(), 128)?;
        assert!(!dir.path().join("temp_scratch1").exists());
        assert!(!dir.path().join("tempsort").exists());
        assert!(dir.path().join("users.tbl").exists());
        Ok(())
    }

    #[test]
    fn test_persistence_across_managers() -> Result<()> {
        let dir = tempdir()?;
        let blk = {
            let fm = FileManager::new(dir.path(), 256)?;
            let blk = fm.append_block("keep.tbl")?;
            let mut page = Page::new(256);
            page.write_string(10, "still here")?;
            fm.write_block(&blk, &page)?;
            blk
        };

        let fm = FileManager::new(dir.path(), 256)?;
        let mut page = Page::new(256);
        fm.read_block(&blk, &mut page)?;
        assert_eq!(page.read_string(10)?, "still here");
        Ok(())
    }

    #[test]
    fn test_write_count_probe() -> Result<()> {
        let dir = tempdir()?;
        let fm = FileManager::new(dir.path(), 128)?;
        assert_eq!(fm.write_count(), 0);

        let blk = fm.append_block("probe.tbl")?;
        assert_eq!(fm.write_count(), 1);

        fm.write_block(&blk, &Page::new(128))?;
        assert_eq!(fm.write_count(), 2);

        let mut page = Page::new(128);
        fm.read_block(&blk, &mut page)?;
        assert_eq!(fm.write_count(), 2);
        assert_eq!(fm.read_count(), 1);
        Ok(())
    }
}
