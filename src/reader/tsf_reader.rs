//! The reader façade over one TSF file: the mapped accessor, its index, and
//! the tombstone sidecar composed behind one lock.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::IndexEntry;
use crate::reader::block_iterator::BlockIterator;
use crate::reader::block_reader::MmapAccessor;
use crate::reader::index_reader::TsfIndex;
use crate::stat::FileStat;
use crate::tombstone::Tombstoner;
use crate::value::{BooleanValue, FloatValue, IntegerValue, StringValue, Values};
use crate::{KeyRange, TimeRange};

/// TsfReader reads one on-disk TSF file.
///
/// The file's bytes are immutable for the reader's lifetime; `delete` and
/// `delete_range` only record tombstones and hide entries from the in-memory
/// index. `close` releases the mapping and file handle, after which block
/// reads fail with [`crate::TsfError::Closed`].
pub struct TsfReader {
    /// The index of all blocks.
    index: Arc<dyn TsfIndex>,

    inner: RwLock<ReaderInner>,
}

struct ReaderInner {
    /// Provides access and decoding of blocks for the reader.
    accessor: MmapAccessor,

    /// Ensures tombstoned data is not visible through the index.
    tombstoner: Tombstoner,

    /// Size of the file on disk.
    size: u64,

    /// Last time the file was modified on disk, unix nanoseconds.
    last_modified: i64,
}

impl TsfReader {
    /// Opens the TSF file at `path` and applies any persisted tombstones.
    pub fn open(path: impl AsRef<Path>) -> Result<TsfReader> {
        let path = path.as_ref().to_path_buf();
        let f = File::open(&path)?;

        let meta = f.metadata()?;
        let size = meta.len();
        let last_modified = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        let accessor = MmapAccessor::init(f, path)?;
        let index: Arc<dyn TsfIndex> = accessor.index();
        let tombstoner = Tombstoner::new(accessor.path());

        let reader = TsfReader {
            index,
            inner: RwLock::new(ReaderInner {
                accessor,
                tombstoner,
                size,
                last_modified,
            }),
        };
        reader.apply_tombstones()?;

        debug!(
            path = %reader.path().display(),
            keys = reader.key_count(),
            size,
            "opened tsf file"
        );
        Ok(reader)
    }

    /// Replays the tombstone log into the index. Consecutive records sharing
    /// a time range are applied as one batch; writers emit them grouped that
    /// way.
    fn apply_tombstones(&self) -> Result<()> {
        let tombstones = {
            let inner = self.inner.read();
            inner.tombstoner.read_all()?
        };
        if tombstones.is_empty() {
            return Ok(());
        }

        debug!(records = tombstones.len(), "applying tombstones");

        let mut batch: Vec<&[u8]> = vec![tombstones[0].key.as_slice()];
        for i in 1..tombstones.len() {
            let cur = &tombstones[i];
            let prev = &tombstones[i - 1];
            if prev.min != cur.min || prev.max != cur.max {
                self.index.delete_range(&batch, prev.min, prev.max);
                batch.clear();
            }
            batch.push(cur.key.as_slice());
        }

        let last = &tombstones[tombstones.len() - 1];
        self.index.delete_range(&batch, last.min, last.max);
        Ok(())
    }

    /// The underlying file path.
    pub fn path(&self) -> PathBuf {
        self.inner.read().accessor.path().to_path_buf()
    }

    /// Returns all the values in the block where time `timestamp` resides,
    /// `None` when no block contains it.
    pub fn read(&self, key: &[u8], timestamp: i64) -> Result<Option<Values>> {
        let inner = self.inner.read();
        inner.accessor.read(key, timestamp)
    }

    /// Returns all values for a key in all blocks, tombstones applied.
    pub fn read_all(&self, key: &[u8]) -> Result<Option<Values>> {
        let inner = self.inner.write();
        inner.accessor.read_all(key)
    }

    /// Returns all the values in the block identified by `entry`.
    pub fn read_at(&self, entry: &IndexEntry) -> Result<Values> {
        let inner = self.inner.read();
        inner.accessor.read_block(entry)
    }

    pub fn read_float_block_at(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<FloatValue>,
    ) -> Result<()> {
        let inner = self.inner.read();
        inner.accessor.read_float_block(entry, values)
    }

    pub fn read_integer_block_at(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<IntegerValue>,
    ) -> Result<()> {
        let inner = self.inner.read();
        inner.accessor.read_integer_block(entry, values)
    }

    pub fn read_boolean_block_at(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<BooleanValue>,
    ) -> Result<()> {
        let inner = self.inner.read();
        inner.accessor.read_boolean_block(entry, values)
    }

    pub fn read_string_block_at(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<StringValue>,
    ) -> Result<()> {
        let inner = self.inner.read();
        inner.accessor.read_string_block(entry, values)
    }

    /// Returns the block's stored checksum and a copy of its payload bytes.
    pub(crate) fn read_bytes(&self, entry: &IndexEntry) -> Result<(u32, Vec<u8>)> {
        let inner = self.inner.read();
        inner.accessor.read_bytes(entry)
    }

    /// Records the deletion of the given keys in the tombstone log, then
    /// hides them from the index. The index is left untouched when the log
    /// append fails.
    pub fn delete(&self, keys: &[&[u8]]) -> Result<()> {
        let inner = self.inner.write();
        inner.tombstoner.add(keys)?;
        self.index.delete(keys);
        Ok(())
    }

    /// Records the deletion of values for keys between min and max, then
    /// hides them from the index. The index is left untouched when the log
    /// append fails.
    pub fn delete_range(&self, keys: &[&[u8]], min_time: i64, max_time: i64) -> Result<()> {
        let inner = self.inner.write();
        inner.tombstoner.add_range(keys, min_time, max_time)?;
        self.index.delete_range(keys, min_time, max_time);
        Ok(())
    }

    /// Returns true if the file contains any values for the given key.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains(key)
    }

    /// Returns true if key and time might exist in this file. This function
    /// could return true even though the actual point does not exist.
    pub fn contains_value(&self, key: &[u8], timestamp: i64) -> bool {
        self.index.contains_value(key, timestamp)
    }

    /// Returns the index entries for all blocks of the given key.
    pub fn entries(&self, key: &[u8]) -> Vec<IndexEntry> {
        self.index.entries(key)
    }

    /// Reads the index entries for key into entries.
    pub fn read_entries(&self, key: &[u8], entries: &mut Vec<IndexEntry>) {
        self.index.read_entries(key, entries);
    }

    /// Returns the index entry for the specified key and timestamp.
    pub fn entry(&self, key: &[u8], timestamp: i64) -> Option<IndexEntry> {
        self.index.entry(key, timestamp)
    }

    /// Returns the key and its entries at position idx in the index.
    pub fn key(&self, idx: usize) -> Option<(Vec<u8>, Vec<IndexEntry>)> {
        self.index.key(idx)
    }

    /// Returns the key and key type at position idx in the index.
    pub fn key_at(&self, idx: usize) -> Option<(Vec<u8>, u8)> {
        self.index.key_at(idx)
    }

    /// Returns the block type of the values stored for the key.
    pub fn block_type(&self, key: &[u8]) -> Result<u8> {
        self.index.block_type(key)
    }

    /// Returns the count of unique keys in the file.
    pub fn key_count(&self) -> usize {
        self.index.key_count()
    }

    /// Returns the min and max time across all keys in the file.
    pub fn time_range(&self) -> TimeRange {
        self.index.time_range()
    }

    /// Returns the min and max key across all keys in the file.
    pub fn key_range(&self) -> KeyRange {
        self.index.key_range()
    }

    /// Returns ranges of time that are deleted for the given key.
    pub fn tombstone_range(&self, key: &[u8]) -> Vec<TimeRange> {
        let _inner = self.inner.read();
        self.index.tombstone_range(key)
    }

    /// Returns the size of the index in bytes.
    pub fn index_size(&self) -> u32 {
        self.index.size()
    }

    /// Returns the size of the file on disk in bytes.
    pub fn size(&self) -> u32 {
        self.inner.read().size as u32
    }

    /// Returns the last time the file was modified, unix nanoseconds.
    pub fn last_modified(&self) -> i64 {
        self.inner.read().last_modified
    }

    /// Returns true if there are any tombstone entries recorded.
    pub fn has_tombstones(&self) -> bool {
        self.inner.read().tombstoner.has_tombstones()
    }

    /// Returns any tombstone files associated with this TSF file.
    pub fn tombstone_files(&self) -> Vec<FileStat> {
        self.inner.read().tombstoner.tombstone_files()
    }

    /// Returns summary information about the file.
    pub fn stats(&self) -> FileStat {
        let time_range = self.time_range();
        let key_range = self.key_range();
        FileStat {
            path: self.path().to_string_lossy().into_owned(),
            has_tombstone: self.has_tombstones(),
            size: self.size(),
            last_modified: self.last_modified(),
            min_time: time_range.min,
            max_time: time_range.max,
            min_key: key_range.min,
            max_key: key_range.max,
        }
    }

    /// An iterator over every (key, block) pair in index order.
    pub fn block_iterator(&self) -> BlockIterator<'_> {
        BlockIterator::new(self, self.index.key_count())
    }

    /// Closes the underlying file resources. Subsequent block reads fail
    /// with [`crate::TsfError::Closed`].
    pub fn close(&self) -> Result<()> {
        let inner = self.inner.write();
        debug!(path = %inner.accessor.path().display(), "closing tsf file");
        inner.accessor.close()
    }

    /// Removes the file and its tombstone sidecar from the filesystem. File
    /// removal is best-effort; sidecar removal errors are returned.
    pub fn remove(&self) -> Result<()> {
        let inner = self.inner.write();
        inner.accessor.close()?;

        let path = inner.accessor.path();
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove tsf file");
        }

        inner.tombstoner.delete()
    }
}
