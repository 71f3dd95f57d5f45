//! Iteration over each block in a TSF file in order, with raw access to the
//! block bytes and no decoding.

use crate::error::Result;
use crate::index::IndexEntry;
use crate::reader::tsf_reader::TsfReader;

/// BlockIterator walks every (key, block) pair in index order: keys
/// ascending, and within a key, blocks ascending by min time.
pub struct BlockIterator<'a> {
    r: &'a TsfReader,

    /// Position of the next key to load.
    i: usize,

    /// Total number of keys.
    n: usize,

    key: Vec<u8>,
    entries: Vec<IndexEntry>,
}

impl<'a> BlockIterator<'a> {
    pub(crate) fn new(r: &'a TsfReader, n: usize) -> Self {
        Self {
            r,
            i: 0,
            n,
            key: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Advances to the next block, returning false once every block has been
    /// visited.
    pub fn next(&mut self) -> bool {
        if self.n - self.i == 0 && self.entries.is_empty() {
            return false;
        }

        if !self.entries.is_empty() {
            self.entries.remove(0);
            if !self.entries.is_empty() {
                return true;
            }
        }

        if self.n - self.i > 0 {
            match self.r.key(self.i) {
                Some((key, entries)) => {
                    self.key = key;
                    self.entries = entries;
                }
                None => {
                    self.key.clear();
                    self.entries.clear();
                }
            }
            self.i += 1;

            if !self.entries.is_empty() {
                return true;
            }
        }

        false
    }

    /// The key the next call to `next` will land on: the current key while
    /// more of its blocks remain, otherwise the following key in the index.
    /// Empty once the file is exhausted.
    pub fn peek_next(&self) -> Vec<u8> {
        if self.entries.len() > 1 {
            return self.key.clone();
        }
        if self.i < self.n {
            if let Some((key, _)) = self.r.key_at(self.i) {
                return key;
            }
        }
        Vec::new()
    }

    /// Reads the current block without consuming it, returning the key, the
    /// block's time bounds, its stored checksum, and its raw payload bytes.
    ///
    /// Panics if `next` has not returned true.
    pub fn read(&self) -> Result<(Vec<u8>, i64, i64, u32, Vec<u8>)> {
        let entry = &self.entries[0];
        let (checksum, buf) = self.r.read_bytes(entry)?;
        Ok((self.key.clone(), entry.min_time, entry.max_time, checksum, buf))
    }
}
