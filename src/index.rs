//! Fixed-layout records of the index region: per-key headers and the 28
//! byte entries locating each block.

use bytes::BufMut;

use crate::error::{Result, TsfError};
use crate::{INDEX_COUNT_SIZE, INDEX_ENTRY_SIZE, INDEX_TYPE_SIZE};


/// IndexEntry is the index information for a given block in a TSF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// The min and max time of all points stored in the block.
    pub min_time: i64,
    pub max_time: i64,

    /// The absolute position in the file where this block is located. The
    /// block starts with its 4 byte checksum.
    pub offset: i64,

    /// The size in bytes of the block in the file, checksum included.
    pub size: u32,
}

impl IndexEntry {
    pub fn new(min_time: i64, max_time: i64, offset: i64, size: u32) -> Self {
        Self {
            min_time,
            max_time,
            offset,
            size,
        }
    }

    /// Decodes an IndexEntry from a byte slice.
    pub fn unmarshal_binary(b: &[u8]) -> Result<Self> {
        if b.len() < INDEX_ENTRY_SIZE {
            return Err(TsfError::BadFormat(format!(
                "unmarshal_binary: short buf: {} < {}",
                b.len(),
                INDEX_ENTRY_SIZE
            )));
        }

        let min_time = i64::from_be_bytes(b[..8].try_into().unwrap());
        let max_time = i64::from_be_bytes(b[8..16].try_into().unwrap());
        let offset = i64::from_be_bytes(b[16..24].try_into().unwrap());
        let size = u32::from_be_bytes(b[24..28].try_into().unwrap());

        Ok(Self {
            min_time,
            max_time,
            offset,
            size,
        })
    }

    /// Writes the binary-encoded entry to `b`.
    pub fn append_to(&self, b: &mut Vec<u8>) {
        b.put_i64(self.min_time);
        b.put_i64(self.max_time);
        b.put_i64(self.offset);
        b.put_u32(self.size);
    }

    /// Returns true if this entry may contain values for the given time.
    /// The min and max times are inclusive.
    pub fn contains(&self, t: i64) -> bool {
        self.min_time <= t && self.max_time >= t
    }
}

/// Reads a key record (`u16 BE length | key bytes`) from the front of `b`,
/// returning the bytes consumed and the key.
pub(crate) fn read_key(b: &[u8]) -> Result<(usize, &[u8])> {
    if b.len() < 2 {
        return Err(TsfError::BadFormat("read_key: truncated key length".to_string()));
    }
    let size = u16::from_be_bytes(b[..2].try_into().unwrap()) as usize;
    if b.len() < 2 + size {
        return Err(TsfError::BadFormat("read_key: truncated key".to_string()));
    }
    Ok((2 + size, &b[2..2 + size]))
}

/// Reads the block type, entry count, and entries that follow a key record,
/// returning the bytes consumed, the block type, and the entries.
pub(crate) fn read_entries(b: &[u8]) -> Result<(usize, u8, Vec<IndexEntry>)> {
    if b.len() < INDEX_TYPE_SIZE + INDEX_COUNT_SIZE {
        return Err(TsfError::BadFormat(
            "read_entries: truncated entry header".to_string(),
        ));
    }

    let typ = b[0];
    let count = u16::from_be_bytes(b[1..3].try_into().unwrap()) as usize;

    let mut n = INDEX_TYPE_SIZE + INDEX_COUNT_SIZE;
    if b.len() < n + count * INDEX_ENTRY_SIZE {
        return Err(TsfError::BadFormat(
            "read_entries: truncated index entries".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(IndexEntry::unmarshal_binary(&b[n..n + INDEX_ENTRY_SIZE])?);
        n += INDEX_ENTRY_SIZE;
    }
    Ok((n, typ, entries))
}
