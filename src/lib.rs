//! Read path for immutable time-series files (TSF).
//!
//! A TSF packs, for many series keys, an ordered run of compressed value
//! blocks together with an index locating them:
//!
//! ```text
//! ┌────────────┬─────────────────────────┬──────────────┬────────────────┐
//! │   Header   │         Blocks          │    Index     │ IndexStart u64 │
//! │ 5 bytes    │ checksum(4B) ∥ payload… │ per-key runs │ big-endian     │
//! └────────────┴─────────────────────────┴──────────────┴────────────────┘
//! ```
//!
//! The index region is a concatenation of per-key records, keys strictly
//! ascending by bytes:
//!
//! ```text
//! key_len: u16 BE │ key │ block_type: u8 │ entry_count: u16 BE │ entries…
//! ```
//!
//! with each entry 28 bytes: `min_time ∥ max_time ∥ offset ∥ size`, all
//! big-endian.
//!
//! [`TsfReader`] maps a file once and serves random reads by key and time
//! straight from the mapping. Deletions never rewrite the file: they are
//! appended to a tombstone sidecar and overlaid on the in-memory index, so
//! deleted data simply stops being visible.

pub mod block;
pub mod codec;
pub mod error;
pub mod index;
pub mod reader;
pub mod stat;
pub mod tombstone;
pub mod value;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{Result, TsfError};
pub use index::IndexEntry;
pub use reader::block_iterator::BlockIterator;
pub use reader::index_reader::{IndirectIndex, TsfIndex};
pub use reader::tsf_reader::TsfReader;
pub use stat::FileStat;
pub use tombstone::{Tombstone, Tombstoner};
pub use value::{
    BooleanValue, FieldType, FloatValue, IntegerValue, StringValue, TValues, Value, Values,
};

/// MAGIC_NUMBER is written as the first 4 bytes of a data file to identify
/// it as a tsf formatted file.
pub const MAGIC_NUMBER: u32 = 0x5453_4621;

/// VERSION indicates the version of the TSF file format.
pub const VERSION: u8 = 1;

/// File header: | magic number (4B) | version (1B) |
pub const HEADER: [u8; 5] = [0x54, 0x53, 0x46, 0x21, 1];

/// Size in bytes of an index entry.
pub const INDEX_ENTRY_SIZE: usize = 28;

/// Size in bytes used to store the count of index entries for a key.
pub const INDEX_COUNT_SIZE: usize = 2;

/// Size in bytes used to store the type of block encoded.
pub const INDEX_TYPE_SIZE: usize = 1;

/// Max number of blocks a single key can have in one file.
pub const MAX_INDEX_ENTRIES: usize = (1 << (INDEX_COUNT_SIZE * 8)) - 1;

/// Max length of a key in an index entry.
pub const MAX_KEY_LENGTH: usize = (1 << (2 * 8)) - 1;

/// TimeRange holds a min and max timestamp, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub min: i64,
    pub max: i64,
}

impl TimeRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Returns true if `t` falls within the range.
    pub fn contains(&self, t: i64) -> bool {
        self.min <= t && self.max >= t
    }
}

/// KeyRange holds a min and max series key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub min: Vec<u8>,
    pub max: Vec<u8>,
}
