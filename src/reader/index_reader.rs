//! The index section of a TSF file: a directory of every block, its
//! location, size, and time bounds, plus the in-memory overlay of logical
//! deletions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::RwLock;

use crate::error::{Result, TsfError};
use crate::index::{read_entries, read_key, IndexEntry};
use crate::{KeyRange, TimeRange, INDEX_COUNT_SIZE, INDEX_ENTRY_SIZE, INDEX_TYPE_SIZE};

/// TsfIndex is the capability bundle of a TSF file index: it records all
/// blocks, their locations, sizes, and min and max times, and carries the
/// tombstone overlay that hides logically deleted data.
pub trait TsfIndex: Send + Sync {
    /// Removes the given keys from the index.
    fn delete(&self, keys: &[&[u8]]);

    /// Removes the given keys with data between min_time and max_time from
    /// the index.
    fn delete_range(&self, keys: &[&[u8]], min_time: i64, max_time: i64);

    /// Returns true if the given key exists in the index.
    fn contains(&self, key: &[u8]) -> bool;

    /// Returns true if key and time might exist in this file. This function
    /// could return true even though the actual point does not exist. For
    /// example, the key may exist in this file, but not have a point exactly
    /// at time t.
    fn contains_value(&self, key: &[u8], timestamp: i64) -> bool;

    /// Returns all index entries for a key, empty on a miss.
    fn entries(&self, key: &[u8]) -> Vec<IndexEntry>;

    /// Reads the index entries for key into entries.
    fn read_entries(&self, key: &[u8], entries: &mut Vec<IndexEntry>);

    /// Returns the index entry for the specified key and timestamp. If no
    /// entry matches the key and timestamp, `None` is returned.
    fn entry(&self, key: &[u8], timestamp: i64) -> Option<IndexEntry>;

    /// Returns the key and its entries at position idx in the index.
    fn key(&self, idx: usize) -> Option<(Vec<u8>, Vec<IndexEntry>)>;

    /// Returns the key and its block type at position idx in the index.
    fn key_at(&self, idx: usize) -> Option<(Vec<u8>, u8)>;

    /// Returns the count of unique keys in the index.
    fn key_count(&self) -> usize;

    /// Returns the size of the current index in bytes.
    fn size(&self) -> u32;

    /// Returns the min and max time across all keys in the file.
    fn time_range(&self) -> TimeRange;

    /// Returns the min and max keys in the file.
    fn key_range(&self) -> KeyRange;

    /// Returns ranges of time that are deleted for the given key.
    fn tombstone_range(&self, key: &[u8]) -> Vec<TimeRange>;

    /// Returns the block type of the values stored for the key. Fails when
    /// the key does not exist.
    fn block_type(&self, key: &[u8]) -> Result<u8>;
}

/// IndirectIndex is a TsfIndex over the raw byte image of an index. Instead
/// of materialising a record per key, it keeps one array of offsets into the
/// image, one entry per key:
///
/// ```text
/// ┌────────────────────────────────────────────────────────────────────┐
/// │                               Index                                │
/// ├─┬──────────────────────┬──┬───────────────────────┬───┬────────────┘
/// │0│                      │62│                       │145│
/// ├─┴───────┬─────────┬────┼──┴──────┬─────────┬──────┼───┴─────┬──────┐
/// │Key 1 Len│   Key   │... │Key 2 Len│  Key 2  │ ...  │  Key 3  │ ...  │
/// │ 2 bytes │ N bytes │    │ 2 bytes │ N bytes │      │ 2 bytes │      │
/// └─────────┴─────────┴────┴─────────┴─────────┴──────┴─────────┴──────┘
///
/// ┌────────────────────────────────────────────────────────────────────┐
/// │                              Offsets                               │
/// ├────┬────┬────┬─────────────────────────────────────────────────────┘
/// │ 0  │ 62 │145 │
/// └────┴────┴────┘
/// ```
///
/// A lookup binary-searches the offsets, dereferencing each probe into the
/// image to compare key bytes. Within a key the entry list is scanned
/// linearly: entries are 28 contiguous bytes each and per-key counts are
/// expected to stay below a hundred.
#[derive(Debug)]
pub struct IndirectIndex {
    mu: RwLock<IndexData>,
}

#[derive(Debug)]
struct IndexData {
    /// The mapped file. The index image is `b[start..end]`; keeping the
    /// whole mapping behind an Arc pins it for as long as the index lives.
    b: Arc<Mmap>,
    start: usize,
    end: usize,

    /// Byte position in the image of each key's length field, sorted the
    /// same way the image is.
    offsets: Vec<i32>,

    /// Min and max keys, lexicographically by bytes.
    min_key: Vec<u8>,
    max_key: Vec<u8>,

    /// Min and max times contained in the file across all keys.
    min_time: i64,
    max_time: i64,

    /// Keys with a subset of their time values deleted. An entry exists
    /// here only while the file still holds points the deletion covers.
    tombstones: HashMap<Vec<u8>, Vec<TimeRange>>,
}

impl IndexData {
    fn image(&self) -> &[u8] {
        &self.b[self.start..self.end]
    }

    /// Returns the image offset of `key`, or the image length when the key
    /// is not present.
    fn search(&self, key: &[u8]) -> usize {
        let b = self.image();

        let i = self.offsets.partition_point(|&ofs| {
            let ofs = ofs as usize;
            let key_len = u16::from_be_bytes(b[ofs..ofs + 2].try_into().unwrap()) as usize;
            &b[ofs + 2..ofs + 2 + key_len] < key
        });

        if i < self.offsets.len() {
            let ofs = self.offsets[i] as usize;
            let (_, k) = read_key(&b[ofs..]).expect("error reading key from validated index");
            if k != key {
                return b.len();
            }
            return ofs;
        }

        b.len()
    }

    fn entries(&self, key: &[u8]) -> Vec<IndexEntry> {
        let b = self.image();

        let ofs = self.search(key);
        if ofs < b.len() {
            let (n, _) = read_key(&b[ofs..]).expect("error reading key from validated index");
            let (_, _, entries) =
                read_entries(&b[ofs + n..]).expect("error reading entries from validated index");
            return entries;
        }

        Vec::new()
    }
}

impl IndirectIndex {
    /// Builds an index from the image `b[start..end]` in one left to right
    /// scan, recording each key's offset and the aggregate time bounds.
    pub(crate) fn unmarshal(b: Arc<Mmap>, start: usize, end: usize) -> Result<Self> {
        let img = &b[start..end];
        if img.len() > i32::MAX as usize {
            return Err(TsfError::BadFormat("index image too large".to_string()));
        }

        let mut offsets = Vec::new();
        let mut min_time = i64::MAX;
        let mut max_time = i64::MIN;

        let mut i: usize = 0;
        while i < img.len() {
            offsets.push(i as i32);

            // Skip to the start of the entries:
            // key length field (2) + key + type (1).
            if img.len() - i < 2 {
                return Err(TsfError::BadFormat("unmarshal: truncated key".to_string()));
            }
            let key_len = u16::from_be_bytes(img[i..i + 2].try_into().unwrap()) as usize;
            i += 2 + key_len + INDEX_TYPE_SIZE;

            if img.len() < i + INDEX_COUNT_SIZE {
                return Err(TsfError::BadFormat(
                    "unmarshal: truncated entry count".to_string(),
                ));
            }
            let count = u16::from_be_bytes(img[i..i + 2].try_into().unwrap()) as usize;
            i += INDEX_COUNT_SIZE;

            if count == 0 {
                return Err(TsfError::BadFormat(
                    "unmarshal: key with zero index entries".to_string(),
                ));
            }
            if img.len() - i < count * INDEX_ENTRY_SIZE {
                return Err(TsfError::BadFormat(
                    "unmarshal: truncated index entries".to_string(),
                ));
            }

            // Min time of the key's first entry.
            let min_t = i64::from_be_bytes(img[i..i + 8].try_into().unwrap());
            if min_t < min_time {
                min_time = min_t;
            }

            i += (count - 1) * INDEX_ENTRY_SIZE;

            // Max time of the key's last entry.
            let max_t = i64::from_be_bytes(img[i + 8..i + 16].try_into().unwrap());
            if max_t > max_time {
                max_time = max_t;
            }

            i += INDEX_ENTRY_SIZE;
        }

        let (min_key, max_key) = match (offsets.first(), offsets.last()) {
            (Some(&first), Some(&last)) => {
                let (_, min) = read_key(&img[first as usize..])?;
                let (_, max) = read_key(&img[last as usize..])?;
                (min.to_vec(), max.to_vec())
            }
            _ => (Vec::new(), Vec::new()),
        };

        Ok(Self {
            mu: RwLock::new(IndexData {
                b,
                start,
                end,
                offsets,
                min_key,
                max_key,
                min_time,
                max_time,
                tombstones: HashMap::new(),
            }),
        })
    }
}

impl TsfIndex for IndirectIndex {
    fn delete(&self, keys: &[&[u8]]) {
        if keys.is_empty() {
            return;
        }

        let mut d = self.mu.write();

        let lookup: HashSet<&[u8]> = keys.iter().copied().collect();

        let retained: Vec<i32> = d
            .offsets
            .iter()
            .copied()
            .filter(|&ofs| {
                let img = d.image();
                let (_, key) =
                    read_key(&img[ofs as usize..]).expect("error reading key from validated index");
                !lookup.contains(key)
            })
            .collect();
        d.offsets = retained;
    }

    fn delete_range(&self, keys: &[&[u8]], min_time: i64, max_time: i64) {
        if keys.is_empty() {
            return;
        }

        // An unbounded range removes the keys outright.
        if min_time == i64::MIN && max_time == i64::MAX {
            self.delete(keys);
            return;
        }

        // Is the range passed in outside the time range for the file?
        {
            let d = self.mu.read();
            if min_time > d.max_time || max_time < d.min_time {
                return;
            }
        }

        let mut tombstones: HashMap<Vec<u8>, Vec<TimeRange>> = HashMap::new();
        for &k in keys {
            let entries = self.entries(k);
            if entries.is_empty() {
                continue;
            }

            // Is the range passed in outside the time range for this key?
            let min = entries[0].min_time;
            let max = entries[entries.len() - 1].max_time;
            if min_time > max || max_time < min {
                continue;
            }

            // Does the range passed in cover every value for the key?
            if min_time <= min && max_time >= max {
                self.delete(&[k]);
                continue;
            }

            tombstones
                .entry(k.to_vec())
                .or_default()
                .push(TimeRange::new(min_time, max_time));
        }

        if tombstones.is_empty() {
            return;
        }

        let mut d = self.mu.write();
        for (k, v) in tombstones {
            d.tombstones.entry(k).or_default().extend(v);
        }
    }

    fn contains(&self, key: &[u8]) -> bool {
        !self.entries(key).is_empty()
    }

    fn contains_value(&self, key: &[u8], timestamp: i64) -> bool {
        if self.entry(key, timestamp).is_none() {
            return false;
        }

        let d = self.mu.read();
        if let Some(ranges) = d.tombstones.get(key) {
            if ranges.iter().any(|t| t.contains(timestamp)) {
                return false;
            }
        }
        true
    }

    fn entries(&self, key: &[u8]) -> Vec<IndexEntry> {
        self.mu.read().entries(key)
    }

    fn read_entries(&self, key: &[u8], entries: &mut Vec<IndexEntry>) {
        *entries = self.entries(key);
    }

    fn entry(&self, key: &[u8], timestamp: i64) -> Option<IndexEntry> {
        self.entries(key).into_iter().find(|e| e.contains(timestamp))
    }

    fn key(&self, idx: usize) -> Option<(Vec<u8>, Vec<IndexEntry>)> {
        let d = self.mu.read();
        let &ofs = d.offsets.get(idx)?;
        let b = d.image();

        let (n, key) = read_key(&b[ofs as usize..]).expect("error reading key from validated index");
        let (_, _, entries) = read_entries(&b[ofs as usize + n..])
            .expect("error reading entries from validated index");
        Some((key.to_vec(), entries))
    }

    fn key_at(&self, idx: usize) -> Option<(Vec<u8>, u8)> {
        let d = self.mu.read();
        let &ofs = d.offsets.get(idx)?;
        let b = d.image();

        let (n, key) = read_key(&b[ofs as usize..]).expect("error reading key from validated index");
        Some((key.to_vec(), b[ofs as usize + n]))
    }

    fn key_count(&self) -> usize {
        self.mu.read().offsets.len()
    }

    fn size(&self) -> u32 {
        let d = self.mu.read();
        (d.end - d.start) as u32
    }

    fn time_range(&self) -> TimeRange {
        let d = self.mu.read();
        TimeRange::new(d.min_time, d.max_time)
    }

    fn key_range(&self) -> KeyRange {
        let d = self.mu.read();
        KeyRange {
            min: d.min_key.clone(),
            max: d.max_key.clone(),
        }
    }

    fn tombstone_range(&self, key: &[u8]) -> Vec<TimeRange> {
        let d = self.mu.read();
        d.tombstones.get(key).cloned().unwrap_or_default()
    }

    fn block_type(&self, key: &[u8]) -> Result<u8> {
        let d = self.mu.read();
        let b = d.image();

        let ofs = d.search(key);
        if ofs < b.len() {
            let (n, _) = read_key(&b[ofs..]).expect("error reading key from validated index");
            return Ok(b[ofs + n]);
        }
        Err(TsfError::KeyNotFound(
            String::from_utf8_lossy(key).into_owned(),
        ))
    }
}
