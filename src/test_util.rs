//! Test fixtures: block payload encoders and a whole-file builder. The
//! crate only reads TSF files, so the tests assemble them byte by byte.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::BufMut;
use memmap2::{Mmap, MmapOptions};

use crate::block::{BLOCK_BOOLEAN, BLOCK_FLOAT64, BLOCK_INTEGER, BLOCK_STRING};
use crate::codec::varint::VarInt;
use crate::index::IndexEntry;
use crate::HEADER;

/// Encodes a timestamp sub-block: header, varint count, zigzag varint start,
/// varint deltas.
pub(crate) fn encode_timestamps(ts: &[i64]) -> Vec<u8> {
    let mut b = vec![0u8];
    (ts.len() as u64).encode_var(&mut b);
    if let Some((&first, rest)) = ts.split_first() {
        first.encode_var(&mut b);
        let mut prev = first;
        for &t in rest {
            assert!(t > prev, "timestamps must be sorted ascending");
            ((t - prev) as u64).encode_var(&mut b);
            prev = t;
        }
    }
    b
}

/// Encodes a float sub-block: header, raw 8 byte big-endian bits per value.
pub(crate) fn encode_floats(vals: &[f64]) -> Vec<u8> {
    let mut b = vec![0u8];
    for &v in vals {
        b.put_u64(v.to_bits());
    }
    b
}

/// Encodes an integer sub-block: header, zigzag varint per value.
pub(crate) fn encode_integers(vals: &[i64]) -> Vec<u8> {
    let mut b = vec![0u8];
    for &v in vals {
        v.encode_var(&mut b);
    }
    b
}

/// Encodes a boolean sub-block: header, varint count, LSB-first packed bits.
pub(crate) fn encode_booleans(vals: &[bool]) -> Vec<u8> {
    let mut b = vec![0u8];
    (vals.len() as u64).encode_var(&mut b);
    let mut bits = vec![0u8; vals.len().div_ceil(8)];
    for (i, &v) in vals.iter().enumerate() {
        if v {
            bits[i / 8] |= 1 << (i % 8);
        }
    }
    b.extend_from_slice(&bits);
    b
}

/// Encodes a string sub-block: header, varint length-prefixed values.
pub(crate) fn encode_strings(vals: &[Vec<u8>]) -> Vec<u8> {
    let mut b = vec![0u8];
    for v in vals {
        (v.len() as u64).encode_var(&mut b);
        b.extend_from_slice(v);
    }
    b
}

/// Frames a block payload: type byte, varint timestamp length, timestamp
/// bytes, value bytes.
pub(crate) fn pack_block_payload(typ: u8, ts: &[u8], values: &[u8]) -> Vec<u8> {
    let mut b = vec![typ];
    (ts.len() as u64).encode_var(&mut b);
    b.extend_from_slice(ts);
    b.extend_from_slice(values);
    b
}

pub(crate) fn float_block_payload(points: &[(i64, f64)]) -> Vec<u8> {
    let ts: Vec<i64> = points.iter().map(|p| p.0).collect();
    let vs: Vec<f64> = points.iter().map(|p| p.1).collect();
    pack_block_payload(BLOCK_FLOAT64, &encode_timestamps(&ts), &encode_floats(&vs))
}

pub(crate) fn integer_block_payload(points: &[(i64, i64)]) -> Vec<u8> {
    let ts: Vec<i64> = points.iter().map(|p| p.0).collect();
    let vs: Vec<i64> = points.iter().map(|p| p.1).collect();
    pack_block_payload(BLOCK_INTEGER, &encode_timestamps(&ts), &encode_integers(&vs))
}

pub(crate) fn boolean_block_payload(points: &[(i64, bool)]) -> Vec<u8> {
    let ts: Vec<i64> = points.iter().map(|p| p.0).collect();
    let vs: Vec<bool> = points.iter().map(|p| p.1).collect();
    pack_block_payload(BLOCK_BOOLEAN, &encode_timestamps(&ts), &encode_booleans(&vs))
}

pub(crate) fn string_block_payload(points: &[(i64, Vec<u8>)]) -> Vec<u8> {
    let ts: Vec<i64> = points.iter().map(|p| p.0).collect();
    let vs: Vec<Vec<u8>> = points.iter().map(|p| p.1.clone()).collect();
    pack_block_payload(BLOCK_STRING, &encode_timestamps(&ts), &encode_strings(&vs))
}

/// One key's index record for [`index_image`].
pub(crate) struct KeyEntries {
    pub key: Vec<u8>,
    pub typ: u8,
    pub entries: Vec<IndexEntry>,
}

/// Serialises per-key index records the way they appear in the file's index
/// region. Callers pass keys in ascending order.
pub(crate) fn index_image(keys: &[KeyEntries]) -> Vec<u8> {
    let mut b = Vec::new();
    for k in keys {
        b.put_u16(k.key.len() as u16);
        b.put_slice(&k.key);
        b.put_u8(k.typ);
        b.put_u16(k.entries.len() as u16);
        for e in &k.entries {
            e.append_to(&mut b);
        }
    }
    b
}

/// Maps a byte slice through an anonymous temp file, returning the mapping
/// and its length.
pub(crate) fn mmap_bytes(data: &[u8]) -> (Arc<Mmap>, usize) {
    let mut f = tempfile::tempfile().unwrap();
    std::io::Write::write_all(&mut f, data).unwrap();
    f.sync_all().unwrap();
    let mmap = unsafe { MmapOptions::new().map(&f).unwrap() };
    (Arc::new(mmap), data.len())
}

struct PendingBlock {
    typ: u8,
    min_time: i64,
    max_time: i64,
    payload: Vec<u8>,
}

/// Assembles a complete TSF file: header, checksummed blocks, index region,
/// and the trailing index-start pointer.
pub(crate) struct FileBuilder {
    series: BTreeMap<Vec<u8>, Vec<PendingBlock>>,
}

impl FileBuilder {
    pub(crate) fn new() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }

    pub(crate) fn add_float_block(&mut self, key: &[u8], points: &[(i64, f64)]) -> &mut Self {
        self.add_block(key, BLOCK_FLOAT64, points_times(points), float_block_payload(points))
    }

    pub(crate) fn add_integer_block(&mut self, key: &[u8], points: &[(i64, i64)]) -> &mut Self {
        self.add_block(key, BLOCK_INTEGER, points_times(points), integer_block_payload(points))
    }

    pub(crate) fn add_boolean_block(&mut self, key: &[u8], points: &[(i64, bool)]) -> &mut Self {
        self.add_block(key, BLOCK_BOOLEAN, points_times(points), boolean_block_payload(points))
    }

    pub(crate) fn add_string_block(&mut self, key: &[u8], points: &[(i64, Vec<u8>)]) -> &mut Self {
        let payload = string_block_payload(points);
        self.add_block(key, BLOCK_STRING, points_times(points), payload)
    }

    fn add_block(
        &mut self,
        key: &[u8],
        typ: u8,
        (min_time, max_time): (i64, i64),
        payload: Vec<u8>,
    ) -> &mut Self {
        self.series.entry(key.to_vec()).or_default().push(PendingBlock {
            typ,
            min_time,
            max_time,
            payload,
        });
        self
    }

    /// Serialises the file.
    pub(crate) fn build(&self) -> Vec<u8> {
        let mut b = HEADER.to_vec();

        // Blocks region, keys ascending, blocks in insertion order.
        let mut index = Vec::new();
        for (key, blocks) in &self.series {
            index.put_u16(key.len() as u16);
            index.put_slice(key);
            index.put_u8(blocks[0].typ);
            index.put_u16(blocks.len() as u16);
            for block in blocks {
                let offset = b.len() as i64;
                b.put_u32(crc32fast::hash(&block.payload));
                b.extend_from_slice(&block.payload);
                let size = (4 + block.payload.len()) as u32;
                IndexEntry::new(block.min_time, block.max_time, offset, size).append_to(&mut index);
            }
        }

        let index_start = b.len() as u64;
        b.extend_from_slice(&index);
        b.put_u64(index_start);
        b
    }

    pub(crate) fn write(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.build())
    }
}

fn points_times<T>(points: &[(i64, T)]) -> (i64, i64) {
    assert!(!points.is_empty(), "a block must hold at least one point");
    (points[0].0, points[points.len() - 1].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_file_has_expected_frame() {
        let mut builder = FileBuilder::new();
        builder.add_float_block(b"k", &[(1, 1.0)]);
        let data = builder.build();

        assert_eq!(&data[..5], &HEADER);
        let index_start =
            u64::from_be_bytes(data[data.len() - 8..].try_into().unwrap()) as usize;
        assert!(index_start > HEADER.len());
        assert!(index_start < data.len() - 8);

        // One key record: 2 + 1 key byte + type + count + one entry.
        assert_eq!(data.len() - 8 - index_start, 2 + 1 + 1 + 2 + 28);
    }
}
