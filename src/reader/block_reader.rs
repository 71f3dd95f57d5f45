//! Memory-mapped access to the blocks of a TSF file. The whole file is
//! mapped read-only once at open; block reads are slices of the mapping.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};
use parking_lot::RwLock;

use crate::block::decoder::{
    decode_block, decode_boolean_block, decode_float_block, decode_integer_block,
    decode_string_block,
};
use crate::error::{Result, TsfError};
use crate::index::IndexEntry;
use crate::reader::index_reader::{IndirectIndex, TsfIndex};
use crate::value::{BooleanValue, FloatValue, IntegerValue, StringValue, Values};
use crate::{HEADER, MAGIC_NUMBER, VERSION};

/// MmapAccessor provides access and decoding of blocks through a read-only
/// mapping of the file.
#[derive(Debug)]
pub(crate) struct MmapAccessor {
    path: PathBuf,
    index: Arc<IndirectIndex>,

    mu: RwLock<AccessorState>,
}

#[derive(Debug)]
struct AccessorState {
    /// Both are dropped on close. The index holds its own handle to the
    /// mapping, so the bytes stay valid until it is dropped as well; reads
    /// through the accessor fail with `Closed` as soon as `b` is taken.
    f: Option<File>,
    b: Option<Arc<Mmap>>,
}

impl MmapAccessor {
    /// Verifies the file header, maps the file, locates the index region
    /// through the trailing pointer, and builds the indirect index.
    pub(crate) fn init(mut f: File, path: PathBuf) -> Result<Self> {
        Self::verify_version(&mut f)?;

        f.seek(SeekFrom::Start(0))?;

        let b = unsafe { MmapOptions::new().map(&f)? };
        let b = Arc::new(b);

        if b.len() < HEADER.len() + 8 {
            return Err(TsfError::BadFormat(
                "init: byte slice too small for indirect index".to_string(),
            ));
        }

        let index_ofs_pos = b.len() - 8;
        let index_start =
            u64::from_be_bytes(b[index_ofs_pos..].try_into().unwrap()) as usize;
        if index_start > index_ofs_pos {
            return Err(TsfError::BadFormat(format!(
                "init: index start {index_start} beyond end of file"
            )));
        }

        let index = IndirectIndex::unmarshal(b.clone(), index_start, index_ofs_pos)?;

        Ok(Self {
            path,
            index: Arc::new(index),
            mu: RwLock::new(AccessorState {
                f: Some(f),
                b: Some(b),
            }),
        })
    }

    fn verify_version(f: &mut File) -> Result<()> {
        f.seek(SeekFrom::Start(0))
            .map_err(|e| TsfError::BadFormat(format!("init: error reading header: {e}")))?;

        let mut header = [0u8; 5];
        f.read_exact(&mut header)
            .map_err(|e| TsfError::BadFormat(format!("init: error reading header: {e}")))?;

        let magic = u32::from_be_bytes(header[..4].try_into().unwrap());
        if magic != MAGIC_NUMBER {
            return Err(TsfError::BadFormat("can only read from tsf file".to_string()));
        }
        if header[4] != VERSION {
            return Err(TsfError::BadFormat(format!(
                "init: file is version {}. expected {}",
                header[4], VERSION
            )));
        }
        Ok(())
    }

    /// The index built from the mapping at init.
    pub(crate) fn index(&self) -> Arc<IndirectIndex> {
        self.index.clone()
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all the values in the block where time `timestamp` resides,
    /// `None` when no block contains it.
    pub(crate) fn read(&self, key: &[u8], timestamp: i64) -> Result<Option<Values>> {
        let Some(entry) = self.index.entry(key, timestamp) else {
            return Ok(None);
        };
        self.read_block(&entry).map(Some)
    }

    /// Returns all values for a key across all of its blocks, with
    /// tombstoned ranges filtered out. `None` when the key is absent.
    pub(crate) fn read_all(&self, key: &[u8]) -> Result<Option<Values>> {
        let blocks = self.index.entries(key);
        if blocks.is_empty() {
            return Ok(None);
        }

        let tombstones = self.index.tombstone_range(key);

        let state = self.mu.read();
        let b = state.b.as_ref().ok_or(TsfError::Closed)?;

        let mut values: Option<Values> = None;
        for block in &blocks {
            // Skip blocks a single tombstone fully encloses.
            if tombstones
                .iter()
                .any(|t| t.min <= block.min_time && t.max >= block.max_time)
            {
                continue;
            }

            let (sum, payload) = block_slice(b, block)?;
            verify_checksum(sum, payload)?;

            let typ = payload
                .first()
                .copied()
                .ok_or_else(|| TsfError::Decode("empty block payload".to_string()))?;
            let mut temp = Values::with_block_type(typ)?;
            decode_block(payload, &mut temp)?;

            // Filter out any values that were deleted.
            for t in &tombstones {
                temp.exclude(t.min, t.max);
            }

            match values.as_mut() {
                None => values = Some(temp),
                Some(v) => v.append(temp)?,
            }
        }

        Ok(values)
    }

    /// Decodes the block identified by `entry`, validating its checksum.
    pub(crate) fn read_block(&self, entry: &IndexEntry) -> Result<Values> {
        self.with_payload(entry, |payload| {
            let typ = payload
                .first()
                .copied()
                .ok_or_else(|| TsfError::Decode("empty block payload".to_string()))?;
            let mut values = Values::with_block_type(typ)?;
            decode_block(payload, &mut values)?;
            Ok(values)
        })
    }

    pub(crate) fn read_float_block(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<FloatValue>,
    ) -> Result<()> {
        self.with_payload(entry, |payload| decode_float_block(payload, values))
    }

    pub(crate) fn read_integer_block(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<IntegerValue>,
    ) -> Result<()> {
        self.with_payload(entry, |payload| decode_integer_block(payload, values))
    }

    pub(crate) fn read_boolean_block(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<BooleanValue>,
    ) -> Result<()> {
        self.with_payload(entry, |payload| decode_boolean_block(payload, values))
    }

    pub(crate) fn read_string_block(
        &self,
        entry: &IndexEntry,
        values: &mut Vec<StringValue>,
    ) -> Result<()> {
        self.with_payload(entry, |payload| decode_string_block(payload, values))
    }

    /// Returns the block's stored checksum and a copy of its payload, with
    /// no checksum validation.
    pub(crate) fn read_bytes(&self, entry: &IndexEntry) -> Result<(u32, Vec<u8>)> {
        let state = self.mu.read();
        let b = state.b.as_ref().ok_or(TsfError::Closed)?;
        let (sum, payload) = block_slice(b, entry)?;
        Ok((sum, payload.to_vec()))
    }

    /// Releases the mapping handle and the file. Reads after this fail with
    /// `Closed`. Calling close twice is fine.
    pub(crate) fn close(&self) -> Result<()> {
        let mut state = self.mu.write();
        if state.b.is_none() {
            return Ok(());
        }
        state.b = None;
        state.f = None;
        Ok(())
    }

    fn with_payload<R>(
        &self,
        entry: &IndexEntry,
        decode: impl FnOnce(&[u8]) -> Result<R>,
    ) -> Result<R> {
        let state = self.mu.read();
        let b = state.b.as_ref().ok_or(TsfError::Closed)?;
        let (sum, payload) = block_slice(b, entry)?;
        verify_checksum(sum, payload)?;
        decode(payload)
    }
}

/// Splits the entry's byte range out of the mapping into its leading
/// checksum and payload. Ranges falling outside the mapping fail `Closed`.
fn block_slice<'a>(b: &'a Mmap, entry: &IndexEntry) -> Result<(u32, &'a [u8])> {
    if entry.offset < 0 || entry.size < 4 {
        return Err(TsfError::Closed);
    }
    let offset = entry.offset as usize;
    let size = entry.size as usize;
    if offset + size > b.len() {
        return Err(TsfError::Closed);
    }

    let sum = u32::from_be_bytes(b[offset..offset + 4].try_into().unwrap());
    Ok((sum, &b[offset + 4..offset + size]))
}

fn verify_checksum(expected: u32, payload: &[u8]) -> Result<()> {
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(TsfError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
