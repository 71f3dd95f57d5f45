//! Tombstone sidecar log. Deletions against an immutable TSF are recorded
//! next to it in a `.tombstone` file so they survive reopen; the data file
//! itself is never rewritten.
//!
//! Sidecar layout:
//!
//! ```text
//! header: u32 BE version tag
//! record: u16 BE key_len | key | i64 BE min | i64 BE max | u32 BE crc32
//! ```
//!
//! The crc covers the record bytes ahead of it. Records are only ever
//! appended; a full-key deletion is a record with the unbounded time range.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use bytes::BufMut;

use crate::error::{Result, TsfError};
use crate::stat::FileStat;
use crate::MAX_KEY_LENGTH;

const TOMBSTONE_FILE_EXTENSION: &str = "tombstone";

/// Version tag written as the first 4 bytes of a tombstone file.
const V1_HEADER: u32 = 0x54460001;

const HEADER_SIZE: usize = 4;

/// Fixed portion of a record: key length, min, max, crc.
const RECORD_FIXED_SIZE: usize = 2 + 8 + 8 + 4;

/// Tombstone represents an individual deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    /// The tombstoned series key.
    pub key: Vec<u8>,

    /// The min and max unix nanosecond times of `key` that are deleted. A
    /// full-key deletion carries `(i64::MIN, i64::MAX)`.
    pub min: i64,
    pub max: i64,
}

/// Tombstoner records tombstones when entries are deleted.
pub struct Tombstoner {
    /// Location of the sidecar, derived from the TSF file path.
    tombstone_path: PathBuf,
}

impl Tombstoner {
    /// Creates a tombstoner for the TSF file at `tsf_path`.
    pub fn new(tsf_path: impl AsRef<Path>) -> Self {
        Self {
            tombstone_path: Self::tombstone_path(tsf_path.as_ref()),
        }
    }

    fn tombstone_path(tsf_path: &Path) -> PathBuf {
        if tsf_path
            .extension()
            .is_some_and(|ext| ext == TOMBSTONE_FILE_EXTENSION)
        {
            return tsf_path.to_path_buf();
        }
        tsf_path.with_extension(TOMBSTONE_FILE_EXTENSION)
    }

    /// Records the complete deletion of the given keys.
    pub fn add(&self, keys: &[&[u8]]) -> Result<()> {
        self.add_range(keys, i64::MIN, i64::MAX)
    }

    /// Records the deletion of the given keys between min and max.
    pub fn add_range(&self, keys: &[&[u8]], min: i64, max: i64) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for &key in keys {
            if key.len() > MAX_KEY_LENGTH {
                return Err(TsfError::Tombstone(format!(
                    "key exceeds max length: {}",
                    key.len()
                )));
            }
            let start = buf.len();
            buf.put_u16(key.len() as u16);
            buf.put_slice(key);
            buf.put_i64(min);
            buf.put_i64(max);
            let sum = crc32fast::hash(&buf[start..]);
            buf.put_u32(sum);
        }

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.tombstone_path)
            .map_err(|e| TsfError::Tombstone(format!("open: {e}")))?;

        if f.metadata().map_err(|e| TsfError::Tombstone(format!("stat: {e}")))?.len() == 0 {
            f.write_all(&V1_HEADER.to_be_bytes())
                .map_err(|e| TsfError::Tombstone(format!("write header: {e}")))?;
        }
        f.write_all(&buf)
            .map_err(|e| TsfError::Tombstone(format!("append: {e}")))?;
        f.sync_all()
            .map_err(|e| TsfError::Tombstone(format!("sync: {e}")))?;
        Ok(())
    }

    /// Returns all recorded tombstones, oldest first. A missing sidecar
    /// yields an empty list.
    pub fn read_all(&self) -> Result<Vec<Tombstone>> {
        let mut f = match File::open(&self.tombstone_path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TsfError::Tombstone(format!("open: {e}"))),
        };

        let mut b = Vec::new();
        f.read_to_end(&mut b)
            .map_err(|e| TsfError::Tombstone(format!("read: {e}")))?;

        if b.len() < HEADER_SIZE {
            return Err(TsfError::Tombstone("truncated header".to_string()));
        }
        let header = u32::from_be_bytes(b[..4].try_into().unwrap());
        if header != V1_HEADER {
            return Err(TsfError::Tombstone(format!(
                "incompatible version: {header:#010x}"
            )));
        }

        let mut tombstones = Vec::new();
        let mut i = HEADER_SIZE;
        while i < b.len() {
            if b.len() - i < RECORD_FIXED_SIZE {
                return Err(TsfError::Tombstone("truncated record".to_string()));
            }
            let key_len = u16::from_be_bytes(b[i..i + 2].try_into().unwrap()) as usize;
            let end = i + 2 + key_len + 16;
            if b.len() - i < RECORD_FIXED_SIZE + key_len {
                return Err(TsfError::Tombstone("truncated record".to_string()));
            }

            let stored = u32::from_be_bytes(b[end..end + 4].try_into().unwrap());
            let actual = crc32fast::hash(&b[i..end]);
            if stored != actual {
                return Err(TsfError::Tombstone(format!(
                    "corrupt record: checksum {stored:#010x} != {actual:#010x}"
                )));
            }

            let key = b[i + 2..i + 2 + key_len].to_vec();
            let min = i64::from_be_bytes(b[i + 2 + key_len..i + 2 + key_len + 8].try_into().unwrap());
            let max = i64::from_be_bytes(b[i + 2 + key_len + 8..end].try_into().unwrap());
            tombstones.push(Tombstone { key, min, max });
            i = end + 4;
        }

        Ok(tombstones)
    }

    /// Returns true if any tombstone entries have been recorded.
    pub fn has_tombstones(&self) -> bool {
        fs::metadata(&self.tombstone_path)
            .map(|m| m.len() as usize > HEADER_SIZE)
            .unwrap_or(false)
    }

    /// Returns stats for the sidecar file, empty when none exists.
    pub fn tombstone_files(&self) -> Vec<FileStat> {
        let Ok(meta) = fs::metadata(&self.tombstone_path) else {
            return Vec::new();
        };
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        vec![FileStat {
            path: self.tombstone_path.to_string_lossy().into_owned(),
            size: meta.len() as u32,
            last_modified,
            ..Default::default()
        }]
    }

    /// Removes the sidecar file. Succeeds when none exists.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.tombstone_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TsfError::Tombstone(format!("delete: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tombstoner(dir: &Path) -> Tombstoner {
        Tombstoner::new(dir.join("000001.tsf"))
    }

    #[test]
    fn sidecar_path_replaces_extension() {
        let t = Tombstoner::new("/data/000042.tsf");
        assert_eq!(t.tombstone_path, PathBuf::from("/data/000042.tombstone"));

        let t = Tombstoner::new("/data/000042.tombstone");
        assert_eq!(t.tombstone_path, PathBuf::from("/data/000042.tombstone"));
    }

    #[test]
    fn missing_sidecar_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let t = tombstoner(dir.path());
        assert_eq!(t.read_all().unwrap(), Vec::new());
        assert!(!t.has_tombstones());
        assert!(t.tombstone_files().is_empty());
    }

    #[test]
    fn add_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let t = tombstoner(dir.path());

        t.add(&[b"cpu", b"mem"]).unwrap();
        t.add_range(&[b"disk"], 10, 20).unwrap();

        let all = t.read_all().unwrap();
        assert_eq!(
            all,
            vec![
                Tombstone { key: b"cpu".to_vec(), min: i64::MIN, max: i64::MAX },
                Tombstone { key: b"mem".to_vec(), min: i64::MIN, max: i64::MAX },
                Tombstone { key: b"disk".to_vec(), min: 10, max: 20 },
            ]
        );
        assert!(t.has_tombstones());
        assert_eq!(t.tombstone_files().len(), 1);
    }

    #[test]
    fn add_empty_keys_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let t = tombstoner(dir.path());
        t.add(&[]).unwrap();
        assert!(!t.has_tombstones());
        assert!(t.tombstone_files().is_empty());
    }

    #[test]
    fn corrupt_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let t = tombstoner(dir.path());
        t.add_range(&[b"cpu"], 1, 2).unwrap();

        let mut b = fs::read(&t.tombstone_path).unwrap();
        let n = b.len();
        b[n - 6] ^= 0xff; // flip a byte inside the record
        fs::write(&t.tombstone_path, b).unwrap();

        assert!(matches!(t.read_all(), Err(TsfError::Tombstone(_))));
    }

    #[test]
    fn incompatible_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let t = tombstoner(dir.path());
        fs::write(&t.tombstone_path, 0xdead_beef_u32.to_be_bytes()).unwrap();
        assert!(matches!(t.read_all(), Err(TsfError::Tombstone(_))));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let t = tombstoner(dir.path());
        t.add(&[b"cpu"]).unwrap();
        t.delete().unwrap();
        assert!(!t.has_tombstones());
        t.delete().unwrap();
    }
}
