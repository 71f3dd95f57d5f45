/// FileStat holds information about a TSF file on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    pub has_tombstone: bool,
    pub size: u32,
    pub last_modified: i64,

    pub min_time: i64,
    pub max_time: i64,

    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
}

impl FileStat {
    /// Returns true if the time range of the file intersects min and max.
    pub fn overlaps_time_range(&self, min: i64, max: i64) -> bool {
        self.min_time <= max && self.max_time >= min
    }

    /// Returns true if the key range of the file intersects min and max.
    pub fn overlaps_key_range(&self, min: &[u8], max: &[u8]) -> bool {
        !min.is_empty()
            && !max.is_empty()
            && self.min_key.as_slice() <= max
            && self.max_key.as_slice() >= min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat() -> FileStat {
        FileStat {
            min_time: 10,
            max_time: 20,
            min_key: b"aaa".to_vec(),
            max_key: b"mmm".to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn time_overlap() {
        let s = stat();
        assert!(s.overlaps_time_range(15, 30));
        assert!(s.overlaps_time_range(20, 20));
        assert!(s.overlaps_time_range(0, 10));
        assert!(!s.overlaps_time_range(21, 30));
        assert!(!s.overlaps_time_range(0, 9));
    }

    #[test]
    fn key_overlap() {
        let s = stat();
        assert!(s.overlaps_key_range(b"bbb", b"ccc"));
        assert!(s.overlaps_key_range(b"mmm", b"zzz"));
        assert!(!s.overlaps_key_range(b"nnn", b"zzz"));
        assert!(!s.overlaps_key_range(b"", b"zzz"));
    }
}
