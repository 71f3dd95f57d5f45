//! Timestamp decoding. Timestamps within a block are sorted ascending, so
//! they are stored delta-encoded: a zigzag varint start value followed by
//! unsigned varint deltas. The block carries its value count up front so a
//! reader can size output buffers without decoding.
//!
//! Layout: `header(1) | count varint | t0 zigzag varint | deltas varint...`

use crate::codec::varint::VarInt;
use crate::codec::Decoder;
use crate::error::{Result, TsfError};

/// TIME_DELTA_VARINT is a delta format using variable-length encoding.
const TIME_DELTA_VARINT: u8 = 0;

/// Returns the number of timestamps in an encoded timestamp block without
/// decoding them.
pub fn count_timestamps(b: &[u8]) -> Result<usize> {
    let (count, _) = header(b)?;
    Ok(count)
}

fn header(b: &[u8]) -> Result<(usize, usize)> {
    match b.first() {
        None => return Err(TsfError::Decode("timestamp block: empty".to_string())),
        Some(&TIME_DELTA_VARINT) => {}
        Some(&enc) => {
            return Err(TsfError::Decode(format!(
                "timestamp block: unknown encoding {enc}"
            )))
        }
    }
    let (count, n) = u64::decode_var(&b[1..])
        .ok_or_else(|| TsfError::Decode("timestamp block: invalid count".to_string()))?;
    Ok((count as usize, 1 + n))
}

/// TimeDecoder decodes an encoded timestamp block.
pub struct TimeDecoder<'a> {
    buf: &'a [u8],
    remaining: usize,
    prev: i64,
    first: bool,
}

impl<'a> TimeDecoder<'a> {
    pub fn new(b: &'a [u8]) -> Result<Self> {
        let (count, n) = header(b)?;
        Ok(Self {
            buf: &b[n..],
            remaining: count,
            prev: 0,
            first: true,
        })
    }
}

impl Decoder for TimeDecoder<'_> {
    type Item = i64;

    fn try_next(&mut self) -> Result<Option<i64>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        if self.first {
            let (t, n) = i64::decode_var(self.buf)
                .ok_or_else(|| TsfError::Decode("timestamp block too short".to_string()))?;
            self.prev = t;
            self.buf = &self.buf[n..];
            self.first = false;
        } else {
            let (delta, n) = u64::decode_var(self.buf)
                .ok_or_else(|| TsfError::Decode("timestamp block too short".to_string()))?;
            self.prev = self
                .prev
                .checked_add(delta as i64)
                .ok_or_else(|| TsfError::Decode("timestamp delta overflow".to_string()))?;
            self.buf = &self.buf[n..];
        }

        self.remaining -= 1;
        Ok(Some(self.prev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::encode_timestamps;

    fn decode_all(b: &[u8]) -> Vec<i64> {
        let mut dec = TimeDecoder::new(b).unwrap();
        let mut out = Vec::new();
        while let Some(t) = dec.try_next().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn round_trip() {
        let ts = [-5i64, 0, 1, 100, 1_000_000_000];
        let b = encode_timestamps(&ts);
        assert_eq!(count_timestamps(&b).unwrap(), 5);
        assert_eq!(decode_all(&b), ts);
    }

    #[test]
    fn single_timestamp() {
        let b = encode_timestamps(&[42]);
        assert_eq!(decode_all(&b), vec![42]);
    }

    #[test]
    fn empty_block_rejected() {
        assert!(count_timestamps(&[]).is_err());
    }

    #[test]
    fn unknown_encoding_rejected() {
        assert!(TimeDecoder::new(&[0x7f, 1]).is_err());
    }

    #[test]
    fn truncated_deltas() {
        let mut b = encode_timestamps(&[1, 2, 3]);
        b.truncate(b.len() - 1);
        let mut dec = TimeDecoder::new(&b).unwrap();
        assert!(dec.try_next().unwrap().is_some());
        assert!(dec.try_next().unwrap().is_some());
        assert!(dec.try_next().is_err());
    }
}
