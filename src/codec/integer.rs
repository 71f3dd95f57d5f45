//! Integer decoding. Values are zigzag varints after a one byte encoding
//! header.

use crate::codec::varint::VarInt;
use crate::codec::Decoder;
use crate::error::{Result, TsfError};

/// INTEGER_ZIGZAG_VARINT stores each value as a zigzag varint.
const INTEGER_ZIGZAG_VARINT: u8 = 0;

/// IntegerDecoder decodes an encoded integer value block.
pub struct IntegerDecoder<'a> {
    buf: &'a [u8],
}

impl<'a> IntegerDecoder<'a> {
    pub fn new(b: &'a [u8]) -> Result<Self> {
        match b.first() {
            None => Err(TsfError::Decode("integer block: empty".to_string())),
            Some(&INTEGER_ZIGZAG_VARINT) => Ok(Self { buf: &b[1..] }),
            Some(&enc) => Err(TsfError::Decode(format!(
                "integer block: unknown encoding {enc}"
            ))),
        }
    }
}

impl Decoder for IntegerDecoder<'_> {
    type Item = i64;

    fn try_next(&mut self) -> Result<Option<i64>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let (v, n) = i64::decode_var(self.buf)
            .ok_or_else(|| TsfError::Decode("integer block too short".to_string()))?;
        self.buf = &self.buf[n..];
        Ok(Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::encode_integers;

    #[test]
    fn round_trip() {
        let vals = [0i64, -1, 1, i64::MIN, i64::MAX];
        let b = encode_integers(&vals);
        let mut dec = IntegerDecoder::new(&b).unwrap();
        for &v in &vals {
            assert_eq!(dec.try_next().unwrap(), Some(v));
        }
        assert_eq!(dec.try_next().unwrap(), None);
    }

    #[test]
    fn truncated_varint() {
        let b = [INTEGER_ZIGZAG_VARINT, 0x80];
        let mut dec = IntegerDecoder::new(&b).unwrap();
        assert!(dec.try_next().is_err());
    }
}
