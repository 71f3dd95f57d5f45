//! Boolean decoding. Values are bit-packed LSB-first after a one byte
//! encoding header and a varint value count.

use crate::codec::varint::VarInt;
use crate::codec::Decoder;
use crate::error::{Result, TsfError};

/// BOOLEAN_BITPACKED stores 8 values per byte, LSB-first.
const BOOLEAN_BITPACKED: u8 = 0;

/// BooleanDecoder decodes an encoded boolean value block.
pub struct BooleanDecoder<'a> {
    bits: &'a [u8],
    count: usize,
    i: usize,
}

impl<'a> BooleanDecoder<'a> {
    pub fn new(b: &'a [u8]) -> Result<Self> {
        match b.first() {
            None => return Err(TsfError::Decode("boolean block: empty".to_string())),
            Some(&BOOLEAN_BITPACKED) => {}
            Some(&enc) => {
                return Err(TsfError::Decode(format!(
                    "boolean block: unknown encoding {enc}"
                )))
            }
        }
        let (count, n) = u64::decode_var(&b[1..])
            .ok_or_else(|| TsfError::Decode("boolean block: invalid count".to_string()))?;
        Ok(Self {
            bits: &b[1 + n..],
            count: count as usize,
            i: 0,
        })
    }
}

impl Decoder for BooleanDecoder<'_> {
    type Item = bool;

    fn try_next(&mut self) -> Result<Option<bool>> {
        if self.i >= self.count {
            return Ok(None);
        }
        let byte = self.i / 8;
        if byte >= self.bits.len() {
            return Err(TsfError::Decode("boolean block too short".to_string()));
        }
        let v = (self.bits[byte] >> (self.i % 8)) & 1 == 1;
        self.i += 1;
        Ok(Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::encode_booleans;

    #[test]
    fn round_trip() {
        let vals = [true, false, true, true, false, false, true, false, true];
        let b = encode_booleans(&vals);
        let mut dec = BooleanDecoder::new(&b).unwrap();
        for &v in &vals {
            assert_eq!(dec.try_next().unwrap(), Some(v));
        }
        assert_eq!(dec.try_next().unwrap(), None);
    }

    #[test]
    fn truncated_bits() {
        // Claims nine values but carries a single packed byte.
        let b = [BOOLEAN_BITPACKED, 9, 0b0101_0101];
        let mut dec = BooleanDecoder::new(&b).unwrap();
        for _ in 0..8 {
            assert!(dec.try_next().unwrap().is_some());
        }
        assert!(dec.try_next().is_err());
    }
}
