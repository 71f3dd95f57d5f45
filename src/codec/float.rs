//! Float decoding. Values are stored as raw big-endian IEEE-754 bits, 8
//! bytes per value, after a one byte encoding header.

use crate::codec::Decoder;
use crate::error::{Result, TsfError};

/// FLOAT_UNCOMPRESSED stores raw 8 byte IEEE-754 bits per value.
const FLOAT_UNCOMPRESSED: u8 = 0;

/// FloatDecoder decodes an encoded float value block.
pub struct FloatDecoder<'a> {
    buf: &'a [u8],
}

impl<'a> FloatDecoder<'a> {
    pub fn new(b: &'a [u8]) -> Result<Self> {
        match b.first() {
            None => Err(TsfError::Decode("float block: empty".to_string())),
            Some(&FLOAT_UNCOMPRESSED) => Ok(Self { buf: &b[1..] }),
            Some(&enc) => Err(TsfError::Decode(format!(
                "float block: unknown encoding {enc}"
            ))),
        }
    }
}

impl Decoder for FloatDecoder<'_> {
    type Item = f64;

    fn try_next(&mut self) -> Result<Option<f64>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() < 8 {
            return Err(TsfError::Decode("float block too short".to_string()));
        }
        let bits = u64::from_be_bytes(self.buf[..8].try_into().unwrap());
        self.buf = &self.buf[8..];
        Ok(Some(f64::from_bits(bits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::encode_floats;

    #[test]
    fn round_trip() {
        let vals = [0.0f64, -1.5, 3.141592653589793, f64::MAX];
        let b = encode_floats(&vals);
        let mut dec = FloatDecoder::new(&b).unwrap();
        for &v in &vals {
            assert_eq!(dec.try_next().unwrap(), Some(v));
        }
        assert_eq!(dec.try_next().unwrap(), None);
    }

    #[test]
    fn truncated_value() {
        let mut b = encode_floats(&[1.0]);
        b.truncate(5);
        let mut dec = FloatDecoder::new(&b).unwrap();
        assert!(dec.try_next().is_err());
    }

    #[test]
    fn unknown_encoding_rejected() {
        assert!(FloatDecoder::new(&[0x10]).is_err());
    }
}
