//! String decoding. Each value is appended length-prefixed with a varint,
//! after a one byte encoding header.

use crate::codec::varint::VarInt;
use crate::codec::Decoder;
use crate::error::{Result, TsfError};

/// STRING_UNCOMPRESSED stores varint length-prefixed byte strings.
const STRING_UNCOMPRESSED: u8 = 0;

/// StringDecoder decodes an encoded string value block.
pub struct StringDecoder<'a> {
    buf: &'a [u8],
}

impl<'a> StringDecoder<'a> {
    pub fn new(b: &'a [u8]) -> Result<Self> {
        match b.first() {
            None => Err(TsfError::Decode("string block: empty".to_string())),
            Some(&STRING_UNCOMPRESSED) => Ok(Self { buf: &b[1..] }),
            Some(&enc) => Err(TsfError::Decode(format!(
                "string block: unknown encoding {enc}"
            ))),
        }
    }
}

impl Decoder for StringDecoder<'_> {
    type Item = Vec<u8>;

    fn try_next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let (len, n) = u64::decode_var(self.buf)
            .ok_or_else(|| TsfError::Decode("string block: invalid length".to_string()))?;
        let len = len as usize;
        if self.buf.len() < n + len {
            return Err(TsfError::Decode("string block too short".to_string()));
        }
        let v = self.buf[n..n + len].to_vec();
        self.buf = &self.buf[n + len..];
        Ok(Some(v))
    }
}
