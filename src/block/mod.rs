//! Block payload framing. After its 4 byte checksum, every block carries a
//! one byte value type, the varint length of the timestamp sub-block, the
//! timestamp bytes, then the value bytes.

pub mod decoder;

use crate::codec::varint::VarInt;
use crate::error::{Result, TsfError};

/// BLOCK_FLOAT64 designates a block that encodes float64 values.
pub const BLOCK_FLOAT64: u8 = 0;

/// BLOCK_INTEGER designates a block that encodes int64 values.
pub const BLOCK_INTEGER: u8 = 1;

/// BLOCK_BOOLEAN designates a block that encodes boolean values.
pub const BLOCK_BOOLEAN: u8 = 2;

/// BLOCK_STRING designates a block that encodes string values.
pub const BLOCK_STRING: u8 = 3;

/// ENCODED_BLOCK_HEADER_SIZE is the size of the header for an encoded block.
/// There is one byte encoding the type of the block.
pub(crate) const ENCODED_BLOCK_HEADER_SIZE: usize = 1;

/// Splits a block payload into its value type, timestamp bytes, and value
/// bytes.
pub fn unpack_block(buf: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    if buf.len() <= ENCODED_BLOCK_HEADER_SIZE {
        return Err(TsfError::Decode(format!(
            "unpack_block: block too short: {}",
            buf.len()
        )));
    }

    let typ = buf[0];

    let (ts_len, n) = u64::decode_var(&buf[1..]).ok_or_else(|| {
        TsfError::Decode("unpack_block: unable to read timestamp block length".to_string())
    })?;

    let data = &buf[1 + n..];
    let ts_len = ts_len as usize;
    if ts_len > data.len() {
        return Err(TsfError::Decode(
            "unpack_block: not enough data for timestamp block".to_string(),
        ));
    }

    Ok((typ, &data[..ts_len], &data[ts_len..]))
}
