//! Block payload decoding. The four typed decode paths share one generic
//! loop parameterised by a time decoder and a value decoder; the untyped
//! path dispatches on the block's type byte.

use crate::block::{unpack_block, BLOCK_BOOLEAN, BLOCK_FLOAT64, BLOCK_INTEGER, BLOCK_STRING};
use crate::codec::boolean::BooleanDecoder;
use crate::codec::float::FloatDecoder;
use crate::codec::integer::IntegerDecoder;
use crate::codec::string::StringDecoder;
use crate::codec::timestamp::{count_timestamps, TimeDecoder};
use crate::codec::Decoder;
use crate::error::{Result, TsfError};
use crate::value::{
    BooleanValue, FieldType, FloatValue, IntegerValue, StringValue, Value, Values,
};

/// Decodes a block payload into `values`, which must hold the variant
/// matching the block's type byte.
pub fn decode_block(block: &[u8], values: &mut Values) -> Result<()> {
    let (typ, tb, vb) = unpack_block(block)?;
    if typ != values.block_type() {
        return Err(TsfError::Decode(format!(
            "invalid block type: exp {}, got {}",
            values.block_type(),
            typ
        )));
    }

    let sz = count_timestamps(tb)?;
    match values {
        Values::Float(v) => decode_block_using(sz, TimeDecoder::new(tb)?, FloatDecoder::new(vb)?, v),
        Values::Integer(v) => {
            decode_block_using(sz, TimeDecoder::new(tb)?, IntegerDecoder::new(vb)?, v)
        }
        Values::Boolean(v) => {
            decode_block_using(sz, TimeDecoder::new(tb)?, BooleanDecoder::new(vb)?, v)
        }
        Values::String(v) => {
            decode_block_using(sz, TimeDecoder::new(tb)?, StringDecoder::new(vb)?, v)
        }
    }
}

pub fn decode_float_block(block: &[u8], values: &mut Vec<FloatValue>) -> Result<()> {
    let (tb, vb, sz) = pre_decode(block, BLOCK_FLOAT64)?;
    decode_block_using(sz, TimeDecoder::new(tb)?, FloatDecoder::new(vb)?, values)
}

pub fn decode_integer_block(block: &[u8], values: &mut Vec<IntegerValue>) -> Result<()> {
    let (tb, vb, sz) = pre_decode(block, BLOCK_INTEGER)?;
    decode_block_using(sz, TimeDecoder::new(tb)?, IntegerDecoder::new(vb)?, values)
}

pub fn decode_boolean_block(block: &[u8], values: &mut Vec<BooleanValue>) -> Result<()> {
    let (tb, vb, sz) = pre_decode(block, BLOCK_BOOLEAN)?;
    decode_block_using(sz, TimeDecoder::new(tb)?, BooleanDecoder::new(vb)?, values)
}

pub fn decode_string_block(block: &[u8], values: &mut Vec<StringValue>) -> Result<()> {
    let (tb, vb, sz) = pre_decode(block, BLOCK_STRING)?;
    decode_block_using(sz, TimeDecoder::new(tb)?, StringDecoder::new(vb)?, values)
}

fn pre_decode(block: &[u8], expect_typ: u8) -> Result<(&[u8], &[u8], usize)> {
    let (typ, tb, vb) = unpack_block(block)?;
    if typ != expect_typ {
        return Err(TsfError::Decode(format!(
            "invalid block type: exp {expect_typ}, got {typ}"
        )));
    }
    let sz = count_timestamps(tb)?;
    Ok((tb, vb, sz))
}

fn decode_block_using<T, TD, VD>(
    sz: usize,
    mut ts_dec: TD,
    mut v_dec: VD,
    values: &mut Vec<Value<T>>,
) -> Result<()>
where
    T: FieldType,
    TD: Decoder<Item = i64>,
    VD: Decoder<Item = T>,
{
    values.reserve(sz);
    for _ in 0..sz {
        let unix_nano = ts_dec
            .try_next()?
            .ok_or_else(|| TsfError::Decode("timestamp block too short".to_string()))?;
        let value = v_dec
            .try_next()?
            .ok_or_else(|| TsfError::Decode("value block too short".to_string()))?;
        values.push(Value::new(unix_nano, value));
    }
    Ok(())
}
