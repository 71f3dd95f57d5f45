use std::fmt::Debug;

use crate::block::{BLOCK_BOOLEAN, BLOCK_FLOAT64, BLOCK_INTEGER, BLOCK_STRING};
use crate::error::{Result, TsfError};

/// Types that can be stored as block values.
pub trait FieldType: Debug + Send + Sync + Clone + PartialOrd + PartialEq {}

impl FieldType for f64 {}
impl FieldType for i64 {}
impl FieldType for bool {}
impl FieldType for Vec<u8> {}

/// A single timestamped value.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct Value<T>
where
    T: FieldType,
{
    pub unix_nano: i64,
    pub value: T,
}

impl<T> Value<T>
where
    T: FieldType,
{
    pub fn new(unix_nano: i64, value: T) -> Self {
        Self { unix_nano, value }
    }
}

pub type FloatValue = Value<f64>;
pub type IntegerValue = Value<i64>;
pub type BooleanValue = Value<bool>;
pub type StringValue = Value<Vec<u8>>;

/// Time-range filters over a decoded value sequence. The sequence must be
/// sorted ascending by `unix_nano`; bounds are inclusive on both ends.
pub trait TValues {
    /// Removes all values with timestamps in `[min, max]`.
    fn exclude(&mut self, min: i64, max: i64);

    /// Keeps only the values with timestamps in `[min, max]`.
    fn include(&mut self, min: i64, max: i64);
}

impl<T> TValues for Vec<Value<T>>
where
    T: FieldType,
{
    fn exclude(&mut self, min: i64, max: i64) {
        let Some((rmin, rmax)) = find_range(self, min, max) else {
            return;
        };
        self.drain(rmin..rmax);
    }

    fn include(&mut self, min: i64, max: i64) {
        let Some((rmin, rmax)) = find_range(self, min, max) else {
            self.clear();
            return;
        };
        self.truncate(rmax);
        self.drain(..rmin);
    }
}

/// Returns the index range `[rmin, rmax)` of values whose timestamps fall in
/// `[min, max]`, or `None` when the window misses the sequence entirely.
fn find_range<T>(values: &[Value<T>], min: i64, max: i64) -> Option<(usize, usize)>
where
    T: FieldType,
{
    if values.is_empty() || min > max {
        return None;
    }
    if values[values.len() - 1].unix_nano < min || values[0].unix_nano > max {
        return None;
    }

    let rmin = search(values, min);
    let mut rmax = search(values, max);
    if rmax < values.len() && values[rmax].unix_nano == max {
        rmax += 1;
    }
    Some((rmin, rmax))
}

/// Position of the first value with timestamp >= t.
fn search<T>(values: &[Value<T>], t: i64) -> usize
where
    T: FieldType,
{
    values.partition_point(|v| v.unix_nano < t)
}

/// Values describes the various types of block data that can be held within
/// a TSF file.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Float(Vec<FloatValue>),
    Integer(Vec<IntegerValue>),
    Boolean(Vec<BooleanValue>),
    String(Vec<StringValue>),
}

impl Values {
    /// Returns an empty sequence matching the given block type.
    pub fn with_block_type(typ: u8) -> Result<Self> {
        match typ {
            BLOCK_FLOAT64 => Ok(Self::Float(vec![])),
            BLOCK_INTEGER => Ok(Self::Integer(vec![])),
            BLOCK_BOOLEAN => Ok(Self::Boolean(vec![])),
            BLOCK_STRING => Ok(Self::String(vec![])),
            _ => Err(TsfError::Decode(format!("unknown block type: {typ}"))),
        }
    }

    pub fn block_type(&self) -> u8 {
        match self {
            Self::Float(_) => BLOCK_FLOAT64,
            Self::Integer(_) => BLOCK_INTEGER,
            Self::Boolean(_) => BLOCK_BOOLEAN,
            Self::String(_) => BLOCK_STRING,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all values with timestamps in `[min, max]`.
    pub fn exclude(&mut self, min: i64, max: i64) {
        match self {
            Self::Float(v) => v.exclude(min, max),
            Self::Integer(v) => v.exclude(min, max),
            Self::Boolean(v) => v.exclude(min, max),
            Self::String(v) => v.exclude(min, max),
        }
    }

    /// Appends `other` to this sequence. Both must hold the same block type.
    pub fn append(&mut self, other: Values) -> Result<()> {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.extend(b),
            (Self::Integer(a), Self::Integer(b)) => a.extend(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.extend(b),
            (Self::String(a), Self::String(b)) => a.extend(b),
            (a, b) => {
                return Err(TsfError::Decode(format!(
                    "block type mismatch: exp {}, got {}",
                    a.block_type(),
                    b.block_type()
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(ts: &[i64]) -> Vec<FloatValue> {
        ts.iter().map(|&t| Value::new(t, t as f64)).collect()
    }

    fn times(values: &[FloatValue]) -> Vec<i64> {
        values.iter().map(|v| v.unix_nano).collect()
    }

    #[test]
    fn exclude_interior_range() {
        let mut v = floats(&[1, 3, 5, 7, 9]);
        v.exclude(3, 7);
        assert_eq!(times(&v), vec![1, 9]);
    }

    #[test]
    fn exclude_inclusive_bounds() {
        let mut v = floats(&[2, 3, 4, 5]);
        v.exclude(3, 3);
        assert_eq!(times(&v), vec![2, 4, 5]);
    }

    #[test]
    fn exclude_outside_range_is_noop() {
        let mut v = floats(&[10, 20]);
        v.exclude(30, 40);
        assert_eq!(times(&v), vec![10, 20]);
        v.exclude(0, 5);
        assert_eq!(times(&v), vec![10, 20]);
    }

    #[test]
    fn exclude_everything() {
        let mut v = floats(&[1, 2, 3]);
        v.exclude(i64::MIN, i64::MAX);
        assert!(v.is_empty());
    }

    #[test]
    fn include_interior_range() {
        let mut v = floats(&[1, 3, 5, 7, 9]);
        v.include(3, 7);
        assert_eq!(times(&v), vec![3, 5, 7]);
    }

    #[test]
    fn include_miss_clears() {
        let mut v = floats(&[1, 2]);
        v.include(10, 20);
        assert!(v.is_empty());
    }

    #[test]
    fn values_append_same_type() {
        let mut a = Values::Float(floats(&[1, 2]));
        a.append(Values::Float(floats(&[3]))).unwrap();
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn values_append_type_mismatch() {
        let mut a = Values::Float(vec![]);
        let err = a.append(Values::Integer(vec![])).unwrap_err();
        assert!(matches!(err, TsfError::Decode(_)));
    }

    #[test]
    fn values_with_unknown_block_type() {
        assert!(Values::with_block_type(9).is_err());
    }
}
