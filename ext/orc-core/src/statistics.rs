//! Per-column statistics, updated value by value while writing and merged
//! stripe by stripe into file statistics.

use bytes::{BufMut, Bytes};
use std::sync::Arc;

use crate::encoding::varint::{
    get_f64_le, get_len_prefixed, get_signed_varint, get_u8, get_varint, put_len_prefixed,
    put_signed_varint, put_varint,
};
use crate::{OrcError, OrcValue, PrimitiveType, Result, SchemaNode};

/// Inclusive value range
#[derive(Debug, Clone, PartialEq)]
pub struct MinMax<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Clone> MinMax<T> {
    fn include(range: &mut Option<Self>, v: T) {
        match range {
            Some(r) => {
                if v < r.min {
                    r.min = v;
                } else if v > r.max {
                    r.max = v;
                }
            }
            None => {
                *range = Some(MinMax {
                    min: v.clone(),
                    max: v,
                })
            }
        }
    }

    fn merge(range: &mut Option<Self>, other: &Option<Self>) {
        if let Some(o) = other {
            Self::include(range, o.min.clone());
            Self::include(range, o.max.clone());
        }
    }
}

/// Type-specific part of a column's statistics
#[derive(Debug, Clone, PartialEq)]
pub enum TypedStatistics {
    /// Compound columns only count values
    Basic,
    /// All integer widths; `sum` is `None` once it overflows
    Integer {
        range: Option<MinMax<i64>>,
        sum: Option<i64>,
    },
    Float {
        range: Option<MinMax<f64>>,
        sum: f64,
    },
    String {
        range: Option<MinMax<Arc<str>>>,
        total_length: u64,
    },
    Boolean {
        true_count: u64,
        false_count: u64,
    },
    Binary {
        total_length: u64,
    },
    Date {
        range: Option<MinMax<i32>>,
    },
    Timestamp {
        range: Option<MinMax<i64>>,
    },
}

impl TypedStatistics {
    fn for_type(ty: Option<PrimitiveType>) -> Self {
        match ty {
            None => TypedStatistics::Basic,
            Some(
                PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64,
            ) => TypedStatistics::Integer {
                range: None,
                sum: Some(0),
            },
            Some(PrimitiveType::Float32 | PrimitiveType::Float64) => TypedStatistics::Float {
                range: None,
                sum: 0.0,
            },
            Some(PrimitiveType::String) => TypedStatistics::String {
                range: None,
                total_length: 0,
            },
            Some(PrimitiveType::Boolean) => TypedStatistics::Boolean {
                true_count: 0,
                false_count: 0,
            },
            Some(PrimitiveType::Binary) => TypedStatistics::Binary { total_length: 0 },
            Some(PrimitiveType::Date32) => TypedStatistics::Date { range: None },
            Some(PrimitiveType::Timestamp) => TypedStatistics::Timestamp { range: None },
        }
    }

    fn tag(&self) -> u8 {
        match self {
            TypedStatistics::Basic => 0,
            TypedStatistics::Integer { .. } => 1,
            TypedStatistics::Float { .. } => 2,
            TypedStatistics::String { .. } => 3,
            TypedStatistics::Boolean { .. } => 4,
            TypedStatistics::Binary { .. } => 5,
            TypedStatistics::Date { .. } => 6,
            TypedStatistics::Timestamp { .. } => 7,
        }
    }
}

/// Statistics of one column over a stripe or a whole file
///
/// `count` includes nulls, so `count >= null_count` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStatistics {
    pub count: u64,
    pub null_count: u64,
    pub typed: TypedStatistics,
}

impl ColumnStatistics {
    /// Empty statistics for the column described by `node`
    pub fn for_node(node: &SchemaNode) -> Self {
        Self {
            count: 0,
            null_count: 0,
            typed: TypedStatistics::for_type(node.primitive_type()),
        }
    }

    pub fn has_null(&self) -> bool {
        self.null_count > 0
    }

    pub fn non_null_count(&self) -> u64 {
        self.count - self.null_count
    }

    /// Account for one value written to the column
    pub fn update(&mut self, value: &OrcValue) {
        self.count += 1;
        if value.is_null() {
            self.null_count += 1;
            return;
        }

        match (&mut self.typed, value) {
            (TypedStatistics::Integer { range, sum }, v) => {
                if let Some(v) = v.as_i64() {
                    MinMax::include(range, v);
                    *sum = sum.and_then(|s| s.checked_add(v));
                }
            }
            (TypedStatistics::Float { range, sum }, v) => {
                let v = match v {
                    OrcValue::Float32(f) => f.0 as f64,
                    OrcValue::Float64(f) => f.0,
                    _ => return,
                };
                *sum += v;
                if !v.is_nan() {
                    MinMax::include(range, v);
                }
            }
            (
                TypedStatistics::String {
                    range,
                    total_length,
                },
                OrcValue::String(s),
            ) => {
                *total_length += s.len() as u64;
                MinMax::include(range, s.clone());
            }
            (
                TypedStatistics::Boolean {
                    true_count,
                    false_count,
                },
                OrcValue::Boolean(b),
            ) => {
                if *b {
                    *true_count += 1;
                } else {
                    *false_count += 1;
                }
            }
            (TypedStatistics::Binary { total_length }, OrcValue::Binary(b)) => {
                *total_length += b.len() as u64;
            }
            (TypedStatistics::Date { range }, OrcValue::Date32(d)) => MinMax::include(range, *d),
            (TypedStatistics::Timestamp { range }, OrcValue::Timestamp(t)) => {
                MinMax::include(range, *t)
            }
            _ => {}
        }
    }

    /// Fold `other` (statistics of the same column) into `self`
    pub fn merge(&mut self, other: &ColumnStatistics) -> Result<()> {
        match (&mut self.typed, &other.typed) {
            (TypedStatistics::Basic, TypedStatistics::Basic) => {}
            (TypedStatistics::Integer { range, sum }, TypedStatistics::Integer { range: r, sum: s }) => {
                MinMax::merge(range, r);
                *sum = match (*sum, *s) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
            }
            (TypedStatistics::Float { range, sum }, TypedStatistics::Float { range: r, sum: s }) => {
                MinMax::merge(range, r);
                *sum += s;
            }
            (
                TypedStatistics::String {
                    range,
                    total_length,
                },
                TypedStatistics::String {
                    range: r,
                    total_length: t,
                },
            ) => {
                MinMax::merge(range, r);
                *total_length += t;
            }
            (
                TypedStatistics::Boolean {
                    true_count,
                    false_count,
                },
                TypedStatistics::Boolean {
                    true_count: t,
                    false_count: f,
                },
            ) => {
                *true_count += t;
                *false_count += f;
            }
            (TypedStatistics::Binary { total_length }, TypedStatistics::Binary { total_length: t }) => {
                *total_length += t;
            }
            (TypedStatistics::Date { range }, TypedStatistics::Date { range: r }) => {
                MinMax::merge(range, r)
            }
            (TypedStatistics::Timestamp { range }, TypedStatistics::Timestamp { range: r }) => {
                MinMax::merge(range, r)
            }
            (mine, theirs) => {
                return Err(OrcError::invalid_argument(format!(
                    "cannot merge statistics of kind {} into kind {}",
                    theirs.tag(),
                    mine.tag()
                )))
            }
        }
        self.count += other.count;
        self.null_count += other.null_count;
        Ok(())
    }

    /// Smallest non-null value, if the column type tracks one
    pub fn min(&self) -> Option<OrcValue> {
        match &self.typed {
            TypedStatistics::Integer { range, .. } => range.as_ref().map(|r| OrcValue::Int64(r.min)),
            TypedStatistics::Float { range, .. } => range.as_ref().map(|r| OrcValue::from(r.min)),
            TypedStatistics::String { range, .. } => {
                range.as_ref().map(|r| OrcValue::String(r.min.clone()))
            }
            TypedStatistics::Boolean {
                true_count,
                false_count,
            } => match (*false_count, *true_count) {
                (0, 0) => None,
                (0, _) => Some(OrcValue::Boolean(true)),
                _ => Some(OrcValue::Boolean(false)),
            },
            TypedStatistics::Date { range } => range.as_ref().map(|r| OrcValue::Date32(r.min)),
            TypedStatistics::Timestamp { range } => {
                range.as_ref().map(|r| OrcValue::Timestamp(r.min))
            }
            TypedStatistics::Basic | TypedStatistics::Binary { .. } => None,
        }
    }

    /// Largest non-null value, if the column type tracks one
    pub fn max(&self) -> Option<OrcValue> {
        match &self.typed {
            TypedStatistics::Integer { range, .. } => range.as_ref().map(|r| OrcValue::Int64(r.max)),
            TypedStatistics::Float { range, .. } => range.as_ref().map(|r| OrcValue::from(r.max)),
            TypedStatistics::String { range, .. } => {
                range.as_ref().map(|r| OrcValue::String(r.max.clone()))
            }
            TypedStatistics::Boolean {
                true_count,
                false_count,
            } => match (*true_count, *false_count) {
                (0, 0) => None,
                (0, _) => Some(OrcValue::Boolean(false)),
                _ => Some(OrcValue::Boolean(true)),
            },
            TypedStatistics::Date { range } => range.as_ref().map(|r| OrcValue::Date32(r.max)),
            TypedStatistics::Timestamp { range } => {
                range.as_ref().map(|r| OrcValue::Timestamp(r.max))
            }
            TypedStatistics::Basic | TypedStatistics::Binary { .. } => None,
        }
    }

    /// Sum of an integer column, `None` for other kinds or after overflow
    pub fn integer_sum(&self) -> Option<i64> {
        match &self.typed {
            TypedStatistics::Integer { sum, .. } => *sum,
            _ => None,
        }
    }

    pub(crate) fn write_to<B: BufMut>(&self, buf: &mut B) {
        put_varint(buf, self.count);
        put_varint(buf, self.null_count);
        buf.put_u8(self.typed.tag());
        match &self.typed {
            TypedStatistics::Basic => {}
            TypedStatistics::Integer { range, sum } => {
                put_range(buf, range, |buf, v| put_signed_varint(buf, *v));
                match sum {
                    Some(s) => {
                        buf.put_u8(1);
                        put_signed_varint(buf, *s);
                    }
                    None => buf.put_u8(0),
                }
            }
            TypedStatistics::Float { range, sum } => {
                put_range(buf, range, |buf, v| buf.put_f64_le(*v));
                buf.put_f64_le(*sum);
            }
            TypedStatistics::String {
                range,
                total_length,
            } => {
                put_range(buf, range, |buf, v| put_len_prefixed(buf, v.as_bytes()));
                put_varint(buf, *total_length);
            }
            TypedStatistics::Boolean {
                true_count,
                false_count,
            } => {
                put_varint(buf, *true_count);
                put_varint(buf, *false_count);
            }
            TypedStatistics::Binary { total_length } => put_varint(buf, *total_length),
            TypedStatistics::Date { range } => {
                put_range(buf, range, |buf, v| put_signed_varint(buf, *v as i64))
            }
            TypedStatistics::Timestamp { range } => {
                put_range(buf, range, |buf, v| put_signed_varint(buf, *v))
            }
        }
    }

    pub(crate) fn read_from(buf: &mut Bytes) -> Result<Self> {
        let count = get_varint(buf)?;
        let null_count = get_varint(buf)?;
        if null_count > count {
            return Err(OrcError::malformed(format!(
                "null count {} exceeds value count {}",
                null_count, count
            )));
        }

        let typed = match get_u8(buf)? {
            0 => TypedStatistics::Basic,
            1 => {
                let range = get_range(buf, get_signed_varint)?;
                let sum = match get_u8(buf)? {
                    0 => None,
                    _ => Some(get_signed_varint(buf)?),
                };
                TypedStatistics::Integer { range, sum }
            }
            2 => TypedStatistics::Float {
                range: get_range(buf, get_f64_le)?,
                sum: get_f64_le(buf)?,
            },
            3 => TypedStatistics::String {
                range: get_range(buf, |buf| {
                    let bytes = get_len_prefixed(buf)?;
                    std::str::from_utf8(&bytes)
                        .map(Arc::from)
                        .map_err(|e| OrcError::malformed(format!("invalid UTF-8 bound: {}", e)))
                })?,
                total_length: get_varint(buf)?,
            },
            4 => TypedStatistics::Boolean {
                true_count: get_varint(buf)?,
                false_count: get_varint(buf)?,
            },
            5 => TypedStatistics::Binary {
                total_length: get_varint(buf)?,
            },
            6 => TypedStatistics::Date {
                range: get_range(buf, |buf| {
                    let v = get_signed_varint(buf)?;
                    i32::try_from(v).map_err(|_| OrcError::malformed(format!("date {} out of range", v)))
                })?,
            },
            7 => TypedStatistics::Timestamp {
                range: get_range(buf, get_signed_varint)?,
            },
            other => {
                return Err(OrcError::malformed(format!(
                    "unknown statistics kind {}",
                    other
                )))
            }
        };

        Ok(Self {
            count,
            null_count,
            typed,
        })
    }
}

fn put_range<B, T, F>(buf: &mut B, range: &Option<MinMax<T>>, put: F)
where
    B: BufMut,
    F: Fn(&mut B, &T),
{
    match range {
        Some(r) => {
            buf.put_u8(1);
            put(buf, &r.min);
            put(buf, &r.max);
        }
        None => buf.put_u8(0),
    }
}

fn get_range<T, F>(buf: &mut Bytes, get: F) -> Result<Option<MinMax<T>>>
where
    F: Fn(&mut Bytes) -> Result<T>,
{
    match get_u8(buf)? {
        0 => Ok(None),
        _ => Ok(Some(MinMax {
            min: get(buf)?,
            max: get(buf)?,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_stats(values: &[Option<i64>]) -> ColumnStatistics {
        let mut stats =
            ColumnStatistics::for_node(&SchemaNode::primitive("n", PrimitiveType::Int64));
        for v in values {
            stats.update(&OrcValue::from(*v));
        }
        stats
    }

    #[test]
    fn test_integer_statistics() {
        let stats = int_stats(&[Some(30), None, Some(25), Some(35)]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.min(), Some(OrcValue::Int64(25)));
        assert_eq!(stats.max(), Some(OrcValue::Int64(35)));
        assert_eq!(stats.integer_sum(), Some(90));
    }

    #[test]
    fn test_all_null_column_has_no_bounds() {
        let stats = int_stats(&[None, None]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.non_null_count(), 0);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.max(), None);
    }

    #[test]
    fn test_sum_overflow_clears_sum() {
        let stats = int_stats(&[Some(i64::MAX), Some(1)]);
        assert_eq!(stats.integer_sum(), None);
        assert_eq!(stats.max(), Some(OrcValue::Int64(i64::MAX)));
    }

    #[test]
    fn test_string_bounds_use_byte_order() {
        let mut stats =
            ColumnStatistics::for_node(&SchemaNode::primitive("s", PrimitiveType::String));
        for s in ["bob", "Alice", "charlie", "Zed"] {
            stats.update(&OrcValue::from(s));
        }
        assert_eq!(stats.min(), Some(OrcValue::from("Alice")));
        assert_eq!(stats.max(), Some(OrcValue::from("charlie")));
        assert_eq!(
            stats.typed,
            TypedStatistics::String {
                range: Some(MinMax {
                    min: Arc::from("Alice"),
                    max: Arc::from("charlie"),
                }),
                total_length: 18,
            }
        );
    }

    #[test]
    fn test_merge() {
        let mut a = int_stats(&[Some(5), Some(9)]);
        let b = int_stats(&[None, Some(-3)]);
        a.merge(&b).unwrap();
        assert_eq!(a.count, 4);
        assert_eq!(a.null_count, 1);
        assert_eq!(a.min(), Some(OrcValue::Int64(-3)));
        assert_eq!(a.max(), Some(OrcValue::Int64(9)));
        assert_eq!(a.integer_sum(), Some(11));

        let floats =
            ColumnStatistics::for_node(&SchemaNode::primitive("f", PrimitiveType::Float64));
        assert!(a.merge(&floats).is_err());
    }

    #[test]
    fn test_boolean_bounds() {
        let mut stats =
            ColumnStatistics::for_node(&SchemaNode::primitive("b", PrimitiveType::Boolean));
        stats.update(&OrcValue::Boolean(true));
        assert_eq!(stats.min(), Some(OrcValue::Boolean(true)));
        stats.update(&OrcValue::Boolean(false));
        assert_eq!(stats.min(), Some(OrcValue::Boolean(false)));
        assert_eq!(stats.max(), Some(OrcValue::Boolean(true)));
    }

    #[test]
    fn test_serialization() {
        let mut floats =
            ColumnStatistics::for_node(&SchemaNode::primitive("f", PrimitiveType::Float32));
        floats.update(&OrcValue::from(1.5f32));
        floats.update(&OrcValue::Null);
        floats.update(&OrcValue::from(-2.0f32));

        let mut dates =
            ColumnStatistics::for_node(&SchemaNode::primitive("d", PrimitiveType::Date32));
        dates.update(&OrcValue::Date32(19000));

        let mut strings =
            ColumnStatistics::for_node(&SchemaNode::primitive("s", PrimitiveType::String));
        strings.update(&OrcValue::from("héllo"));

        for stats in [int_stats(&[Some(1), Some(i64::MAX)]), floats, dates, strings] {
            let mut buf = Vec::new();
            stats.write_to(&mut buf);
            let mut bytes = Bytes::from(buf);
            assert_eq!(ColumnStatistics::read_from(&mut bytes).unwrap(), stats);
            assert!(bytes.is_empty());
        }
    }

    #[test]
    fn test_corrupt_statistics_rejected() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 2);
        buf.push(0);
        assert!(ColumnStatistics::read_from(&mut Bytes::from(buf)).is_err());

        let mut bytes = Bytes::from_static(&[1, 0, 42]);
        assert!(ColumnStatistics::read_from(&mut bytes).is_err());
    }
}
