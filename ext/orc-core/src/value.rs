use bytes::Bytes;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::sync::Arc;

use crate::{OrcError, PrimitiveType, Result, SchemaNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrcValue {
    Boolean(bool),

    // Numeric types
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),

    String(Arc<str>),
    Binary(Bytes),

    Date32(i32),    // Days since epoch
    Timestamp(i64), // Nanoseconds since epoch

    // Complex types
    List(Vec<OrcValue>),
    Map(Vec<(OrcValue, OrcValue)>), // Using Vec of tuples for deterministic ordering
    Record(IndexMap<Arc<str>, OrcValue>), // For struct types, preserves field order
    Union(u8, Box<OrcValue>),       // variant tag, value

    Null,
}

impl std::hash::Hash for OrcValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            OrcValue::Boolean(b) => b.hash(state),
            OrcValue::Int8(i) => i.hash(state),
            OrcValue::Int16(i) => i.hash(state),
            OrcValue::Int32(i) => i.hash(state),
            OrcValue::Int64(i) => i.hash(state),
            OrcValue::Float32(f) => f.hash(state),
            OrcValue::Float64(f) => f.hash(state),
            OrcValue::String(s) => s.hash(state),
            OrcValue::Binary(b) => b.hash(state),
            OrcValue::Date32(d) => d.hash(state),
            OrcValue::Timestamp(ts) => ts.hash(state),
            OrcValue::List(l) => l.hash(state),
            OrcValue::Map(m) => m.hash(state),
            OrcValue::Record(r) => {
                // IndexMap preserves insertion order, so hash is deterministic
                for (k, v) in r {
                    k.hash(state);
                    v.hash(state);
                }
            }
            OrcValue::Union(tag, v) => {
                tag.hash(state);
                v.hash(state);
            }
            OrcValue::Null => 0_i32.hash(state),
        }
    }
}

impl OrcValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, OrcValue::Null)
    }

    /// Get the type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            OrcValue::Boolean(_) => "Boolean",
            OrcValue::Int8(_) => "Int8",
            OrcValue::Int16(_) => "Int16",
            OrcValue::Int32(_) => "Int32",
            OrcValue::Int64(_) => "Int64",
            OrcValue::Float32(_) => "Float32",
            OrcValue::Float64(_) => "Float64",
            OrcValue::String(_) => "String",
            OrcValue::Binary(_) => "Binary",
            OrcValue::Date32(_) => "Date32",
            OrcValue::Timestamp(_) => "Timestamp",
            OrcValue::List(_) => "List",
            OrcValue::Map(_) => "Map",
            OrcValue::Record(_) => "Record",
            OrcValue::Union(_, _) => "Union",
            OrcValue::Null => "Null",
        }
    }

    /// Integer payload of any integer variant
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OrcValue::Int8(v) => Some(*v as i64),
            OrcValue::Int16(v) => Some(*v as i64),
            OrcValue::Int32(v) => Some(*v as i64),
            OrcValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Build a record from `(field, value)` pairs
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, OrcValue)>,
    {
        OrcValue::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build the integer value a column of type `ty` stores
    pub(crate) fn from_integer(ty: PrimitiveType, v: i64) -> Option<Self> {
        Some(match ty {
            PrimitiveType::Int8 => OrcValue::Int8(i8::try_from(v).ok()?),
            PrimitiveType::Int16 => OrcValue::Int16(i16::try_from(v).ok()?),
            PrimitiveType::Int32 => OrcValue::Int32(i32::try_from(v).ok()?),
            PrimitiveType::Int64 => OrcValue::Int64(v),
            PrimitiveType::Date32 => OrcValue::Date32(i32::try_from(v).ok()?),
            PrimitiveType::Timestamp => OrcValue::Timestamp(v),
            _ => return None,
        })
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for OrcValue {
                fn from(v: $ty) -> Self {
                    OrcValue::$variant(v.into())
                }
            }
        )*
    };
}

impl_from!(
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Arc<str> => String,
    &str => String,
    String => String,
    Bytes => Binary,
    Vec<u8> => Binary,
);

impl<T: Into<OrcValue>> From<Option<T>> for OrcValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(OrcValue::Null, Into::into)
    }
}

/// Check `value` against `node` and return the form the column stores
///
/// Integers are accepted by any integer column whose range holds them, and
/// narrower numbers widen losslessly into floating columns. Records may omit
/// fields (stored as null) but may not carry unknown ones.
pub(crate) fn normalize_value(value: &OrcValue, node: &SchemaNode, path: &str) -> Result<OrcValue> {
    use OrcValue::*;

    if value.is_null() {
        return Ok(Null);
    }

    let mismatch = || OrcError::unsupported_value(path, node.type_name(), value.type_name());

    match node {
        SchemaNode::Primitive { primitive_type, .. } => match (primitive_type, value) {
            (PrimitiveType::Boolean, Boolean(_)) => Ok(value.clone()),
            (
                PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64,
                Int8(_) | Int16(_) | Int32(_) | Int64(_),
            ) => {
                let v = value.as_i64().ok_or_else(mismatch)?;
                OrcValue::from_integer(*primitive_type, v).ok_or_else(|| {
                    OrcError::unsupported_value(
                        path,
                        primitive_type.type_name(),
                        format!("{} out of range ({})", value.type_name(), v),
                    )
                })
            }
            (PrimitiveType::Float32, Float32(_)) => Ok(value.clone()),
            (PrimitiveType::Float32, Int8(v)) => Ok(Float32(OrderedFloat(*v as f32))),
            (PrimitiveType::Float32, Int16(v)) => Ok(Float32(OrderedFloat(*v as f32))),
            (PrimitiveType::Float64, Float64(_)) => Ok(value.clone()),
            (PrimitiveType::Float64, Float32(v)) => Ok(Float64(OrderedFloat(v.0 as f64))),
            (PrimitiveType::Float64, Int8(_) | Int16(_) | Int32(_)) => {
                let v = value.as_i64().ok_or_else(mismatch)?;
                Ok(Float64(OrderedFloat(v as f64)))
            }
            (PrimitiveType::String, String(_)) => Ok(value.clone()),
            (PrimitiveType::Binary, Binary(_)) => Ok(value.clone()),
            (PrimitiveType::Binary, String(s)) => Ok(Binary(Bytes::copy_from_slice(s.as_bytes()))),
            (PrimitiveType::Date32, Date32(_)) => Ok(value.clone()),
            (PrimitiveType::Timestamp, Timestamp(_)) => Ok(value.clone()),
            _ => Err(mismatch()),
        },

        SchemaNode::List { item, .. } => match value {
            List(items) => items
                .iter()
                .enumerate()
                .map(|(idx, v)| normalize_value(v, item, &format!("{}[{}]", path, idx)))
                .collect::<Result<Vec<_>>>()
                .map(List),
            _ => Err(mismatch()),
        },

        SchemaNode::Map {
            key, value: val, ..
        } => match value {
            Map(entries) => entries
                .iter()
                .enumerate()
                .map(|(idx, (k, v))| {
                    Ok((
                        normalize_value(k, key, &format!("{}.key[{}]", path, idx))?,
                        normalize_value(v, val, &format!("{}.value[{}]", path, idx))?,
                    ))
                })
                .collect::<Result<Vec<_>>>()
                .map(Map),
            _ => Err(mismatch()),
        },

        SchemaNode::Struct { fields, .. } => match value {
            Record(record) => {
                for name in record.keys() {
                    if !fields.iter().any(|f| f.name() == name.as_ref()) {
                        return Err(OrcError::unsupported_value(
                            format!("{}.{}", path, name),
                            "a field of the struct",
                            "unknown field",
                        ));
                    }
                }
                let mut normalized = IndexMap::with_capacity(fields.len());
                for field in fields {
                    let field_value = match record.get(field.name()) {
                        Some(v) => normalize_value(v, field, &format!("{}.{}", path, field.name()))?,
                        None => Null,
                    };
                    normalized.insert(Arc::from(field.name()), field_value);
                }
                Ok(Record(normalized))
            }
            _ => Err(mismatch()),
        },

        SchemaNode::Union { variants, .. } => match value {
            Union(tag, inner) => {
                let variant = variants.get(*tag as usize).ok_or_else(|| {
                    OrcError::unsupported_value(
                        path,
                        format!("union tag below {}", variants.len()),
                        format!("tag {}", tag),
                    )
                })?;
                let inner = normalize_value(inner, variant, &format!("{}.{}", path, tag))?;
                Ok(Union(*tag, Box::new(inner)))
            }
            _ => Err(mismatch()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema;

    #[test]
    fn test_value_creation() {
        let v = OrcValue::Int32(42);
        assert_eq!(v, OrcValue::Int32(42));
        assert!(!v.is_null());
        assert_eq!(v.type_name(), "Int32");
        assert_eq!(OrcValue::from("Alice"), OrcValue::String(Arc::from("Alice")));
        assert_eq!(OrcValue::from(None::<i32>), OrcValue::Null);
    }

    #[test]
    fn test_float_equality() {
        let v1 = OrcValue::Float32(OrderedFloat(3.5));
        let v2 = OrcValue::from(3.5f32);
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_integer_coercion() {
        let node = SchemaNode::primitive("age", PrimitiveType::Int32);
        assert_eq!(
            normalize_value(&OrcValue::Int64(30), &node, "age").unwrap(),
            OrcValue::Int32(30)
        );
        assert_eq!(
            normalize_value(&OrcValue::Int8(-3), &node, "age").unwrap(),
            OrcValue::Int32(-3)
        );

        let err = normalize_value(&OrcValue::Int64(1 << 40), &node, "age").unwrap_err();
        assert!(matches!(err, OrcError::UnsupportedValueType { .. }));
    }

    #[test]
    fn test_float_widening() {
        let node = SchemaNode::primitive("salary", PrimitiveType::Float64);
        assert_eq!(
            normalize_value(&OrcValue::from(1.5f32), &node, "salary").unwrap(),
            OrcValue::from(1.5f64)
        );
        assert_eq!(
            normalize_value(&OrcValue::Int32(7), &node, "salary").unwrap(),
            OrcValue::from(7.0f64)
        );
        assert!(normalize_value(&OrcValue::Int64(7), &node, "salary").is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let node = SchemaNode::primitive("name", PrimitiveType::String);
        let err = normalize_value(&OrcValue::Int32(1), &node, "row[0]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported value at row[0]: expected String, got Int32"
        );
    }

    #[test]
    fn test_record_normalization() {
        let schema = parse_schema("struct<p:struct<a:int,b:string>>").unwrap();
        let node = &schema.top_level_fields()[0];

        let partial = OrcValue::record([("b", OrcValue::from("x"))]);
        let normalized = normalize_value(&partial, node, "p").unwrap();
        assert_eq!(
            normalized,
            OrcValue::record([("a", OrcValue::Null), ("b", OrcValue::from("x"))])
        );

        let unknown = OrcValue::record([("c", OrcValue::Int32(1))]);
        assert!(normalize_value(&unknown, node, "p").is_err());
    }

    #[test]
    fn test_union_tag_validation() {
        let schema = parse_schema("uniontype<int,string>").unwrap();
        let ok = OrcValue::Union(1, Box::new(OrcValue::from("s")));
        assert!(normalize_value(&ok, &schema.root, "u").is_ok());

        let bad = OrcValue::Union(2, Box::new(OrcValue::Int32(1)));
        assert!(normalize_value(&bad, &schema.root, "u").is_err());
    }
}
