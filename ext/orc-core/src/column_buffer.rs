//! Write-side column buffers.
//!
//! One [`ColumnBuffer`] exists per schema node, arranged as the schema tree.
//! Leaves hold values; compound buffers hold their own presence plus list or
//! map lengths or union tags. Values of a null parent never reach its
//! children, so a child column only sees entries for non-null parents.

use bytes::Bytes;
use log::trace;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::encoding::{
    encode_booleans, encode_direct, encode_f32, encode_f64, encode_integers, encode_strings,
    ColumnEncoding, StreamKind,
};
use crate::statistics::ColumnStatistics;
use crate::{OrcError, OrcValue, PrimitiveType, Result, SchemaNode};

/// An encoded, not yet compressed, stream
#[derive(Debug)]
pub(crate) struct EncodedStream {
    pub column: usize,
    pub kind: StreamKind,
    pub data: Vec<u8>,
}

#[derive(Debug)]
enum Values {
    Boolean(Vec<bool>),
    /// All integer widths plus dates and timestamps
    Integer(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<Arc<str>>),
    Binary(Vec<Bytes>),
    Struct,
    List(Vec<i64>),
    Map(Vec<i64>),
    Union(Vec<i64>),
}

impl Values {
    fn for_node(node: &SchemaNode) -> Self {
        match node {
            SchemaNode::Struct { .. } => Values::Struct,
            SchemaNode::List { .. } => Values::List(Vec::new()),
            SchemaNode::Map { .. } => Values::Map(Vec::new()),
            SchemaNode::Union { .. } => Values::Union(Vec::new()),
            SchemaNode::Primitive { primitive_type, .. } => match primitive_type {
                PrimitiveType::Boolean => Values::Boolean(Vec::new()),
                PrimitiveType::Float32 => Values::Float32(Vec::new()),
                PrimitiveType::Float64 => Values::Float64(Vec::new()),
                PrimitiveType::String => Values::String(Vec::new()),
                PrimitiveType::Binary => Values::Binary(Vec::new()),
                PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64
                | PrimitiveType::Date32
                | PrimitiveType::Timestamp => Values::Integer(Vec::new()),
            },
        }
    }

    fn clear(&mut self) {
        match self {
            Values::Boolean(v) => v.clear(),
            Values::Integer(v) | Values::List(v) | Values::Map(v) | Values::Union(v) => v.clear(),
            Values::Float32(v) => v.clear(),
            Values::Float64(v) => v.clear(),
            Values::String(v) => v.clear(),
            Values::Binary(v) => v.clear(),
            Values::Struct => {}
        }
    }
}

#[derive(Debug)]
pub(crate) struct ColumnBuffer {
    column: usize,
    node: SchemaNode,
    value_width: usize,
    present: Vec<bool>,
    has_nulls: bool,
    values: Values,
    statistics: ColumnStatistics,
    estimated_size: usize,
    children: Vec<ColumnBuffer>,
}

impl ColumnBuffer {
    /// Build the buffer tree for `root`, numbering columns in pre-order
    pub fn new(root: &SchemaNode) -> Self {
        let mut next_id = 0;
        Self::build(root, &mut next_id)
    }

    fn build(node: &SchemaNode, next_id: &mut usize) -> Self {
        let column = *next_id;
        *next_id += 1;
        let children = node
            .children()
            .into_iter()
            .map(|child| Self::build(child, next_id))
            .collect();

        Self {
            column,
            node: node.clone(),
            value_width: value_width(node),
            present: Vec::new(),
            has_nulls: false,
            values: Values::for_node(node),
            statistics: ColumnStatistics::for_node(node),
            estimated_size: 0,
            children,
        }
    }

    /// Rows (or entries, for nested columns) buffered in this column
    pub fn len(&self) -> usize {
        self.present.len()
    }

    /// Estimated encoded size of this column and its descendants
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
            + self
                .children
                .iter()
                .map(ColumnBuffer::estimated_size)
                .sum::<usize>()
    }

    /// Append one row whose values have already been normalized against
    /// the schema
    pub fn append_row(&mut self, row: &[OrcValue]) -> Result<()> {
        match self.values {
            Values::Struct => {
                if row.len() != self.children.len() {
                    return Err(OrcError::RowArityMismatch {
                        expected: self.children.len(),
                        actual: row.len(),
                    });
                }
                self.statistics.count += 1;
                self.present.push(true);
                for (child, value) in self.children.iter_mut().zip(row) {
                    child.append(value)?;
                }
                Ok(())
            }
            _ => match row {
                [value] => self.append(value),
                _ => Err(OrcError::RowArityMismatch {
                    expected: 1,
                    actual: row.len(),
                }),
            },
        }
    }

    pub fn append(&mut self, value: &OrcValue) -> Result<()> {
        self.statistics.update(value);
        if value.is_null() {
            self.present.push(false);
            self.has_nulls = true;
            return Ok(());
        }
        self.present.push(true);
        self.estimated_size += self.value_width;

        match (&mut self.values, value) {
            (Values::Boolean(v), OrcValue::Boolean(b)) => v.push(*b),
            (Values::Integer(v), OrcValue::Date32(d)) => v.push(*d as i64),
            (Values::Integer(v), OrcValue::Timestamp(t)) => v.push(*t),
            (Values::Integer(v), OrcValue::Int8(i)) => v.push(*i as i64),
            (Values::Integer(v), OrcValue::Int16(i)) => v.push(*i as i64),
            (Values::Integer(v), OrcValue::Int32(i)) => v.push(*i as i64),
            (Values::Integer(v), OrcValue::Int64(i)) => v.push(*i),
            (Values::Float32(v), OrcValue::Float32(f)) => v.push(f.0),
            (Values::Float64(v), OrcValue::Float64(f)) => v.push(f.0),
            (Values::String(v), OrcValue::String(s)) => {
                self.estimated_size += s.len();
                v.push(s.clone());
            }
            (Values::Binary(v), OrcValue::Binary(b)) => {
                self.estimated_size += b.len();
                v.push(b.clone());
            }
            (Values::Struct, OrcValue::Record(record)) => {
                for child in self.children.iter_mut() {
                    let field = record.get(child.node.name()).unwrap_or(&OrcValue::Null);
                    child.append(field)?;
                }
            }
            (Values::List(lengths), OrcValue::List(items)) => {
                lengths.push(items.len() as i64);
                for item in items {
                    self.children[0].append(item)?;
                }
            }
            (Values::Map(lengths), OrcValue::Map(entries)) => {
                lengths.push(entries.len() as i64);
                for (k, v) in entries {
                    self.children[0].append(k)?;
                    self.children[1].append(v)?;
                }
            }
            (Values::Union(tags), OrcValue::Union(tag, inner)) => {
                let child = self.children.get_mut(*tag as usize).ok_or_else(|| {
                    OrcError::unsupported_value(
                        self.node.name(),
                        self.node.type_name(),
                        format!("union tag {}", tag),
                    )
                })?;
                tags.push(*tag as i64);
                child.append(inner)?;
            }
            (_, other) => {
                return Err(OrcError::unsupported_value(
                    self.node.name(),
                    self.node.type_name(),
                    other.type_name(),
                ))
            }
        }
        Ok(())
    }

    /// Encode this column and its descendants in column order
    ///
    /// The cancellation token is checked before each column.
    pub fn encode(
        &self,
        dictionary_threshold: f64,
        cancel: Option<&CancellationToken>,
        streams: &mut Vec<EncodedStream>,
        encodings: &mut Vec<ColumnEncoding>,
    ) -> Result<()> {
        if let Some(token) = cancel {
            token.check()?;
        }

        let column = self.column;
        let mut push = |kind: StreamKind, data: Vec<u8>| {
            streams.push(EncodedStream { column, kind, data })
        };

        if self.has_nulls {
            let mut present = Vec::with_capacity(self.present.len().div_ceil(8));
            encode_booleans(&self.present, &mut present);
            push(StreamKind::Present, present);
        }

        let mut encoding = ColumnEncoding::Direct;
        match &self.values {
            Values::Boolean(v) => {
                let mut data = Vec::with_capacity(v.len().div_ceil(8));
                encode_booleans(v, &mut data);
                push(StreamKind::Data, data);
            }
            Values::Integer(v) | Values::Union(v) => {
                let mut data = Vec::new();
                encode_integers(v, &mut data);
                push(StreamKind::Data, data);
            }
            Values::List(v) | Values::Map(v) => {
                let mut data = Vec::new();
                encode_integers(v, &mut data);
                push(StreamKind::Length, data);
            }
            Values::Float32(v) => {
                let mut data = Vec::with_capacity(v.len() * 4);
                encode_f32(v, &mut data);
                push(StreamKind::Data, data);
            }
            Values::Float64(v) => {
                let mut data = Vec::with_capacity(v.len() * 8);
                encode_f64(v, &mut data);
                push(StreamKind::Data, data);
            }
            Values::String(v) => {
                let slices: Vec<&[u8]> = v.iter().map(|s| s.as_bytes()).collect();
                let encoded = encode_strings(&slices, dictionary_threshold);
                encoding = encoded.encoding;
                push(StreamKind::Data, encoded.data);
                push(StreamKind::Length, encoded.length);
                if let Some(dictionary) = encoded.dictionary {
                    push(StreamKind::DictionaryData, dictionary);
                }
            }
            Values::Binary(v) => {
                let slices: Vec<&[u8]> = v.iter().map(|b| b.as_ref()).collect();
                let encoded = encode_direct(&slices);
                push(StreamKind::Data, encoded.data);
                push(StreamKind::Length, encoded.length);
            }
            Values::Struct => {}
        }
        trace!(
            "encoded column {} ({}) as {:?}, {} entries",
            self.column,
            self.node.type_name(),
            encoding,
            self.len()
        );
        encodings.push(encoding);

        for child in &self.children {
            child.encode(dictionary_threshold, cancel, streams, encodings)?;
        }
        Ok(())
    }

    /// Statistics of this column and its descendants in column order
    pub fn collect_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.statistics.clone());
        for child in &self.children {
            child.collect_statistics(out);
        }
    }

    /// Drop all buffered values, keeping allocations
    pub fn reset(&mut self) {
        self.present.clear();
        self.has_nulls = false;
        self.values.clear();
        self.statistics = ColumnStatistics::for_node(&self.node);
        self.estimated_size = 0;
        for child in self.children.iter_mut() {
            child.reset();
        }
    }
}

/// Estimated encoded bytes for one non-null value, excluding variable data
fn value_width(node: &SchemaNode) -> usize {
    match node {
        SchemaNode::Struct { .. } => 0,
        SchemaNode::List { .. } | SchemaNode::Map { .. } => 4,
        SchemaNode::Union { .. } => 1,
        SchemaNode::Primitive { primitive_type, .. } => match primitive_type {
            PrimitiveType::Boolean | PrimitiveType::Int8 => 1,
            PrimitiveType::Int16 => 2,
            PrimitiveType::Int32 | PrimitiveType::Float32 | PrimitiveType::Date32 => 4,
            PrimitiveType::Int64 | PrimitiveType::Float64 | PrimitiveType::Timestamp => 8,
            PrimitiveType::String | PrimitiveType::Binary => 4,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema;

    fn encode(buffer: &ColumnBuffer) -> (Vec<EncodedStream>, Vec<ColumnEncoding>) {
        let mut streams = Vec::new();
        let mut encodings = Vec::new();
        buffer.encode(0.8, None, &mut streams, &mut encodings).unwrap();
        (streams, encodings)
    }

    #[test]
    fn test_estimated_size() {
        let schema = parse_schema("struct<id:bigint,name:string,flag:boolean>").unwrap();
        let mut buffer = ColumnBuffer::new(&schema.root);
        buffer
            .append_row(&[OrcValue::Int64(1), OrcValue::from("abc"), OrcValue::Null])
            .unwrap();
        // 8 + (3 + 4) + 0
        assert_eq!(buffer.estimated_size(), 15);
        assert_eq!(buffer.len(), 1);

        buffer.reset();
        assert_eq!(buffer.estimated_size(), 0);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_present_stream_only_with_nulls() {
        let schema = parse_schema("struct<a:int,b:int>").unwrap();
        let mut buffer = ColumnBuffer::new(&schema.root);
        buffer.append_row(&[OrcValue::Int32(1), OrcValue::Int32(2)]).unwrap();
        buffer.append_row(&[OrcValue::Int32(3), OrcValue::Null]).unwrap();

        let (streams, encodings) = encode(&buffer);
        assert_eq!(encodings.len(), 3);
        let present: Vec<usize> = streams
            .iter()
            .filter(|s| s.kind == StreamKind::Present)
            .map(|s| s.column)
            .collect();
        assert_eq!(present, vec![2]);
    }

    #[test]
    fn test_null_parent_hides_children() {
        let schema = parse_schema("struct<tags:list<string>>").unwrap();
        let mut buffer = ColumnBuffer::new(&schema.root);
        buffer
            .append_row(&[OrcValue::List(vec![OrcValue::from("a"), OrcValue::from("b")])])
            .unwrap();
        buffer.append_row(&[OrcValue::Null]).unwrap();
        buffer.append_row(&[OrcValue::List(vec![])]).unwrap();

        let list = &buffer.children[0];
        assert_eq!(list.len(), 3);
        assert_eq!(list.children[0].len(), 2);

        let mut stats = Vec::new();
        buffer.collect_statistics(&mut stats);
        assert_eq!(stats[1].null_count, 1);
        assert_eq!(stats[2].count, 2);
    }

    #[test]
    fn test_string_dictionary_choice() {
        let schema = parse_schema("struct<color:string>").unwrap();
        let mut buffer = ColumnBuffer::new(&schema.root);
        for color in ["red", "red", "blue", "red", "blue"] {
            buffer.append_row(&[OrcValue::from(color)]).unwrap();
        }
        let (streams, encodings) = encode(&buffer);
        assert_eq!(encodings[1], ColumnEncoding::Dictionary { size: 2 });
        assert!(streams
            .iter()
            .any(|s| s.column == 1 && s.kind == StreamKind::DictionaryData));
    }

    #[test]
    fn test_cancelled_encode() {
        let schema = parse_schema("struct<a:int>").unwrap();
        let mut buffer = ColumnBuffer::new(&schema.root);
        buffer.append_row(&[OrcValue::Int32(1)]).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let mut streams = Vec::new();
        let mut encodings = Vec::new();
        let err = buffer
            .encode(0.8, Some(&token), &mut streams, &mut encodings)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(buffer.len(), 1);
    }
}
