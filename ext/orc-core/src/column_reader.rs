//! Read-side column decoders.
//!
//! A [`RowReader`] is the mirror of the write-side buffer tree: one
//! [`ColumnReader`] per decoded schema node, each pulling values from its
//! streams on demand.

use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::encoding::{
    BooleanDecoder, ColumnEncoding, FloatDecoder, IntegerDecoder, StreamKind, StringDecoder,
};
use crate::{OrcError, OrcValue, PrimitiveType, Result, Schema, SchemaNode};

/// Decompressed streams of one stripe, keyed by column and kind
#[derive(Debug, Default)]
pub(crate) struct StreamSet {
    streams: HashMap<(usize, StreamKind), Bytes>,
    encodings: Vec<ColumnEncoding>,
}

impl StreamSet {
    pub fn new(encodings: Vec<ColumnEncoding>) -> Self {
        Self {
            streams: HashMap::new(),
            encodings,
        }
    }

    pub fn insert(&mut self, column: usize, kind: StreamKind, data: Bytes) -> Result<()> {
        if self.streams.insert((column, kind), data).is_some() {
            return Err(OrcError::malformed(format!(
                "column {} has more than one {:?} stream",
                column, kind
            )));
        }
        Ok(())
    }

    fn take(&mut self, column: usize, kind: StreamKind) -> Option<Bytes> {
        self.streams.remove(&(column, kind))
    }

    fn require(&mut self, column: usize, kind: StreamKind) -> Result<Bytes> {
        self.take(column, kind).ok_or_else(|| {
            OrcError::malformed(format!("column {} is missing its {:?} stream", column, kind))
        })
    }

    fn encoding(&self, column: usize) -> Result<ColumnEncoding> {
        self.encodings
            .get(column)
            .copied()
            .ok_or_else(|| OrcError::malformed(format!("no encoding recorded for column {}", column)))
    }
}

#[derive(Debug)]
enum Decoder {
    Boolean(BooleanDecoder),
    Integer(PrimitiveType, IntegerDecoder),
    Float32(FloatDecoder),
    Float64(FloatDecoder),
    String(StringDecoder),
    Binary(StringDecoder),
    Struct(Vec<ColumnReader>),
    List(IntegerDecoder, Box<ColumnReader>),
    Map(IntegerDecoder, Box<ColumnReader>, Box<ColumnReader>),
    Union(IntegerDecoder, Vec<ColumnReader>),
}

#[derive(Debug)]
pub(crate) struct ColumnReader {
    name: Arc<str>,
    present: Option<BooleanDecoder>,
    decoder: Decoder,
}

impl ColumnReader {
    fn build(node: &SchemaNode, next_id: &mut usize, streams: &mut StreamSet) -> Result<Self> {
        let column = *next_id;
        *next_id += 1;

        let present = streams.take(column, StreamKind::Present).map(BooleanDecoder::new);

        let decoder = match node {
            SchemaNode::Primitive { primitive_type, .. } => match primitive_type {
                PrimitiveType::Boolean => Decoder::Boolean(BooleanDecoder::new(
                    streams.require(column, StreamKind::Data)?,
                )),
                PrimitiveType::Float32 => {
                    Decoder::Float32(FloatDecoder::new(streams.require(column, StreamKind::Data)?))
                }
                PrimitiveType::Float64 => {
                    Decoder::Float64(FloatDecoder::new(streams.require(column, StreamKind::Data)?))
                }
                PrimitiveType::String => Decoder::String(string_decoder(column, streams)?),
                PrimitiveType::Binary => Decoder::Binary(string_decoder(column, streams)?),
                ty => Decoder::Integer(
                    *ty,
                    IntegerDecoder::new(streams.require(column, StreamKind::Data)?),
                ),
            },
            SchemaNode::Struct { fields, .. } => Decoder::Struct(
                fields
                    .iter()
                    .map(|f| Self::build(f, next_id, streams))
                    .collect::<Result<_>>()?,
            ),
            SchemaNode::List { item, .. } => {
                let lengths = IntegerDecoder::new(streams.require(column, StreamKind::Length)?);
                Decoder::List(lengths, Box::new(Self::build(item, next_id, streams)?))
            }
            SchemaNode::Map { key, value, .. } => {
                let lengths = IntegerDecoder::new(streams.require(column, StreamKind::Length)?);
                let key = Self::build(key, next_id, streams)?;
                let value = Self::build(value, next_id, streams)?;
                Decoder::Map(lengths, Box::new(key), Box::new(value))
            }
            SchemaNode::Union { variants, .. } => {
                let tags = IntegerDecoder::new(streams.require(column, StreamKind::Data)?);
                Decoder::Union(
                    tags,
                    variants
                        .iter()
                        .map(|v| Self::build(v, next_id, streams))
                        .collect::<Result<_>>()?,
                )
            }
        };

        Ok(Self {
            name: Arc::from(node.name()),
            present,
            decoder,
        })
    }

    pub fn next_value(&mut self) -> Result<OrcValue> {
        if let Some(present) = &mut self.present {
            if !present.next_value()? {
                return Ok(OrcValue::Null);
            }
        }

        Ok(match &mut self.decoder {
            Decoder::Boolean(d) => OrcValue::Boolean(d.next_value()?),
            Decoder::Integer(ty, d) => {
                let v = d.next_value()?;
                OrcValue::from_integer(*ty, v).ok_or_else(|| {
                    OrcError::malformed(format!("{} out of range for {}", v, ty.type_name()))
                })?
            }
            Decoder::Float32(d) => OrcValue::from(d.next_f32()?),
            Decoder::Float64(d) => OrcValue::from(d.next_f64()?),
            Decoder::String(d) => OrcValue::String(d.next_string()?),
            Decoder::Binary(d) => OrcValue::Binary(d.next_bytes()?),
            Decoder::Struct(fields) => {
                let mut record = IndexMap::with_capacity(fields.len());
                for field in fields.iter_mut() {
                    let value = field.next_value()?;
                    record.insert(field.name.clone(), value);
                }
                OrcValue::Record(record)
            }
            Decoder::List(lengths, item) => {
                let len = lengths.next_len()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(item.next_value()?);
                }
                OrcValue::List(items)
            }
            Decoder::Map(lengths, key, value) => {
                let len = lengths.next_len()?;
                let mut entries = Vec::new();
                for _ in 0..len {
                    entries.push((key.next_value()?, value.next_value()?));
                }
                OrcValue::Map(entries)
            }
            Decoder::Union(tags, variants) => {
                let tag = tags.next_value()?;
                let variant = usize::try_from(tag)
                    .ok()
                    .and_then(|t| variants.get_mut(t))
                    .ok_or_else(|| OrcError::malformed(format!("union tag {} out of range", tag)))?;
                OrcValue::Union(tag as u8, Box::new(variant.next_value()?))
            }
        })
    }
}

fn string_decoder(column: usize, streams: &mut StreamSet) -> Result<StringDecoder> {
    let data = streams.require(column, StreamKind::Data)?;
    let lengths = streams.require(column, StreamKind::Length)?;
    match streams.encoding(column)? {
        ColumnEncoding::Direct => Ok(StringDecoder::direct(data, lengths)),
        ColumnEncoding::Dictionary { size } => {
            let dictionary = streams.require(column, StreamKind::DictionaryData)?;
            StringDecoder::dictionary(data, dictionary, lengths, size as usize)
        }
    }
}

/// Decodes whole rows, optionally restricted to some top-level columns
#[derive(Debug)]
pub(crate) struct RowReader {
    columns: Vec<ColumnReader>,
}

impl RowReader {
    /// `projection` holds one flag per top-level column; `None` decodes all
    pub fn new(schema: &Schema, streams: &mut StreamSet, projection: Option<&[bool]>) -> Result<Self> {
        let selected =
            |idx: usize| projection.map_or(true, |mask| mask.get(idx).copied().unwrap_or(false));

        let mut next_id = 0;
        let mut columns = Vec::new();
        match &schema.root {
            SchemaNode::Struct { fields, .. } => {
                next_id += 1;
                for (idx, field) in fields.iter().enumerate() {
                    if selected(idx) {
                        columns.push(ColumnReader::build(field, &mut next_id, streams)?);
                    } else {
                        next_id += field.column_count();
                    }
                }
            }
            root => {
                if selected(0) {
                    columns.push(ColumnReader::build(root, &mut next_id, streams)?);
                }
            }
        }
        Ok(Self { columns })
    }

    pub fn next_row(&mut self) -> Result<Vec<OrcValue>> {
        self.columns.iter_mut().map(ColumnReader::next_value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_buffer::ColumnBuffer;
    use crate::parser::parse_schema;

    fn streams_for(schema: &Schema, rows: &[Vec<OrcValue>]) -> StreamSet {
        let mut buffer = ColumnBuffer::new(&schema.root);
        for row in rows {
            buffer.append_row(row).unwrap();
        }
        let mut encoded = Vec::new();
        let mut encodings = Vec::new();
        buffer.encode(0.8, None, &mut encoded, &mut encodings).unwrap();

        let mut streams = StreamSet::new(encodings);
        for s in encoded {
            streams.insert(s.column, s.kind, Bytes::from(s.data)).unwrap();
        }
        streams
    }

    #[test]
    fn test_nested_rows_decode() {
        let schema =
            parse_schema("struct<id:int,tags:list<string>,attrs:map<string,double>>").unwrap();
        let rows = vec![
            vec![
                OrcValue::Int32(1),
                OrcValue::List(vec![OrcValue::from("a"), OrcValue::Null]),
                OrcValue::Map(vec![(OrcValue::from("x"), OrcValue::from(1.5))]),
            ],
            vec![OrcValue::Int32(2), OrcValue::Null, OrcValue::Map(vec![])],
        ];
        let mut streams = streams_for(&schema, &rows);
        let mut reader = RowReader::new(&schema, &mut streams, None).unwrap();
        assert_eq!(reader.next_row().unwrap(), rows[0]);
        assert_eq!(reader.next_row().unwrap(), rows[1]);
        assert!(reader.next_row().is_err());
    }

    #[test]
    fn test_projection_skips_columns() {
        let schema = parse_schema("struct<a:int,b:struct<c:string,d:int>,e:boolean>").unwrap();
        let rows = vec![vec![
            OrcValue::Int32(7),
            OrcValue::record([("c", OrcValue::from("s")), ("d", OrcValue::Int32(8))]),
            OrcValue::Boolean(true),
        ]];
        let mut streams = streams_for(&schema, &rows);
        let mut reader =
            RowReader::new(&schema, &mut streams, Some(&[false, false, true])).unwrap();
        assert_eq!(reader.next_row().unwrap(), vec![OrcValue::Boolean(true)]);
    }

    #[test]
    fn test_missing_stream_is_reported() {
        let schema = parse_schema("struct<a:int>").unwrap();
        let mut streams = StreamSet::new(vec![ColumnEncoding::Direct; 2]);
        let err = RowReader::new(&schema, &mut streams, None).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
