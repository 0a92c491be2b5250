//! Test utilities for orc-core

use bytes::Bytes;
use std::io::{self, Write};

use crate::{OrcValue, Schema, WriterBuilder};

/// Three-row `struct<name:string,age:bigint,active:boolean>` schema
pub fn people_schema() -> Schema {
    Schema::parse("struct<name:string,age:bigint,active:boolean>").unwrap()
}

pub fn people_rows() -> Vec<Vec<OrcValue>> {
    vec![
        vec![
            OrcValue::from("Alice"),
            OrcValue::Int64(30),
            OrcValue::Boolean(true),
        ],
        vec![
            OrcValue::from("Bob"),
            OrcValue::Int64(25),
            OrcValue::Boolean(false),
        ],
        vec![
            OrcValue::from("Charlie"),
            OrcValue::Int64(35),
            OrcValue::Boolean(true),
        ],
    ]
}

/// Write `rows` with the configured builder and return the file bytes
pub fn write_to_bytes(builder: WriterBuilder, schema: Schema, rows: Vec<Vec<OrcValue>>) -> Bytes {
    let mut writer = builder.build(Vec::new(), schema).unwrap();
    writer.write_rows(rows).unwrap();
    Bytes::from(writer.into_inner().unwrap())
}

/// Output that accepts `limit` bytes and then fails every write
#[derive(Debug)]
pub struct FailingWriter {
    written: Vec<u8>,
    limit: usize,
}

impl FailingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            written: Vec::new(),
            limit,
        }
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit - self.written.len();
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "output is full"));
        }
        let n = buf.len().min(room);
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test_utils_tests {
    use super::*;
    use crate::Reader;

    #[test]
    fn test_failing_writer() {
        let mut out = FailingWriter::new(4);
        assert!(out.write_all(b"ORC").is_ok());
        assert!(out.write_all(b"xy").is_err());
        assert_eq!(out.written(), b"ORCx");
    }

    #[test]
    fn test_write_to_bytes() {
        let bytes = write_to_bytes(WriterBuilder::new(), people_schema(), people_rows());
        let reader = Reader::open(bytes).unwrap();
        assert_eq!(reader.metadata().row_count, 3);
    }
}
