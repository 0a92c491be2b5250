//! String and binary column encoding.
//!
//! Strings use a per-stripe dictionary when the column repeats itself enough,
//! otherwise they (and binary columns) are written directly as concatenated
//! bytes with an integer-encoded LENGTH stream.

use bytes::Bytes;
use indexmap::IndexSet;
use log::trace;
use std::sync::Arc;

use super::integer::{encode_integers, IntegerDecoder};
use super::varint::take_bytes;
use super::ColumnEncoding;
use crate::{OrcError, Result};

/// The streams produced for one string or binary column
#[derive(Debug, Default)]
pub struct EncodedStrings {
    pub encoding: ColumnEncoding,
    pub data: Vec<u8>,
    pub length: Vec<u8>,
    pub dictionary: Option<Vec<u8>>,
}

/// Encode `values`, choosing dictionary encoding when
/// `distinct / values.len() <= threshold`. A threshold of zero disables it.
pub fn encode_strings(values: &[&[u8]], threshold: f64) -> EncodedStrings {
    if values.is_empty() || threshold <= 0.0 {
        return encode_direct(values);
    }

    let mut dictionary: IndexSet<&[u8]> = IndexSet::new();
    let mut indices = Vec::with_capacity(values.len());
    for v in values {
        let (idx, _) = dictionary.insert_full(*v);
        indices.push(idx as i64);
    }

    let ratio = dictionary.len() as f64 / values.len() as f64;
    if ratio > threshold {
        trace!(
            "direct string encoding: {} distinct of {} values",
            dictionary.len(),
            values.len()
        );
        return encode_direct(values);
    }
    trace!(
        "dictionary string encoding: {} distinct of {} values",
        dictionary.len(),
        values.len()
    );

    let mut data = Vec::new();
    encode_integers(&indices, &mut data);

    let lengths: Vec<i64> = dictionary.iter().map(|e| e.len() as i64).collect();
    let mut length = Vec::new();
    encode_integers(&lengths, &mut length);

    let entries = dictionary.iter().flat_map(|e| e.iter().copied()).collect();

    EncodedStrings {
        encoding: ColumnEncoding::Dictionary {
            size: dictionary.len() as u32,
        },
        data,
        length,
        dictionary: Some(entries),
    }
}

/// Direct encoding: concatenated bytes plus lengths
pub fn encode_direct(values: &[&[u8]]) -> EncodedStrings {
    let data = values.iter().flat_map(|v| v.iter().copied()).collect();
    let lengths: Vec<i64> = values.iter().map(|v| v.len() as i64).collect();
    let mut length = Vec::new();
    encode_integers(&lengths, &mut length);

    EncodedStrings {
        encoding: ColumnEncoding::Direct,
        data,
        length,
        dictionary: None,
    }
}

/// Streaming decoder over either string layout
#[derive(Debug)]
pub enum StringDecoder {
    Direct {
        data: Bytes,
        lengths: IntegerDecoder,
    },
    Dictionary {
        indices: IntegerDecoder,
        entries: Vec<Bytes>,
    },
}

impl StringDecoder {
    pub fn direct(data: Bytes, lengths: Bytes) -> Self {
        StringDecoder::Direct {
            data,
            lengths: IntegerDecoder::new(lengths),
        }
    }

    /// Build a dictionary decoder, splitting the `size` entries up front
    pub fn dictionary(indices: Bytes, mut entries: Bytes, lengths: Bytes, size: usize) -> Result<Self> {
        // entries are distinct, so at most one of them is empty
        if size > entries.len().saturating_add(1) {
            return Err(OrcError::malformed(format!(
                "dictionary of {} entries cannot fit in {} bytes",
                size,
                entries.len()
            )));
        }
        let mut length_decoder = IntegerDecoder::new(lengths);
        let mut dictionary = Vec::with_capacity(size.min(1024));
        for _ in 0..size {
            let len = length_decoder.next_len()?;
            dictionary.push(take_bytes(&mut entries, len)?);
        }
        if !entries.is_empty() {
            return Err(OrcError::malformed(format!(
                "{} trailing bytes after dictionary entries",
                entries.len()
            )));
        }
        Ok(StringDecoder::Dictionary {
            indices: IntegerDecoder::new(indices),
            entries: dictionary,
        })
    }

    pub fn next_bytes(&mut self) -> Result<Bytes> {
        match self {
            StringDecoder::Direct { data, lengths } => {
                let len = lengths.next_len()?;
                take_bytes(data, len)
            }
            StringDecoder::Dictionary { indices, entries } => {
                let idx = indices.next_len()?;
                entries.get(idx).cloned().ok_or_else(|| {
                    OrcError::malformed(format!(
                        "dictionary index {} out of range ({} entries)",
                        idx,
                        entries.len()
                    ))
                })
            }
        }
    }

    pub fn next_string(&mut self) -> Result<Arc<str>> {
        let bytes = self.next_bytes()?;
        std::str::from_utf8(&bytes)
            .map(Arc::from)
            .map_err(|e| OrcError::malformed(format!("invalid UTF-8 in string column: {}", e)))
    }
}
