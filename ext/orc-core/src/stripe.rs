//! Stripes: the stripe writer state machine, the stripe footer codec and
//! the row iterator over a decoded stripe.

use bytes::{BufMut, Bytes};
use log::debug;

use crate::cancel::CancellationToken;
use crate::column_buffer::{ColumnBuffer, EncodedStream};
use crate::column_reader::{RowReader, StreamSet};
use crate::compression::Codec;
use crate::encoding::varint::{get_len, get_u32_le, get_u8, get_varint, put_varint};
use crate::encoding::{ColumnEncoding, StreamKind};
use crate::statistics::ColumnStatistics;
use crate::{ErrorContext, OrcError, OrcValue, Result, Schema};

/// Location and shape of one stripe, as recorded in the file footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeInformation {
    /// Absolute offset of the stripe's first byte
    pub offset: u64,
    /// Bytes of stream data
    pub data_length: u64,
    /// Bytes of the (compressed) stripe footer following the data
    pub footer_length: u64,
    pub row_count: u64,
    /// CRC32 of the data and footer bytes
    pub checksum: u32,
}

impl StripeInformation {
    pub fn total_length(&self) -> u64 {
        self.data_length + self.footer_length
    }

    pub(crate) fn write_to<B: BufMut>(&self, buf: &mut B) {
        put_varint(buf, self.offset);
        put_varint(buf, self.data_length);
        put_varint(buf, self.footer_length);
        put_varint(buf, self.row_count);
        buf.put_u32_le(self.checksum);
    }

    pub(crate) fn read_from(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            offset: get_varint(buf)?,
            data_length: get_varint(buf)?,
            footer_length: get_varint(buf)?,
            row_count: get_varint(buf)?,
            checksum: get_u32_le(buf)?,
        })
    }
}

/// A stream's position inside its stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamInfo {
    pub column: usize,
    pub kind: StreamKind,
    /// Relative to the stripe start
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct StripeFooter {
    pub streams: Vec<StreamInfo>,
    pub encodings: Vec<ColumnEncoding>,
}

impl StripeFooter {
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        put_varint(buf, self.streams.len() as u64);
        for s in &self.streams {
            put_varint(buf, s.column as u64);
            buf.put_u8(s.kind.as_u8());
            put_varint(buf, s.offset);
            put_varint(buf, s.length);
        }
        put_varint(buf, self.encodings.len() as u64);
        for e in &self.encodings {
            match e {
                ColumnEncoding::Direct => buf.put_u8(0),
                ColumnEncoding::Dictionary { size } => {
                    buf.put_u8(1);
                    put_varint(buf, *size as u64);
                }
            }
        }
    }

    pub fn read_from(buf: &mut Bytes) -> Result<Self> {
        let stream_count = get_len(buf)?;
        let mut streams = Vec::with_capacity(stream_count.min(1024));
        for _ in 0..stream_count {
            streams.push(StreamInfo {
                column: get_len(buf)?,
                kind: StreamKind::try_from(get_u8(buf)?)?,
                offset: get_varint(buf)?,
                length: get_varint(buf)?,
            });
        }

        let encoding_count = get_len(buf)?;
        let mut encodings = Vec::with_capacity(encoding_count.min(1024));
        for _ in 0..encoding_count {
            encodings.push(match get_u8(buf)? {
                0 => ColumnEncoding::Direct,
                1 => {
                    let size = get_varint(buf)?;
                    ColumnEncoding::Dictionary {
                        size: u32::try_from(size).map_err(|_| {
                            OrcError::malformed(format!("dictionary size {} too large", size))
                        })?,
                    }
                }
                other => {
                    return Err(OrcError::malformed(format!(
                        "unknown column encoding {}",
                        other
                    )))
                }
            });
        }

        if !buf.is_empty() {
            return Err(OrcError::malformed(format!(
                "{} trailing bytes after stripe footer",
                buf.len()
            )));
        }
        Ok(Self { streams, encodings })
    }
}

/// Lifecycle of the stripe being assembled by a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeState {
    /// No rows buffered
    Empty,
    /// Rows buffered, below the flush threshold
    Accumulating,
    /// The buffered rows are being encoded and written
    Flushing,
}

/// A fully encoded stripe, ready to be written in one piece
#[derive(Debug)]
pub(crate) struct EncodedStripe {
    pub bytes: Vec<u8>,
    pub information: StripeInformation,
    pub statistics: Vec<ColumnStatistics>,
}

/// Accumulates rows for the current stripe and encodes them on flush
#[derive(Debug)]
pub(crate) struct StripeWriter {
    columns: ColumnBuffer,
    state: StripeState,
    codec: Box<dyn Codec>,
    dictionary_threshold: f64,
    rows: u64,
}

impl StripeWriter {
    pub fn new(schema: &Schema, codec: Box<dyn Codec>, dictionary_threshold: f64) -> Self {
        Self {
            columns: ColumnBuffer::new(&schema.root),
            state: StripeState::Empty,
            codec,
            dictionary_threshold,
            rows: 0,
        }
    }

    pub fn state(&self) -> StripeState {
        self.state
    }

    pub fn buffered_rows(&self) -> u64 {
        self.rows
    }

    pub fn estimated_size(&self) -> usize {
        self.columns.estimated_size()
    }

    /// Append a row that has already been validated against the schema
    pub fn add_row(&mut self, row: &[OrcValue]) -> Result<()> {
        self.columns.append_row(row)?;
        self.rows += 1;
        self.state = StripeState::Accumulating;
        Ok(())
    }

    /// Statistics of the buffered rows, one entry per column
    pub fn statistics(&self) -> Vec<ColumnStatistics> {
        let mut stats = Vec::new();
        self.columns.collect_statistics(&mut stats);
        stats
    }

    /// Encode the buffered rows into a stripe placed at `offset`
    ///
    /// Nothing is reset here: the caller calls [`StripeWriter::reset`] once
    /// the bytes are durably handed to the output. On error the buffered
    /// rows stay as they were.
    pub fn encode(&mut self, offset: u64, cancel: Option<&CancellationToken>) -> Result<EncodedStripe> {
        self.state = StripeState::Flushing;
        let encoded = self.encode_buffered(offset, cancel);
        if encoded.is_err() {
            self.state = StripeState::Accumulating;
        }
        encoded
    }

    fn encode_buffered(
        &self,
        offset: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<EncodedStripe> {
        let mut streams: Vec<EncodedStream> = Vec::new();
        let mut encodings = Vec::new();
        self.columns
            .encode(self.dictionary_threshold, cancel, &mut streams, &mut encodings)?;

        let mut bytes = Vec::new();
        let mut footer = StripeFooter {
            streams: Vec::with_capacity(streams.len()),
            encodings,
        };
        for stream in streams {
            let chunk = self
                .codec
                .compress_chunk(&stream.data)
                .map_err(|e| OrcError::EncodeFailure {
                    column: stream.column,
                    reason: e.to_string(),
                })?;
            footer.streams.push(StreamInfo {
                column: stream.column,
                kind: stream.kind,
                offset: bytes.len() as u64,
                length: chunk.len() as u64,
            });
            bytes.extend_from_slice(&chunk);
        }
        let data_length = bytes.len() as u64;

        let mut footer_bytes = Vec::new();
        footer.write_to(&mut footer_bytes);
        let footer_chunk = self
            .codec
            .compress_chunk(&footer_bytes)
            .context("Failed to compress stripe footer")?;
        bytes.extend_from_slice(&footer_chunk);

        let information = StripeInformation {
            offset,
            data_length,
            footer_length: footer_chunk.len() as u64,
            row_count: self.rows,
            checksum: crc32fast::hash(&bytes),
        };
        debug!(
            "encoded stripe at offset {}: {} rows, {} streams, {} bytes",
            offset,
            self.rows,
            footer.streams.len(),
            bytes.len()
        );

        Ok(EncodedStripe {
            bytes,
            information,
            statistics: self.statistics(),
        })
    }

    /// Drop the buffered rows after a successful flush
    pub fn reset(&mut self) {
        self.columns.reset();
        self.rows = 0;
        self.state = StripeState::Empty;
    }
}

/// Rows of one stripe, decoded lazily
///
/// Yields `Err` at most once; after an error (or cancellation) the iterator
/// is exhausted.
#[derive(Debug)]
pub struct StripeRows {
    stripe: usize,
    remaining: u64,
    rows: RowReader,
    cancel: Option<CancellationToken>,
    done: bool,
}

impl StripeRows {
    /// Decode the stripe layout from its raw bytes (data plus footer)
    pub(crate) fn new(
        stripe: usize,
        bytes: Bytes,
        information: &StripeInformation,
        schema: &Schema,
        codec: &dyn Codec,
        projection: Option<&[bool]>,
        cancel: Option<CancellationToken>,
    ) -> Result<Self> {
        let corrupt = |e: OrcError| match e {
            OrcError::Cancelled => e,
            other => OrcError::corrupt_stripe(stripe, other.to_string()),
        };

        let data_length = usize::try_from(information.data_length)
            .map_err(|_| OrcError::corrupt_stripe(stripe, "data length overflows"))?;
        if data_length > bytes.len() {
            return Err(OrcError::corrupt_stripe(
                stripe,
                "data length exceeds stripe length",
            ));
        }
        let data = bytes.slice(..data_length);
        let mut footer_bytes = codec
            .decompress_chunk(bytes.slice(data_length..))
            .map_err(corrupt)?;
        let footer = StripeFooter::read_from(&mut footer_bytes).map_err(corrupt)?;

        let mut streams = StreamSet::new(footer.encodings);
        for s in &footer.streams {
            let in_bounds = s
                .offset
                .checked_add(s.length)
                .is_some_and(|end| end <= information.data_length);
            if !in_bounds {
                return Err(OrcError::corrupt_stripe(
                    stripe,
                    format!(
                        "stream {:?} of column {} ({}+{}) lies outside the stripe data",
                        s.kind, s.column, s.offset, s.length
                    ),
                ));
            }
            let chunk = data.slice(s.offset as usize..(s.offset + s.length) as usize);
            let decompressed = codec.decompress_chunk(chunk).map_err(corrupt)?;
            streams
                .insert(s.column, s.kind, decompressed)
                .map_err(corrupt)?;
        }

        let rows = RowReader::new(schema, &mut streams, projection).map_err(corrupt)?;
        debug!(
            "decoded stripe {} layout: {} streams, {} rows",
            stripe,
            footer.streams.len(),
            information.row_count
        );

        Ok(Self {
            stripe,
            remaining: information.row_count,
            rows,
            cancel,
            done: false,
        })
    }

    /// Index of the stripe within its file
    pub fn stripe_index(&self) -> usize {
        self.stripe
    }

    /// Rows not yet yielded
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for StripeRows {
    type Item = Result<Vec<OrcValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }
        if let Some(token) = &self.cancel {
            if let Err(e) = token.check() {
                self.done = true;
                return Some(Err(e));
            }
        }

        match self.rows.next_row() {
            Ok(row) => {
                self.remaining -= 1;
                Some(Ok(row))
            }
            Err(e) => {
                self.done = true;
                Some(Err(OrcError::corrupt_stripe(self.stripe, e.to_string())))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (0, Some(remaining))
    }
}
