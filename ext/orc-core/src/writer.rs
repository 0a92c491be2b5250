//! Core ORC writing functionality

use bytes::Bytes;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::io::Write;

use crate::cancel::CancellationToken;
use crate::compression::{create_codec, Codec, Compression};
use crate::footer::{FileFooter, Postscript, MAGIC, WRITER_NAME};
use crate::statistics::ColumnStatistics;
use crate::stripe::{StripeInformation, StripeState, StripeWriter};
use crate::value::normalize_value;
use crate::{ErrorContext, OrcError, OrcValue, Result, Schema};

// Default configuration constants
pub const DEFAULT_STRIPE_SIZE: usize = 64 * 1024 * 1024; // 64MB
pub const DEFAULT_DICTIONARY_THRESHOLD: f64 = 0.8;

/// Builder for creating a configured Writer
#[derive(Debug, Clone)]
pub struct WriterBuilder {
    stripe_size: usize,
    stripe_row_limit: Option<u64>,
    compression: Compression,
    dictionary_threshold: f64,
    metadata: IndexMap<String, Bytes>,
    cancel: Option<CancellationToken>,
}

impl Default for WriterBuilder {
    fn default() -> Self {
        Self {
            stripe_size: DEFAULT_STRIPE_SIZE,
            stripe_row_limit: None,
            compression: Compression::None,
            dictionary_threshold: DEFAULT_DICTIONARY_THRESHOLD,
            metadata: IndexMap::new(),
            cancel: None,
        }
    }
}

impl WriterBuilder {
    /// Create a new WriterBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the estimated stripe size, in bytes, at which a stripe is flushed
    pub fn with_stripe_size(mut self, bytes: usize) -> Self {
        self.stripe_size = bytes;
        self
    }

    /// Also flush a stripe once it holds this many rows
    pub fn with_stripe_row_limit(mut self, rows: u64) -> Self {
        self.stripe_row_limit = Some(rows);
        self
    }

    /// Set the compression algorithm
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the distinct/non-null ratio at or below which string columns are
    /// dictionary encoded. `0.0` disables dictionary encoding.
    pub fn with_dictionary_threshold(mut self, threshold: f64) -> Self {
        self.dictionary_threshold = threshold;
        self
    }

    /// Add a user metadata entry to the file footer
    pub fn with_metadata<K: Into<String>, V: Into<Bytes>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Observe `token` between rows and while encoding stripes
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build a Writer with the configured settings
    ///
    /// The file header is written immediately.
    pub fn build<W: Write + Send>(self, writer: W, schema: Schema) -> Result<Writer<W>> {
        if self.stripe_size == 0 {
            return Err(OrcError::invalid_argument("stripe size must be positive"));
        }
        if self.stripe_row_limit == Some(0) {
            return Err(OrcError::invalid_argument("stripe row limit must be positive"));
        }
        if !(0.0..=1.0).contains(&self.dictionary_threshold) {
            return Err(OrcError::invalid_argument(format!(
                "dictionary threshold must be within [0, 1], got {}",
                self.dictionary_threshold
            )));
        }
        schema.root.validate()?;

        let stripe = StripeWriter::new(
            &schema,
            create_codec(self.compression),
            self.dictionary_threshold,
        );
        let file_statistics = stripe.statistics();

        let mut writer = Writer {
            output: writer,
            footer_codec: create_codec(self.compression),
            schema,
            stripe,
            stripe_size: self.stripe_size,
            stripe_row_limit: self.stripe_row_limit,
            metadata: self.metadata,
            cancel: self.cancel,
            offset: 0,
            stripes: Vec::new(),
            file_statistics,
            stripe_statistics: Vec::new(),
            flushed_rows: 0,
            status: Status::Open,
        };
        writer.write_output(MAGIC).context("Failed to write file header")?;
        Ok(writer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Closed,
    /// An output write failed; the file cannot be completed
    Poisoned,
}

/// Core ORC writer that works with any type implementing Write
///
/// Rows are buffered column by column into the current stripe, which is
/// encoded and written in one piece once it reaches the configured size.
/// [`Writer::close`] must be called to write the file footer.
pub struct Writer<W: Write> {
    output: W,
    footer_codec: Box<dyn Codec>,
    schema: Schema,
    stripe: StripeWriter,
    stripe_size: usize,
    stripe_row_limit: Option<u64>,
    metadata: IndexMap<String, Bytes>,
    cancel: Option<CancellationToken>,
    offset: u64,
    stripes: Vec<StripeInformation>,
    file_statistics: Vec<ColumnStatistics>,
    stripe_statistics: Vec<Vec<ColumnStatistics>>,
    flushed_rows: u64,
    status: Status,
}

impl<W> Writer<W>
where
    W: Write + Send,
{
    /// Create a new writer with default settings
    pub fn new(writer: W, schema: Schema) -> Result<Self> {
        WriterBuilder::new().build(writer, schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Write a batch of rows
    pub fn write_rows<I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<OrcValue>>,
    {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Write a single row
    ///
    /// The row carries one value per top-level column. It is validated in
    /// full before anything is buffered, so a rejected row leaves the writer
    /// exactly as it was.
    pub fn write_row(&mut self, row: Vec<OrcValue>) -> Result<()> {
        self.ensure_open()?;
        self.check_cancelled()?;

        let fields = self.schema.top_level_fields();
        if row.len() != fields.len() {
            return Err(OrcError::RowArityMismatch {
                expected: fields.len(),
                actual: row.len(),
            });
        }
        let normalized = row
            .iter()
            .zip(fields)
            .map(|(value, field)| normalize_value(value, field, field.name()))
            .collect::<Result<Vec<_>>>()?;

        self.stripe.add_row(&normalized)?;

        if self.stripe_is_full() {
            self.flush_stripe()?;
        }
        Ok(())
    }

    /// Force a stripe boundary and flush the output
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.check_cancelled()?;
        self.flush_stripe()?;
        let flushed = self.output.flush();
        self.poison_on_error(flushed).context("Failed to flush output")
    }

    /// Close the writer and write the file footer
    ///
    /// Closing an already closed writer is a no-op. If the cancellation token
    /// was raised, rows not yet flushed are discarded, the footer still
    /// describes the stripes already written, and `Cancelled` is returned.
    pub fn close(&mut self) -> Result<()> {
        match self.status {
            Status::Closed => return Ok(()),
            Status::Poisoned => return Err(OrcError::WriterPoisoned),
            Status::Open => {}
        }

        let cancelled = self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
        if cancelled {
            if self.stripe.buffered_rows() > 0 {
                warn!(
                    "writer cancelled, discarding {} unflushed rows",
                    self.stripe.buffered_rows()
                );
            }
            self.stripe.reset();
        } else {
            self.flush_stripe()?;
        }

        self.write_tail()?;
        self.status = Status::Closed;
        info!(
            "closed ORC writer: {} rows in {} stripes, {} bytes",
            self.flushed_rows,
            self.stripes.len(),
            self.offset
        );

        if cancelled {
            Err(OrcError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Close the writer if needed and hand back the output
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        Ok(self.output)
    }

    /// Rows accepted so far, flushed or still buffered
    pub fn rows_written(&self) -> u64 {
        self.flushed_rows + self.stripe.buffered_rows()
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn buffered_rows(&self) -> u64 {
        self.stripe.buffered_rows()
    }

    /// Estimated encoded size of the open stripe
    pub fn buffered_size(&self) -> usize {
        self.stripe.estimated_size()
    }

    pub fn stripe_state(&self) -> StripeState {
        self.stripe.state()
    }

    /// File statistics so far, including the rows of the open stripe
    pub fn statistics(&self) -> Result<Vec<ColumnStatistics>> {
        let mut stats = self.file_statistics.clone();
        if self.stripe.buffered_rows() > 0 {
            merge_statistics(&mut stats, &self.stripe.statistics())?;
        }
        Ok(stats)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.status {
            Status::Open => Ok(()),
            Status::Closed => Err(OrcError::WriterClosed),
            Status::Poisoned => Err(OrcError::WriterPoisoned),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    fn stripe_is_full(&self) -> bool {
        self.stripe.estimated_size() >= self.stripe_size
            || self
                .stripe_row_limit
                .is_some_and(|limit| self.stripe.buffered_rows() >= limit)
    }

    /// Encode and write the open stripe, if it holds any rows
    fn flush_stripe(&mut self) -> Result<()> {
        if self.stripe.buffered_rows() == 0 {
            return Ok(());
        }

        let encoded = self.stripe.encode(self.offset, self.cancel.as_ref())?;
        let stripe = self.stripes.len();
        self.write_output(&encoded.bytes)
            .with_context(|| format!("Failed to write stripe {}", stripe))?;

        merge_statistics(&mut self.file_statistics, &encoded.statistics)?;
        self.stripe_statistics.push(encoded.statistics);
        self.stripes.push(encoded.information);
        self.flushed_rows += encoded.information.row_count;
        self.stripe.reset();

        debug!(
            "flushed stripe {}: {} rows, {} bytes at offset {}",
            self.stripes.len() - 1,
            encoded.information.row_count,
            encoded.bytes.len(),
            encoded.information.offset
        );
        Ok(())
    }

    fn write_tail(&mut self) -> Result<()> {
        let footer = FileFooter {
            header_length: MAGIC.len() as u64,
            content_length: self.offset - MAGIC.len() as u64,
            schema: self.schema.clone(),
            row_count: self.flushed_rows,
            stripes: self.stripes.clone(),
            statistics: self.file_statistics.clone(),
            stripe_statistics: self.stripe_statistics.clone(),
            metadata: self.metadata.clone(),
            writer: WRITER_NAME.to_string(),
        };
        let mut footer_bytes = Vec::new();
        footer.write_to(&mut footer_bytes);

        let mut tail = self.footer_codec.compress_chunk(&footer_bytes)?;
        let postscript_start = tail.len();
        Postscript::new(postscript_start as u64, self.footer_codec.kind()).write_to(&mut tail);
        let postscript_length = tail.len() - postscript_start;
        tail.push(postscript_length as u8);

        self.write_output(&tail).context("Failed to write file footer")?;
        let flushed = self.output.flush();
        self.poison_on_error(flushed).context("Failed to flush output")
    }

    fn write_output(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self.output.write_all(bytes);
        self.poison_on_error(written)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn poison_on_error(&mut self, result: std::io::Result<()>) -> Result<()> {
        if let Err(e) = result {
            warn!("ORC output failed, writer is now unusable: {}", e);
            self.status = Status::Poisoned;
            return Err(e.into());
        }
        Ok(())
    }
}

fn merge_statistics(into: &mut [ColumnStatistics], from: &[ColumnStatistics]) -> Result<()> {
    for (total, stripe) in into.iter_mut().zip(from) {
        total.merge(stripe)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema;
    use crate::test_utils::FailingWriter;

    fn people_schema() -> Schema {
        parse_schema("struct<name:string,age:int>").unwrap()
    }

    #[test]
    fn test_writer_creation() {
        let mut buffer = Vec::new();
        {
            let writer = Writer::new(&mut buffer, people_schema()).unwrap();
            assert_eq!(writer.stripe_state(), StripeState::Empty);
            assert_eq!(writer.rows_written(), 0);
        }
        assert_eq!(buffer, MAGIC.to_vec());
    }

    #[test]
    fn test_builder_rejects_bad_options() {
        for builder in [
            WriterBuilder::new().with_stripe_size(0),
            WriterBuilder::new().with_stripe_row_limit(0),
            WriterBuilder::new().with_dictionary_threshold(1.5),
            WriterBuilder::new().with_dictionary_threshold(f64::NAN),
        ] {
            let err = builder.build(Vec::new(), people_schema()).err().unwrap();
            assert!(matches!(err, OrcError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_rejected_row_leaves_buffers_untouched() {
        let mut writer = Writer::new(Vec::new(), people_schema()).unwrap();
        writer
            .write_row(vec![OrcValue::from("Alice"), OrcValue::Int32(30)])
            .unwrap();
        let size = writer.buffered_size();

        let err = writer.write_row(vec![OrcValue::from("Bob")]).unwrap_err();
        assert!(matches!(
            err,
            OrcError::RowArityMismatch {
                expected: 2,
                actual: 1
            }
        ));

        let err = writer
            .write_row(vec![OrcValue::from("Bob"), OrcValue::from("old")])
            .unwrap_err();
        assert!(matches!(err, OrcError::UnsupportedValueType { .. }));

        assert_eq!(writer.buffered_size(), size);
        assert_eq!(writer.buffered_rows(), 1);
    }

    #[test]
    fn test_row_limit_flushes_stripes() {
        let mut writer = WriterBuilder::new()
            .with_stripe_row_limit(10)
            .build(Vec::new(), people_schema())
            .unwrap();
        for i in 0..25 {
            writer
                .write_row(vec![OrcValue::from(format!("p{}", i)), OrcValue::Int32(i)])
                .unwrap();
        }
        assert_eq!(writer.stripe_count(), 2);
        assert_eq!(writer.buffered_rows(), 5);
        assert_eq!(writer.rows_written(), 25);

        let stats = writer.statistics().unwrap();
        assert_eq!(stats[2].count, 25);
        assert_eq!(stats[2].max(), Some(OrcValue::Int64(24)));
    }

    #[test]
    fn test_close_twice_and_write_after_close() {
        let mut writer = Writer::new(Vec::new(), people_schema()).unwrap();
        writer
            .write_row(vec![OrcValue::from("Alice"), OrcValue::Int32(30)])
            .unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(writer.stripe_count(), 1);

        let err = writer
            .write_row(vec![OrcValue::from("Bob"), OrcValue::Int32(25)])
            .unwrap_err();
        assert!(matches!(err, OrcError::WriterClosed));
    }

    #[test]
    fn test_output_failure_poisons_writer() {
        let mut writer = WriterBuilder::new()
            .with_stripe_row_limit(1)
            .build(FailingWriter::new(8), people_schema())
            .unwrap();
        let err = writer
            .write_row(vec![OrcValue::from("Alice"), OrcValue::Int32(30)])
            .unwrap_err();
        assert!(matches!(err.root(), OrcError::Io(_)));
        assert!(err.to_string().starts_with("Failed to write stripe 0"), "{}", err);

        let err = writer
            .write_row(vec![OrcValue::from("Bob"), OrcValue::Int32(25)])
            .unwrap_err();
        assert!(matches!(err, OrcError::WriterPoisoned));
        assert!(matches!(writer.close(), Err(OrcError::WriterPoisoned)));
    }

    #[test]
    fn test_footer_write_failure_is_reported() {
        let rows = vec![
            vec![OrcValue::from("Alice"), OrcValue::Int32(30)],
            vec![OrcValue::from("Bob"), OrcValue::Int32(25)],
        ];
        let mut complete = Writer::new(Vec::new(), people_schema()).unwrap();
        complete.write_rows(rows.clone()).unwrap();
        let total = complete.into_inner().unwrap().len();

        // room for the header and the stripe, but not the whole tail
        let mut writer = Writer::new(FailingWriter::new(total - 1), people_schema()).unwrap();
        writer.write_rows(rows).unwrap();
        let err = writer.close().unwrap_err();
        assert!(matches!(err.root(), OrcError::Io(_)));
        assert!(err.to_string().starts_with("Failed to write file footer"), "{}", err);
        assert_eq!(writer.stripe_count(), 1);
        assert!(matches!(writer.close(), Err(OrcError::WriterPoisoned)));
    }

    #[test]
    fn test_cancelled_write_is_rejected() {
        let token = CancellationToken::new();
        let mut writer = WriterBuilder::new()
            .with_cancellation(token.clone())
            .build(Vec::new(), people_schema())
            .unwrap();
        writer
            .write_row(vec![OrcValue::from("Alice"), OrcValue::Int32(30)])
            .unwrap();

        token.cancel();
        let err = writer
            .write_row(vec![OrcValue::from("Bob"), OrcValue::Int32(25)])
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(writer.buffered_rows(), 1);
        assert!(writer.flush().unwrap_err().is_cancelled());

        assert!(writer.close().unwrap_err().is_cancelled());
        assert_eq!(writer.stripe_count(), 0);
        assert_eq!(writer.rows_written(), 0);
        // closed despite the error
        writer.close().unwrap();
    }
}
