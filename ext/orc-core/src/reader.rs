//! Core ORC reading functionality

use bytes::Bytes;
use indexmap::IndexMap;
use log::debug;

use crate::cancel::CancellationToken;
use crate::chunk_reader::ChunkReader;
use crate::compression::{codec_for_kind, Codec, CompressionKind};
use crate::footer::{FileFooter, Postscript, MAGIC, MIN_POSTSCRIPT_LENGTH};
use crate::statistics::ColumnStatistics;
use crate::stripe::{StripeInformation, StripeRows};
use crate::traits::SchemaInspector;
use crate::{ErrorContext, OrcError, OrcValue, Result, Schema};

/// File-level information decoded once when the reader is opened
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub schema: Schema,
    pub stripe_count: usize,
    pub row_count: u64,
    /// One entry per column, in column order
    pub column_statistics: Vec<ColumnStatistics>,
    pub compression: CompressionKind,
    /// Format version, `(major, minor)`
    pub version: (u8, u8),
    /// Identification of the library that wrote the file
    pub writer: String,
    pub user_metadata: IndexMap<String, Bytes>,
}

/// Builder for opening a configured Reader
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    verify_checksums: bool,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            verify_checksums: true,
        }
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check each stripe's CRC32 before decoding it (on by default)
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Open `input`, reading and validating the postscript and file footer
    pub fn open<R: ChunkReader>(self, input: R) -> Result<Reader<R>> {
        let len = input.len();
        let header_len = MAGIC.len() as u64;
        if len < header_len || input.get_bytes(0, MAGIC.len())?.as_ref() != MAGIC {
            return Err(OrcError::NotAnOrcFile);
        }
        if len < header_len + 1 + MIN_POSTSCRIPT_LENGTH as u64 {
            return Err(OrcError::TruncatedFile(format!(
                "{} bytes is too short for an ORC file",
                len
            )));
        }

        let postscript_len = input.get_bytes(len - 1, 1)?[0] as u64;
        if postscript_len < MIN_POSTSCRIPT_LENGTH as u64 || postscript_len + 1 + header_len > len {
            return Err(OrcError::TruncatedFile(format!(
                "invalid postscript length {}",
                postscript_len
            )));
        }
        let postscript_start = len - 1 - postscript_len;
        let postscript =
            Postscript::read_from(input.get_bytes(postscript_start, postscript_len as usize)?)?;

        if postscript.footer_length > postscript_start - header_len {
            return Err(OrcError::TruncatedFile(format!(
                "footer of {} bytes does not fit before offset {}",
                postscript.footer_length, postscript_start
            )));
        }
        let footer_start = postscript_start - postscript.footer_length;
        let footer_chunk = input.get_bytes(footer_start, postscript.footer_length as usize)?;

        let codec = codec_for_kind(postscript.compression);
        let footer = codec
            .decompress_chunk(footer_chunk)
            .and_then(|mut bytes| FileFooter::read_from(&mut bytes))
            .map_err(|e| OrcError::CorruptFooter(e.to_string()))?;
        footer.validate(footer_start)?;

        debug!(
            "opened ORC file: {} rows in {} stripes, {} compression, written by {}",
            footer.row_count,
            footer.stripes.len(),
            postscript.compression,
            footer.writer
        );

        let metadata = FileMetadata {
            schema: footer.schema,
            stripe_count: footer.stripes.len(),
            row_count: footer.row_count,
            column_statistics: footer.statistics,
            compression: postscript.compression,
            version: postscript.version,
            writer: footer.writer,
            user_metadata: footer.metadata,
        };

        Ok(Reader {
            input,
            metadata,
            stripes: footer.stripes,
            stripe_statistics: footer.stripe_statistics,
            codec,
            verify_checksums: self.verify_checksums,
        })
    }
}

/// Core ORC reader over any random-access input
///
/// All reads take `&self`; a reader can be shared between threads to decode
/// different stripes concurrently.
pub struct Reader<R> {
    input: R,
    metadata: FileMetadata,
    stripes: Vec<StripeInformation>,
    stripe_statistics: Vec<Vec<ColumnStatistics>>,
    codec: Box<dyn Codec>,
    verify_checksums: bool,
}

impl<R> Reader<R>
where
    R: ChunkReader,
{
    /// Open a reader with default settings
    pub fn open(input: R) -> Result<Self> {
        ReaderBuilder::new().open(input)
    }

    /// Get the file metadata; no I/O is performed
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &Schema {
        &self.metadata.schema
    }

    pub fn stripes(&self) -> &[StripeInformation] {
        &self.stripes
    }

    /// Column statistics of one stripe, in column order
    pub fn stripe_statistics(&self, stripe: usize) -> Result<&[ColumnStatistics]> {
        self.stripe_statistics
            .get(stripe)
            .map(Vec::as_slice)
            .ok_or(OrcError::IndexOutOfRange {
                index: stripe as u64,
                len: self.stripes.len() as u64,
            })
    }

    /// File statistics of the column at `path` (`""` is the root)
    pub fn column_statistics(&self, path: &str) -> Option<&ColumnStatistics> {
        let id = self.metadata.schema.column_id(path)?;
        self.metadata.column_statistics.get(id)
    }

    /// Decode the rows of one stripe
    pub fn read_stripe(&self, stripe: usize) -> Result<StripeRows> {
        self.open_stripe(stripe, None, None)
    }

    /// Decode only the named top-level columns of one stripe
    ///
    /// Rows hold the selected columns in schema order. Names that are not
    /// top-level columns are ignored.
    pub fn read_stripe_with_projection<S: AsRef<str>>(
        &self,
        stripe: usize,
        columns: &[S],
    ) -> Result<StripeRows> {
        let mask = self.projection_mask(columns);
        self.open_stripe(stripe, Some(&mask), None)
    }

    /// Decode one stripe, stopping with `Cancelled` once `token` is raised
    pub fn read_stripe_with_cancellation(
        &self,
        stripe: usize,
        token: CancellationToken,
    ) -> Result<StripeRows> {
        self.open_stripe(stripe, None, Some(token))
    }

    /// Read rows from all stripes in order
    pub fn read_rows(&self) -> RowIterator<'_, R> {
        RowIterator::new(self, None)
    }

    /// Read rows from all stripes, decoding only the named top-level columns
    pub fn read_rows_with_projection<S: AsRef<str>>(&self, columns: &[S]) -> RowIterator<'_, R> {
        RowIterator::new(self, Some(self.projection_mask(columns)))
    }

    /// Read the row with global index `row`
    ///
    /// Only the stripe holding the row is decoded.
    pub fn read_row(&self, row: u64) -> Result<Vec<OrcValue>> {
        let out_of_range = OrcError::IndexOutOfRange {
            index: row,
            len: self.metadata.row_count,
        };

        let mut first_row = 0u64;
        for (idx, stripe) in self.stripes.iter().enumerate() {
            if row < first_row + stripe.row_count {
                let skip = usize::try_from(row - first_row).map_err(|_| out_of_range)?;
                return match self.read_stripe(idx)?.nth(skip) {
                    Some(result) => result,
                    None => Err(OrcError::corrupt_stripe(idx, "stripe ended early")),
                };
            }
            first_row += stripe.row_count;
        }
        Err(out_of_range)
    }

    /// Consume the reader, returning the input
    pub fn into_inner(self) -> R {
        self.input
    }

    fn projection_mask<S: AsRef<str>>(&self, columns: &[S]) -> Vec<bool> {
        self.metadata
            .schema
            .top_level_fields()
            .iter()
            .map(|field| columns.iter().any(|c| c.as_ref() == field.name()))
            .collect()
    }

    fn open_stripe(
        &self,
        stripe: usize,
        projection: Option<&[bool]>,
        cancel: Option<CancellationToken>,
    ) -> Result<StripeRows> {
        let info = self.stripes.get(stripe).ok_or(OrcError::IndexOutOfRange {
            index: stripe as u64,
            len: self.stripes.len() as u64,
        })?;
        let length = usize::try_from(info.total_length())
            .map_err(|_| OrcError::corrupt_stripe(stripe, "stripe too large to address"))?;
        let bytes = self
            .input
            .get_bytes(info.offset, length)
            .with_context(|| format!("Failed to read stripe {}", stripe))?;

        if self.verify_checksums {
            let actual = crc32fast::hash(&bytes);
            if actual != info.checksum {
                return Err(OrcError::corrupt_stripe(
                    stripe,
                    format!(
                        "checksum mismatch: expected {:08x}, computed {:08x}",
                        info.checksum, actual
                    ),
                ));
            }
        }

        StripeRows::new(
            stripe,
            bytes,
            info,
            &self.metadata.schema,
            self.codec.as_ref(),
            projection,
            cancel,
        )
    }
}

/// Iterator over the rows of every stripe in a file
///
/// Stripes are decoded one at a time as iteration reaches them. Iteration
/// ends after the first error.
pub struct RowIterator<'a, R> {
    reader: &'a Reader<R>,
    projection: Option<Vec<bool>>,
    next_stripe: usize,
    current: Option<StripeRows>,
    done: bool,
}

impl<'a, R: ChunkReader> RowIterator<'a, R> {
    fn new(reader: &'a Reader<R>, projection: Option<Vec<bool>>) -> Self {
        Self {
            reader,
            projection,
            next_stripe: 0,
            current: None,
            done: false,
        }
    }
}

impl<R> Iterator for RowIterator<'_, R>
where
    R: ChunkReader,
{
    type Item = Result<Vec<OrcValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(rows) = &mut self.current {
                match rows.next() {
                    Some(Ok(row)) => return Some(Ok(row)),
                    Some(Err(e)) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }

            if self.next_stripe >= self.reader.stripes.len() {
                self.done = true;
                return None;
            }
            match self
                .reader
                .open_stripe(self.next_stripe, self.projection.as_deref(), None)
            {
                Ok(rows) => {
                    self.current = Some(rows);
                    self.next_stripe += 1;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
