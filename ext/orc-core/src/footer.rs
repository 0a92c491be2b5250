//! The file tail: file footer and postscript.
//!
//! ```plain
//! | "ORC" | stripe 0 | ... | stripe N-1 | footer | postscript | postscript length (u8) |
//! ```
//!
//! The postscript is never compressed and ends with the magic bytes:
//!
//! ```plain
//! | footer length (varint) | compression (u8) | major (u8) | minor (u8) | "ORC" |
//! ```

use bytes::{BufMut, Bytes};
use indexmap::IndexMap;

use crate::compression::CompressionKind;
use crate::encoding::varint::{
    get_len, get_len_prefixed, get_string, get_u8, get_varint, put_len_prefixed, put_varint,
};
use crate::statistics::ColumnStatistics;
use crate::stripe::StripeInformation;
use crate::{OrcError, Result, Schema};

pub const MAGIC: &[u8; 3] = b"ORC";
pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 12;

/// Identification written into every file footer
pub const WRITER_NAME: &str = concat!("orc-core ", env!("CARGO_PKG_VERSION"));

/// Shortest possible postscript, not counting the trailing length byte
pub const MIN_POSTSCRIPT_LENGTH: usize = 1 + 1 + 2 + MAGIC.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Postscript {
    pub footer_length: u64,
    pub compression: CompressionKind,
    pub version: (u8, u8),
}

impl Postscript {
    pub fn new(footer_length: u64, compression: CompressionKind) -> Self {
        Self {
            footer_length,
            compression,
            version: (VERSION_MAJOR, VERSION_MINOR),
        }
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        put_varint(buf, self.footer_length);
        buf.put_u8(self.compression.as_u8());
        buf.put_u8(self.version.0);
        buf.put_u8(self.version.1);
        buf.put_slice(MAGIC);
    }

    /// Parse a postscript, excluding the final length byte of the file
    ///
    /// An unknown compression kind is reported as a corrupt footer, since
    /// the footer cannot be decoded without it.
    pub fn read_from(mut buf: Bytes) -> Result<Self> {
        if !buf.ends_with(MAGIC) {
            return Err(OrcError::TruncatedFile(
                "postscript does not end with the ORC magic".to_string(),
            ));
        }
        buf.truncate(buf.len() - MAGIC.len());

        let corrupt = |e: OrcError| OrcError::CorruptFooter(format!("postscript: {}", e));
        let footer_length = get_varint(&mut buf).map_err(corrupt)?;
        let compression_byte = get_u8(&mut buf).map_err(corrupt)?;
        let major = get_u8(&mut buf).map_err(corrupt)?;
        let minor = get_u8(&mut buf).map_err(corrupt)?;

        if major != VERSION_MAJOR {
            return Err(OrcError::UnsupportedVersion { major, minor });
        }
        let compression = CompressionKind::from_u8(compression_byte).ok_or_else(|| {
            OrcError::CorruptFooter(format!("unknown compression kind {}", compression_byte))
        })?;
        if !buf.is_empty() {
            return Err(OrcError::CorruptFooter(format!(
                "{} unexpected bytes in postscript",
                buf.len()
            )));
        }

        Ok(Self {
            footer_length,
            compression,
            version: (major, minor),
        })
    }
}

/// Everything the file footer records
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FileFooter {
    pub header_length: u64,
    pub content_length: u64,
    pub schema: Schema,
    pub row_count: u64,
    pub stripes: Vec<StripeInformation>,
    /// One entry per column, merged over all stripes
    pub statistics: Vec<ColumnStatistics>,
    /// One list of column statistics per stripe
    pub stripe_statistics: Vec<Vec<ColumnStatistics>>,
    pub metadata: IndexMap<String, Bytes>,
    pub writer: String,
}

impl FileFooter {
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        put_varint(buf, self.header_length);
        put_varint(buf, self.content_length);
        put_len_prefixed(buf, self.schema.to_string().as_bytes());
        put_varint(buf, self.row_count);

        put_varint(buf, self.stripes.len() as u64);
        for stripe in &self.stripes {
            stripe.write_to(buf);
        }

        put_statistics(buf, &self.statistics);
        put_varint(buf, self.stripe_statistics.len() as u64);
        for stats in &self.stripe_statistics {
            put_statistics(buf, stats);
        }

        put_varint(buf, self.metadata.len() as u64);
        for (key, value) in &self.metadata {
            put_len_prefixed(buf, key.as_bytes());
            put_len_prefixed(buf, value);
        }
        put_len_prefixed(buf, self.writer.as_bytes());
    }

    pub fn read_from(buf: &mut Bytes) -> Result<Self> {
        let header_length = get_varint(buf)?;
        let content_length = get_varint(buf)?;
        let schema_string = get_string(buf)?;
        let schema = Schema::parse(&schema_string)
            .map_err(|e| OrcError::malformed(format!("stored schema is invalid: {}", e)))?;
        let row_count = get_varint(buf)?;

        let stripe_count = get_len(buf)?;
        let mut stripes = Vec::with_capacity(stripe_count.min(1024));
        for _ in 0..stripe_count {
            stripes.push(StripeInformation::read_from(buf)?);
        }

        let statistics = get_statistics(buf)?;
        let stripe_stats_count = get_len(buf)?;
        let mut stripe_statistics = Vec::with_capacity(stripe_stats_count.min(1024));
        for _ in 0..stripe_stats_count {
            stripe_statistics.push(get_statistics(buf)?);
        }

        let metadata_count = get_len(buf)?;
        let mut metadata = IndexMap::with_capacity(metadata_count.min(1024));
        for _ in 0..metadata_count {
            let key = get_string(buf)?;
            let value = get_len_prefixed(buf)?;
            metadata.insert(key, value);
        }
        let writer = get_string(buf)?;

        if !buf.is_empty() {
            return Err(OrcError::malformed(format!(
                "{} trailing bytes after file footer",
                buf.len()
            )));
        }

        Ok(Self {
            header_length,
            content_length,
            schema,
            row_count,
            stripes,
            statistics,
            stripe_statistics,
            metadata,
            writer,
        })
    }

    /// Check the footer's internal consistency against a file of
    /// `footer_start` bytes before the footer
    pub fn validate(&self, footer_start: u64) -> Result<()> {
        let columns = self.schema.column_count();
        if self.statistics.len() != columns {
            return Err(OrcError::CorruptFooter(format!(
                "{} column statistics for {} columns",
                self.statistics.len(),
                columns
            )));
        }
        if self.stripe_statistics.len() != self.stripes.len()
            || self.stripe_statistics.iter().any(|s| s.len() != columns)
        {
            return Err(OrcError::CorruptFooter(
                "stripe statistics do not match the stripe list".to_string(),
            ));
        }

        let mut rows = 0u64;
        for (idx, stripe) in self.stripes.iter().enumerate() {
            let end = stripe
                .data_length
                .checked_add(stripe.footer_length)
                .and_then(|len| stripe.offset.checked_add(len))
                .ok_or_else(|| OrcError::CorruptFooter(format!("stripe {} overflows", idx)))?;
            if stripe.offset < self.header_length || end > footer_start {
                return Err(OrcError::TruncatedFile(format!(
                    "stripe {} ({}..{}) lies outside of the {} content bytes",
                    idx, stripe.offset, end, footer_start
                )));
            }
            rows = rows.checked_add(stripe.row_count).ok_or_else(|| {
                OrcError::CorruptFooter("stripe row counts overflow".to_string())
            })?;
        }
        if rows != self.row_count {
            return Err(OrcError::CorruptFooter(format!(
                "stripes hold {} rows but the footer records {}",
                rows, self.row_count
            )));
        }
        Ok(())
    }
}

fn put_statistics<B: BufMut>(buf: &mut B, stats: &[ColumnStatistics]) {
    put_varint(buf, stats.len() as u64);
    for s in stats {
        s.write_to(buf);
    }
}

fn get_statistics(buf: &mut Bytes) -> Result<Vec<ColumnStatistics>> {
    let count = get_len(buf)?;
    let mut stats = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        stats.push(ColumnStatistics::read_from(buf)?);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrcValue;

    fn sample_footer() -> FileFooter {
        let schema = Schema::parse("struct<id:bigint>").unwrap();
        let mut stats: Vec<ColumnStatistics> = [&schema.root, &schema.top_level_fields()[0]]
            .into_iter()
            .map(ColumnStatistics::for_node)
            .collect();
        stats[0].update(&OrcValue::record([("id", OrcValue::Int64(42))]));
        stats[1].update(&OrcValue::Int64(42));

        let mut metadata = IndexMap::new();
        metadata.insert("owner".to_string(), Bytes::from_static(b"etl"));

        FileFooter {
            header_length: 3,
            content_length: 40,
            schema,
            row_count: 1,
            stripes: vec![StripeInformation {
                offset: 3,
                data_length: 30,
                footer_length: 10,
                row_count: 1,
                checksum: 0xdeadbeef,
            }],
            statistics: stats.clone(),
            stripe_statistics: vec![stats],
            metadata,
            writer: WRITER_NAME.to_string(),
        }
    }

    #[test]
    fn test_footer_roundtrip() {
        let footer = sample_footer();
        let mut buf = Vec::new();
        footer.write_to(&mut buf);
        let decoded = FileFooter::read_from(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, footer);
        decoded.validate(43).unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range_stripe() {
        let footer = sample_footer();
        assert!(matches!(
            footer.validate(42),
            Err(OrcError::TruncatedFile(_))
        ));

        let mut wrong_rows = sample_footer();
        wrong_rows.row_count = 2;
        assert!(matches!(
            wrong_rows.validate(43),
            Err(OrcError::CorruptFooter(_))
        ));

        let mut missing_stats = sample_footer();
        missing_stats.statistics.pop();
        assert!(matches!(
            missing_stats.validate(43),
            Err(OrcError::CorruptFooter(_))
        ));
    }

    #[test]
    fn test_postscript() {
        let ps = Postscript::new(1234, CompressionKind::Zstd);
        let mut buf = Vec::new();
        ps.write_to(&mut buf);
        assert!(buf.len() >= MIN_POSTSCRIPT_LENGTH);
        assert_eq!(Postscript::read_from(Bytes::from(buf.clone())).unwrap(), ps);

        // future major version
        let len = buf.len();
        buf[len - MAGIC.len() - 2] = 1;
        assert!(matches!(
            Postscript::read_from(Bytes::from(buf)),
            Err(OrcError::UnsupportedVersion { major: 1, .. })
        ));
    }

    #[test]
    fn test_postscript_without_magic() {
        let err = Postscript::read_from(Bytes::from_static(b"\x05\x00\x00\x0cORX")).unwrap_err();
        assert!(matches!(err, OrcError::TruncatedFile(_)));
    }
}
