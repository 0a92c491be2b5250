//! Block compression applied to every stream and footer.
//!
//! When a codec is configured each chunk carries a one byte header, `0` for
//! stored and `1` for compressed. The stored form is used whenever the codec
//! does not make the chunk smaller. Files written without compression carry
//! no header byte at all.

use bytes::Bytes;
use std::fmt;

use crate::{OrcError, Result};

pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

const CHUNK_STORED: u8 = 0;
const CHUNK_COMPRESSED: u8 = 1;

/// Compression selected when building a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Lz4,
    Snappy,
    /// Zstandard with the given level
    Zstd(i32),
}

impl Compression {
    pub fn kind(&self) -> CompressionKind {
        match self {
            Compression::None => CompressionKind::None,
            Compression::Lz4 => CompressionKind::Lz4,
            Compression::Snappy => CompressionKind::Snappy,
            Compression::Zstd(_) => CompressionKind::Zstd,
        }
    }
}

/// Compression kind as recorded in the postscript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    None,
    Lz4,
    Snappy,
    Zstd,
}

impl CompressionKind {
    pub fn as_u8(self) -> u8 {
        match self {
            CompressionKind::None => 0,
            CompressionKind::Lz4 => 1,
            CompressionKind::Snappy => 2,
            CompressionKind::Zstd => 3,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionKind::None),
            1 => Some(CompressionKind::Lz4),
            2 => Some(CompressionKind::Snappy),
            3 => Some(CompressionKind::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionKind::None => "NONE",
            CompressionKind::Lz4 => "LZ4",
            CompressionKind::Snappy => "SNAPPY",
            CompressionKind::Zstd => "ZSTD",
        };
        f.write_str(name)
    }
}

/// A block compressor
pub trait Codec: fmt::Debug + Send + Sync {
    fn kind(&self) -> CompressionKind;

    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>>;

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Compress `input` into a framed chunk
    fn compress_chunk(&self, input: &[u8]) -> Result<Vec<u8>> {
        let compressed = self.compress_block(input)?;
        let mut out = Vec::with_capacity(1 + compressed.len().min(input.len()));
        if compressed.len() < input.len() {
            out.push(CHUNK_COMPRESSED);
            out.extend_from_slice(&compressed);
        } else {
            out.push(CHUNK_STORED);
            out.extend_from_slice(input);
        }
        Ok(out)
    }

    /// Undo [`Codec::compress_chunk`]
    fn decompress_chunk(&self, chunk: Bytes) -> Result<Bytes> {
        let Some(&flag) = chunk.first() else {
            return Err(OrcError::malformed("empty compressed chunk"));
        };
        let payload = chunk.slice(1..);
        match flag {
            CHUNK_STORED => Ok(payload),
            CHUNK_COMPRESSED => self.decompress_block(&payload).map(Bytes::from),
            other => Err(OrcError::malformed(format!("unknown chunk header {}", other))),
        }
    }
}

#[derive(Debug, Default)]
pub struct NoCodec;

impl Codec for NoCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::None
    }

    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn compress_chunk(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress_chunk(&self, chunk: Bytes) -> Result<Bytes> {
        Ok(chunk)
    }
}

#[derive(Debug, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Lz4
    }

    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(input))
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(input)
            .map_err(|e| OrcError::malformed(format!("LZ4 decompression failed: {}", e)))
    }
}

#[derive(Debug, Default)]
pub struct SnappyCodec;

impl Codec for SnappyCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Snappy
    }

    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(input)
            .map_err(|e| OrcError::invalid_argument(format!("Snappy compression failed: {}", e)))
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Decoder::new()
            .decompress_vec(input)
            .map_err(|e| OrcError::malformed(format!("Snappy decompression failed: {}", e)))
    }
}

#[derive(Debug)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl Codec for ZstdCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zstd
    }

    fn compress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(zstd::stream::encode_all(input, self.level)?)
    }

    fn decompress_block(&self, input: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::decode_all(input)
            .map_err(|e| OrcError::malformed(format!("Zstd decompression failed: {}", e)))
    }
}

/// Codec used by a writer configured with `compression`
pub fn create_codec(compression: Compression) -> Box<dyn Codec> {
    match compression {
        Compression::None => Box::new(NoCodec),
        Compression::Lz4 => Box::new(Lz4Codec),
        Compression::Snappy => Box::new(SnappyCodec),
        Compression::Zstd(level) => Box::new(ZstdCodec::new(level)),
    }
}

/// Codec able to read chunks written with `kind`
pub fn codec_for_kind(kind: CompressionKind) -> Box<dyn Codec> {
    match kind {
        CompressionKind::None => Box::new(NoCodec),
        CompressionKind::Lz4 => Box::new(Lz4Codec),
        CompressionKind::Snappy => Box::new(SnappyCodec),
        CompressionKind::Zstd => Box::new(ZstdCodec::default()),
    }
}
