//! Per-type stream encoders and their streaming decoders.

pub mod boolean;
pub mod float;
pub mod integer;
pub mod string;
pub mod varint;

pub use boolean::{encode_booleans, BooleanDecoder};
pub use float::{encode_f32, encode_f64, FloatDecoder};
pub use integer::{encode_integers, IntegerDecoder};
pub use string::{encode_direct, encode_strings, EncodedStrings, StringDecoder};

use crate::{OrcError, Result};

/// Role of a stream within a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Bit-packed non-null flags
    Present,
    Data,
    /// String lengths, dictionary entry lengths, list/map lengths
    Length,
    DictionaryData,
}

impl StreamKind {
    pub fn as_u8(self) -> u8 {
        match self {
            StreamKind::Present => 0,
            StreamKind::Data => 1,
            StreamKind::Length => 2,
            StreamKind::DictionaryData => 3,
        }
    }
}

impl TryFrom<u8> for StreamKind {
    type Error = OrcError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(StreamKind::Present),
            1 => Ok(StreamKind::Data),
            2 => Ok(StreamKind::Length),
            3 => Ok(StreamKind::DictionaryData),
            other => Err(OrcError::malformed(format!("unknown stream kind {}", other))),
        }
    }
}

/// How a column's values were laid out in a stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnEncoding {
    #[default]
    Direct,
    Dictionary {
        size: u32,
    },
}
