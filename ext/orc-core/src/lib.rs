//! Columnar storage in the ORC style
//!
//! `orc-core` writes rows into self-describing columnar files and reads them
//! back. Files are split into independently decodable stripes and carry
//! per-column statistics at both the stripe and file level.
//!
//! # Key Components
//!
//! - **Schema**: Type-safe schema representation
//!   - Parsed from type strings such as `struct<name:string,age:int>`
//!   - Builder API for constructing schemas
//!   - Schema introspection through the [`traits::SchemaInspector`] trait
//!
//! - **Writer**: Row-oriented file writer
//!   - Buffers rows per column and flushes a stripe once its estimated size
//!     (or row count) reaches the configured limit
//!   - Pluggable compression ([`Compression`])
//!   - Uses `std::io::Write + Send` for output flexibility
//!
//! - **Reader**: Random-access file reader
//!   - Reads only the file tail on open
//!   - Stripe-at-a-time decoding through [`StripeRows`]
//!   - Column projection and single-row lookup
//!   - Uses [`ChunkReader`] for flexible input sources
//!
//! - **Encodings**: Column stream codecs in [`encoding`]
//!   - Variable-length integers, bit-packed booleans, little-endian floats
//!   - Direct and dictionary string encodings
//!
//! # Example Usage
//!
//! ```
//! use orc_core::{OrcValue, Reader, Schema, Writer};
//! use bytes::Bytes;
//!
//! let schema = Schema::parse("struct<name:string,age:int>")?;
//! let mut writer = Writer::new(Vec::new(), schema)?;
//! writer.write_row(vec![OrcValue::from("Alice"), OrcValue::Int32(30)])?;
//! let bytes = writer.into_inner()?;
//!
//! let reader = Reader::open(Bytes::from(bytes))?;
//! for row in reader.read_rows() {
//!     println!("{:?}", row?);
//! }
//! # Ok::<(), orc_core::OrcError>(())
//! ```

pub mod cancel;
pub mod chunk_reader;
mod column_buffer;
mod column_reader;
pub mod compression;
pub mod encoding;
pub mod error;
pub mod footer;
pub mod parser;
pub mod reader;
pub mod schema;
pub mod statistics;
pub mod stripe;
pub mod traits;
pub mod value;
pub mod writer;

#[cfg(test)]
pub mod test_utils;

pub use cancel::CancellationToken;
pub use chunk_reader::{ChunkReader, FileChunkReader, Length};
pub use compression::{Compression, CompressionKind};
pub use error::{ErrorContext, OrcError, Result};
pub use parser::parse_schema;
pub use reader::{FileMetadata, Reader, ReaderBuilder, RowIterator};
pub use schema::{PrimitiveType, Schema, SchemaBuilder, SchemaNode};
pub use statistics::{ColumnStatistics, TypedStatistics};
pub use stripe::{StripeInformation, StripeRows, StripeState};
pub use traits::SchemaInspector;
pub use value::OrcValue;
pub use writer::{Writer, WriterBuilder};
