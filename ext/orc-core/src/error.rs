use thiserror::Error;

/// Core error type for ORC operations
#[derive(Error, Debug)]
pub enum OrcError {
    /// IO errors from the underlying input or output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The schema string (or builder input) is not a valid schema
    #[error("Invalid schema syntax at position {position}: {message}")]
    InvalidSchemaSyntax { position: usize, message: String },

    /// A row does not carry one value per top-level column
    #[error("Row has {actual} values but schema has {expected} columns")]
    RowArityMismatch { expected: usize, actual: usize },

    /// A value cannot be stored in the column it was written to
    #[error("Unsupported value at {path}: expected {expected}, got {found}")]
    UnsupportedValueType {
        path: String,
        expected: String,
        found: String,
    },

    /// A column could not be encoded while flushing a stripe
    #[error("Failed to encode column {column}: {reason}")]
    EncodeFailure { column: usize, reason: String },

    /// The writer has already been closed
    #[error("Writer has been closed")]
    WriterClosed,

    /// A previous output failure left the writer unusable
    #[error("Writer is unusable after a previous output failure")]
    WriterPoisoned,

    /// The input does not carry the ORC magic
    #[error("Not an ORC file")]
    NotAnOrcFile,

    /// The input looks like an ORC file but ends before its structures do
    #[error("Truncated file: {0}")]
    TruncatedFile(String),

    /// The file was written by an incompatible format version
    #[error("Unsupported file version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The file footer could not be decoded
    #[error("Corrupt footer: {0}")]
    CorruptFooter(String),

    /// A stripe could not be decoded; other stripes remain readable
    #[error("Corrupt stripe {stripe}: {reason}")]
    CorruptStripe { stripe: usize, reason: String },

    /// Index outside of the valid range
    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: u64, len: u64 },

    /// The operation observed a raised cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Low-level decoding errors, scoped to a stripe or footer by the caller
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// An error annotated with where it happened
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<OrcError>,
    },
}

/// Result type alias for ORC operations
pub type Result<T> = std::result::Result<T, OrcError>;

impl OrcError {
    /// Create a new schema syntax error
    pub fn schema<S: Into<String>>(position: usize, msg: S) -> Self {
        OrcError::InvalidSchemaSyntax {
            position,
            message: msg.into(),
        }
    }

    /// Create a new unsupported value error
    pub fn unsupported_value<P, E, F>(path: P, expected: E, found: F) -> Self
    where
        P: Into<String>,
        E: Into<String>,
        F: Into<String>,
    {
        OrcError::UnsupportedValueType {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        OrcError::InvalidArgument(msg.into())
    }

    /// Create a new malformed data error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        OrcError::Malformed(msg.into())
    }

    /// Create a new corrupt stripe error
    pub fn corrupt_stripe<S: Into<String>>(stripe: usize, reason: S) -> Self {
        OrcError::CorruptStripe {
            stripe,
            reason: reason.into(),
        }
    }

    /// Strip any context layers and return the underlying error
    pub fn root(&self) -> &OrcError {
        match self {
            OrcError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the underlying error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), OrcError::Cancelled)
    }
}

/// Extension trait to add context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, ctx: S) -> Result<T>;

    /// Add context with a closure that's only called on error
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<OrcError>,
{
    fn context<S: Into<String>>(self, ctx: S) -> Result<T> {
        self.map_err(|e| OrcError::Context {
            context: ctx.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T> {
        self.map_err(|e| OrcError::Context {
            context: f().into(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OrcError::schema(7, "unknown type 'integer'");
        assert_eq!(
            err.to_string(),
            "Invalid schema syntax at position 7: unknown type 'integer'"
        );

        let err = OrcError::RowArityMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Row has 2 values but schema has 3 columns");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: OrcError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(OrcError::invalid_argument("bad input"))
        }

        let result = failing_operation().context("While writing stripe 2");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("While writing stripe 2"));
        assert!(matches!(err.root(), OrcError::InvalidArgument(_)));
    }

    #[test]
    fn test_error_with_context() {
        fn failing_operation() -> Result<()> {
            Err(OrcError::Cancelled)
        }

        let column = 4;
        let err = failing_operation()
            .with_context(|| format!("Encoding column {}", column))
            .unwrap_err();

        assert!(err.to_string().contains("Encoding column 4"));
        assert!(err.is_cancelled());
    }
}
