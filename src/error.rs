use std::fmt;

use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

/// The bare error a leaf descriptor raises, before any enclosing record
/// has stamped its path segment onto it.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("unexpected end of stream: needed {needed} bits, {available} remaining")]
    EndOfStream { needed: usize, available: usize },
    #[error("trailing bits: {remaining} bits left after decode")]
    TrailingBits { remaining: usize },
    #[error("unaligned consumption: {bits} bits consumed, not a multiple of 8")]
    UnalignedConsumption { bits: usize },
    #[error("unaligned output: {bits} bits written, not a multiple of 8")]
    UnalignedOutput { bits: usize },
    #[error("value {value} does not fit in {bits} bits")]
    RangeError { value: i128, bits: usize },
    #[error("literal mismatch: expected {expected}, found {found}")]
    LiteralMismatch { expected: String, found: String },
    #[error("no variant of the enum matches decoded value {value}")]
    EnumOutOfRange { value: i128 },
    #[error("text encoding failed: {0}")]
    EncodingFailed(String),
    #[error("value mapper failed: {0}")]
    MapperFailed(String),
    #[error("unsupported dynamic encode: {0}")]
    UnsupportedDynamicEncode(String),
    #[error("schema error: {0}")]
    SchemaError(String),
}

/// One `(record_name, field_name)` hop in an error's path, recorded as a
/// nested record is entered on the way back out of a failing decode/encode.
pub type PathSegment = (String, String);

/// An error raised anywhere in a decode or encode pass, framed with the
/// field path that led to it and the bit position it occurred at.
///
/// Display renders as `root.field.field: kind: detail`, per the record
/// engine's error-framing discipline.
#[derive(Debug, derive_getters::Getters)]
pub struct Error {
    kind: ErrorKind,
    path: Vec<PathSegment>,
    bit_position: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
            bit_position: None,
        }
    }

    pub fn at(kind: ErrorKind, bit_position: usize) -> Self {
        Self {
            kind,
            path: Vec::new(),
            bit_position: Some(bit_position),
        }
    }

    /// Prepend a `(record_name, field_name)` hop, keeping the outermost
    /// record first as the error bubbles out through nested records.
    pub fn with_segment(mut self, record_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        self.path.insert(0, (record_name.into(), field_name.into()));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((root, _)) = self.path.first() {
            write!(f, "{root}")?;
            for (_, field) in &self.path {
                write!(f, ".{field}")?;
            }
            write!(f, ": ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}
