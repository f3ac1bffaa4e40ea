//! Primary error type used by the library.
//!
//! Every fallible entry point in this crate returns `Result<T, FbError>`.
//! Each variant corresponds to one of the stable error kinds named by the
//! format: a caller can match on the variant without parsing the message.

use std::fmt;

/// Source-context snippet attached to schema errors: the offending line,
/// up to two lines of surrounding context, and a column marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// 1-indexed line number of the error
    pub line: usize,
    /// 1-indexed column number of the error
    pub column: usize,
    /// up to four lines of source surrounding the error, already trimmed
    pub snippet: String,
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}:\n{}", self.line, self.column, self.snippet)
    }
}

/// The error type used for every fallible operation in this crate.
#[derive(Debug)]
pub enum FbError {
    /// Tokenizer or grammar failure while parsing schema IDL.
    SchemaSyntax { message: String, at: SourceContext },
    /// Name clash, unresolved type reference, bad enum ordering, invalid
    /// `file_identifier` length, or a forbidden field type in a struct.
    SchemaSemantic { message: String },
    /// Decode or encode referenced a type absent from the registry.
    UnknownType { name: String },
    /// Encoder was given a value that cannot coerce to the declared field
    /// type; names the offending field.
    BadValue { field: String, message: String },
    /// Union payload was provided without a matching discriminant, or vice
    /// versa.
    BadDiscriminant { message: String },
    /// Decoder was asked to read past the end of the input buffer.
    TruncatedBuffer { at: usize, needed: usize, len: usize },
    /// Encoder's flatten pass exceeded the configured recursion depth.
    RecursionLimit,
    /// Decode was requested with no explicit type name and no recognizable
    /// file identifier in the buffer.
    MissingRootType,
    /// Escape hatch for messages that don't map cleanly onto a named kind.
    Custom(String),
}

impl FbError {
    /// Build a `Custom` error from anything that behaves like a string.
    pub fn new<S: AsRef<str>>(message: S) -> Self {
        FbError::Custom(message.as_ref().to_owned())
    }

    /// Stable short identifier for the error kind, independent of the
    /// human-readable message. Useful for tests and CLI exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            FbError::SchemaSyntax { .. } => "SchemaSyntax",
            FbError::SchemaSemantic { .. } => "SchemaSemantic",
            FbError::UnknownType { .. } => "UnknownType",
            FbError::BadValue { .. } => "BadValue",
            FbError::BadDiscriminant { .. } => "BadDiscriminant",
            FbError::TruncatedBuffer { .. } => "TruncatedBuffer",
            FbError::RecursionLimit => "RecursionLimit",
            FbError::MissingRootType => "MissingRootType",
            FbError::Custom(_) => "Custom",
        }
    }
}

impl fmt::Display for FbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FbError::SchemaSyntax { message, at } => write!(f, "schema syntax error: {}\n{}", message, at),
            FbError::SchemaSemantic { message } => write!(f, "schema error: {}", message),
            FbError::UnknownType { name } => write!(f, "unknown type: {}", name),
            FbError::BadValue { field, message } => write!(f, "bad value for field `{}`: {}", field, message),
            FbError::BadDiscriminant { message } => write!(f, "bad union discriminant: {}", message),
            FbError::TruncatedBuffer { at, needed, len } => write!(
                f,
                "truncated buffer: tried to read {} bytes at offset {} but buffer is only {} bytes",
                needed, at, len
            ),
            FbError::RecursionLimit => write!(f, "recursion limit exceeded while flattening value graph"),
            FbError::MissingRootType => write!(f, "no root type given and no file identifier found in buffer"),
            FbError::Custom(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for FbError {}

impl From<std::string::FromUtf8Error> for FbError {
    fn from(err: std::string::FromUtf8Error) -> FbError {
        FbError::new(err.to_string())
    }
}

impl From<std::num::ParseIntError> for FbError {
    fn from(err: std::num::ParseIntError) -> FbError {
        FbError::new(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for FbError {
    fn from(err: std::num::ParseFloatError) -> FbError {
        FbError::new(err.to_string())
    }
}
