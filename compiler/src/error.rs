use std::path::PathBuf;
use structgen_runtime::MemError;
use thiserror::Error;

/// Result type alias for compiler operations
pub type Result<T> = std::result::Result<T, StructgenError>;

/// Generation-time errors. Any of these aborts the whole file.
#[derive(Debug, Error)]
pub enum StructgenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {msg}")]
    ParseError {
        msg:  String,
        line: usize,
    },

    #[error("Verifier error at line {line}: {msg}")]
    VerifierError {
        msg:  String,
        line: usize,
    },

    #[error("cannot process {}: {source}", path.display())]
    InFile {
        path:   PathBuf,
        #[source]
        source: Box<StructgenError>,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl StructgenError {
    /// Attach the source file name to an error raised while compiling it.
    pub fn in_file(path: impl Into<PathBuf>, source: StructgenError) -> Self {
        Self::InFile {
            path:   path.into(),
            source: Box::new(source),
        }
    }

    /// The source line the error refers to, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::ParseError { line, .. } | Self::VerifierError { line, .. } => Some(*line),
            Self::InFile { source, .. } => source.line(),
            _ => None,
        }
    }
}

/// Errors raised by the record interpreter while operating on a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid struct {name}: {source}")]
    OutOfBounds {
        name:   String,
        #[source]
        source: MemError,
    },

    #[error("constant {name}.{field} was not valid, expected {expected}")]
    ConstantMismatch {
        name:     String,
        field:    String,
        expected: String,
    },

    #[error("struct {name} has no field {field}")]
    UnknownField {
        name:  String,
        field: String,
    },

    #[error("no struct named {0}")]
    UnknownStruct(String),

    #[error("value for {name}.{field} is invalid, expected {expected}")]
    ValueMismatch {
        name:     String,
        field:    String,
        expected: String,
    },

    #[error("string of {len} bytes does not fit in {name}.{field} of {size} bytes")]
    StringTooLong {
        name:  String,
        field: String,
        len:   usize,
        size:  usize,
    },

    #[error("data of {len} bytes does not fit in {name}.{field} of {size} bytes")]
    BlobSize {
        name:  String,
        field: String,
        len:   usize,
        size:  usize,
    },

    #[error("{value} is not a valid {name}")]
    EnumNotFound {
        name:  String,
        value: String,
    },

    #[error(transparent)]
    Mem(#[from] MemError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StructgenError::ParseError { msg: "invalid type: u17".into(), line: 4 };
        assert_eq!(err.to_string(), "Parse error at line 4: invalid type: u17");
        let err = StructgenError::in_file("fu-foo.rs", err);
        assert_eq!(
            err.to_string(),
            "cannot process fu-foo.rs: Parse error at line 4: invalid type: u17"
        );
        assert_eq!(err.line(), Some(4));

        let err = StructgenError::VerifierError { msg: "The struct \"Foo\" has no members".into(), line: 7 };
        assert_eq!(err.to_string(), "Verifier error at line 7: The struct \"Foo\" has no members");
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn test_record_error_display() {
        let err = RecordError::OutOfBounds {
            name:   "FuStructUswid".into(),
            source: MemError::OutOfBounds { bufsz: 0x10, offset: 0, n: 0x19 },
        };
        assert!(err.to_string().starts_with("invalid struct FuStructUswid: "));
        let err = RecordError::ConstantMismatch {
            name:     "FuStructUswid".into(),
            field:    "magic".into(),
            expected: "0x53424F4D".into(),
        };
        assert_eq!(err.to_string(), "constant FuStructUswid.magic was not valid, expected 0x53424F4D");
    }
}
