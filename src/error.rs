//! Error types for hyraster

use std::fmt;
use std::io;

use crate::types::DataType;

/// Result type for hyraster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in hyraster operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Malformed header or payload
    InvalidFormat(String),

    /// Required header field is absent
    MissingField(String),

    /// Unsupported data type, interleave or backend
    Unsupported(String),

    /// Out of bounds access
    OutOfBounds(String),

    /// Array or mask shape does not match the raster
    ShapeMismatch(String),

    /// Requested element type differs from the raster's data type
    TypeMismatch {
        expected: DataType,
        found: DataType,
    },

    /// No mask registered under this name
    UnknownMask(String),

    /// Hierarchical container error
    Container(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Error::MissingField(field) => write!(f, "Missing required field: {}", field),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::OutOfBounds(msg) => write!(f, "Out of bounds: {}", msg),
            Error::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            Error::TypeMismatch { expected, found } => write!(
                f,
                "Type mismatch: raster holds {} but {} was requested",
                expected.name(),
                found.name()
            ),
            Error::UnknownMask(name) => write!(f, "Unknown mask: {}", name),
            Error::Container(msg) => write!(f, "Container error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(error: ndarray::ShapeError) -> Self {
        Error::ShapeMismatch(error.to_string())
    }
}

#[cfg(feature = "hdf5")]
impl From<hdf5::Error> for Error {
    fn from(error: hdf5::Error) -> Self {
        Error::Container(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidFormat("test".to_string());
        assert_eq!(err.to_string(), "Invalid format: test");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_type_mismatch() {
        let err = Error::TypeMismatch {
            expected: DataType::I16,
            found: DataType::F32,
        };
        let msg = err.to_string();
        assert!(msg.contains("I16"));
        assert!(msg.contains("F32"));
    }

    #[test]
    fn test_missing_field() {
        let err = Error::MissingField("lines".to_string());
        assert!(err.to_string().contains("lines"));
    }
}
