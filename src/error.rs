use std::error;
use std::fmt;
use std::io;
use std::num;
use std::result;

use crate::deserializer::DeserializeError;

/// A type alias for `Result<T, csv_bind::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when binding lines of delimited text to records.
///
/// Only one kind of error is recoverable: `Error::Bind`. It is reported for
/// the line that failed and the reader that produced it can keep going. All
/// other kinds either stop the reader (`Io`), are raised before any line is
/// read (`Configuration`) or indicate misuse of the reader (`Exhausted`).
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading lines from the source.
    Io(io::Error),
    /// A single line could not be bound to a record.
    Bind(BindError),
    /// A record was requested when none is available.
    Exhausted,
    /// The field mapping is unusable for the requested record type.
    Configuration(String),
}

impl Error {
    /// Returns true if and only if the reader that produced this error can
    /// continue with the following line.
    pub fn is_recoverable(&self) -> bool {
        match *self {
            Error::Bind(_) => true,
            _ => false,
        }
    }

    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Returns the bind error, if this is one.
    pub fn as_bind_error(&self) -> Option<&BindError> {
        match *self {
            Error::Bind(ref err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn config<S: Into<String>>(msg: S) -> Error {
        Error::Configuration(msg.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<BindError> for Error {
    fn from(err: BindError) -> Error {
        Error::Bind(err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Bind(ref err) => Some(err),
            Error::Exhausted => None,
            Error::Configuration(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Bind(ref err) => err.fmt(f),
            Error::Exhausted => {
                write!(f, "CSV error: no more records available")
            }
            Error::Configuration(ref msg) => {
                write!(f, "CSV configuration error: {}", msg)
            }
        }
    }
}

/// A failure to bind one line of input to a record.
///
/// The line that failed is kept, rendered with the reader's delimiter, for
/// diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct BindError {
    line: Option<u64>,
    raw: String,
    kind: BindErrorKind,
}

impl BindError {
    pub(crate) fn new(
        line: Option<u64>,
        raw: String,
        kind: BindErrorKind,
    ) -> BindError {
        BindError { line, raw, kind }
    }

    /// The physical line number of the failing line, if the source knows it.
    pub fn line(&self) -> Option<u64> {
        self.line
    }

    /// The failing line as it was read, before comment stripping or
    /// alignment.
    pub fn raw_line(&self) -> &str {
        &self.raw
    }

    /// Return the underlying error kind.
    pub fn kind(&self) -> &BindErrorKind {
        &self.kind
    }

    /// Unwrap this error into its underlying kind.
    pub fn into_kind(self) -> BindErrorKind {
        self.kind
    }
}

/// The specific reason a line could not be bound.
#[derive(Clone, Debug, PartialEq)]
pub enum BindErrorKind {
    /// The line has fewer cells than the mandatory fields require.
    TooFewCells {
        /// The minimum number of cells required by the mapping.
        expected: usize,
        /// The number of cells in the line.
        found: usize,
    },
    /// A mandatory cell is absent from the line.
    MissingCell {
        /// The field the cell is mapped to.
        field: String,
        /// The column index of the missing cell.
        column: usize,
    },
    /// A cell could not be converted to its field's type.
    Convert {
        /// The field being converted.
        field: String,
        /// The column index of the offending cell.
        column: usize,
        /// The conversion failure.
        err: ConversionError,
    },
    /// The converted values do not fit the record type.
    Deserialize(DeserializeError),
}

impl error::Error for BindError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind {
            BindErrorKind::Convert { ref err, .. } => Some(err),
            BindErrorKind::Deserialize(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.line {
            None => write!(f, "CSV bind error: ")?,
            Some(line) => write!(f, "CSV bind error: line {}: ", line)?,
        }
        write!(f, "{} (line: '{}')", self.kind, self.raw)
    }
}

impl fmt::Display for BindErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BindErrorKind::TooFewCells { expected, found } => write!(
                f,
                "found record with {} cells, but at least {} are required",
                found, expected
            ),
            BindErrorKind::MissingCell { ref field, column } => write!(
                f,
                "field '{}': no cell at column {}",
                field, column
            ),
            BindErrorKind::Convert { ref field, column, ref err } => write!(
                f,
                "field '{}' (column {}): {}",
                field, column, err
            ),
            BindErrorKind::Deserialize(ref err) => err.fmt(f),
        }
    }
}

/// An error converting the text of a single cell into a typed value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConversionError {
    /// The cell is not `true` or `false`.
    ParseBool(String),
    /// The cell is not a valid integer.
    ParseInt(num::ParseIntError),
    /// The cell is not a valid float.
    ParseFloat(num::ParseFloatError),
    /// The cell does not contain exactly one character. The number of
    /// characters found is included.
    Char(usize),
    /// A custom converter rejected the cell.
    Custom(String),
}

impl ConversionError {
    /// Create an error for use in a custom `Converter`.
    pub fn custom<T: fmt::Display>(msg: T) -> ConversionError {
        ConversionError::Custom(msg.to_string())
    }
}

impl From<num::ParseIntError> for ConversionError {
    fn from(err: num::ParseIntError) -> ConversionError {
        ConversionError::ParseInt(err)
    }
}

impl From<num::ParseFloatError> for ConversionError {
    fn from(err: num::ParseFloatError) -> ConversionError {
        ConversionError::ParseFloat(err)
    }
}

impl error::Error for ConversionError {}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConversionError::ParseBool(ref value) => write!(
                f,
                "expected 'true' or 'false' but got '{}'",
                value
            ),
            ConversionError::ParseInt(ref err) => err.fmt(f),
            ConversionError::ParseFloat(ref err) => err.fmt(f),
            ConversionError::Char(len) => write!(
                f,
                "expected single character but got {} characters",
                len
            ),
            ConversionError::Custom(ref msg) => write!(f, "{}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{BindError, BindErrorKind, ConversionError, Error};

    #[test]
    fn only_bind_errors_recover() {
        let bind = Error::from(BindError::new(
            Some(3),
            "x".into(),
            BindErrorKind::TooFewCells { expected: 2, found: 1 },
        ));
        assert!(bind.is_recoverable());
        assert!(bind.as_bind_error().is_some());

        let io = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(!io.is_recoverable());
        assert!(io.is_io_error());
        assert!(!Error::Exhausted.is_recoverable());
        assert!(!Error::config("nope").is_recoverable());
    }

    #[test]
    fn bind_error_display() {
        let err = BindError::new(
            Some(7),
            "a,zz".into(),
            BindErrorKind::Convert {
                field: "n".into(),
                column: 1,
                err: ConversionError::Char(2),
            },
        );
        assert_eq!(
            err.to_string(),
            "CSV bind error: line 7: field 'n' (column 1): \
             expected single character but got 2 characters \
             (line: 'a,zz')"
        );
    }
}
