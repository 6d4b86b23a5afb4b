//! Error types

use crate::binary::read::ReadEof;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    /// A consistency check on the data failed. `offset` is the absolute position in the buffer
    /// of the data that was checked.
    Malformed { offset: usize },
    /// A subtable used a format number this crate does not understand. `offset` is the absolute
    /// position of the subtable in the buffer.
    UnsupportedFormat { format: u16, offset: usize },
    UnsuitableCmap,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::Malformed { offset } => write!(f, "malformed data at 0x{:x}", offset),
            ParseError::UnsupportedFormat { format, offset } => {
                write!(f, "unsupported subtable format {} at 0x{:x}", format, offset)
            }
            ParseError::UnsuitableCmap => write!(f, "no suitable cmap subtable"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
    /// A length or offset did not fit in the field reserved for it.
    Overflow,
    NotImplemented,
    PlaceholderMismatch,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::Overflow => write!(f, "write: value too large for its field"),
            WriteError::NotImplemented => write!(f, "writing in this format is not implemented"),
            WriteError::PlaceholderMismatch => {
                write!(f, "data written to placeholder did not match expected size")
            }
        }
    }
}

impl std::error::Error for WriteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reports_position() {
        let error = ParseError::UnsupportedFormat {
            format: 7,
            offset: 0x2A,
        };
        assert_eq!(error.to_string(), "unsupported subtable format 7 at 0x2a");
        assert_eq!(
            ParseError::Malformed { offset: 16 }.to_string(),
            "malformed data at 0x10"
        );
    }
}
