//! Errors shared across the data model.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};


/***** LIBRARY *****/
/// Errors that occur while encoding or decoding a dataset through the class
/// tag registry.
#[derive(Debug)]
pub enum CodecError {
    /// No codec (and no fallback along the dotted class hierarchy) is
    /// registered for the given class tag.
    UnknownClass { class: String },
    /// The byte view handed to a decoder was too short for its own header.
    Truncated { class: String, what: &'static str },
    /// A `str`-tagged dataset did not contain valid UTF-8.
    InvalidUtf8 { class: String },
    /// An `int`-tagged dataset was not exactly 4 bytes.
    InvalidIntWidth { len: usize },
    /// Encoding of the given value under the given class tag is not
    /// supported (e.g. an `int` value outside the `i32` range).
    Unencodable { class: String, reason: String },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use CodecError::*;
        match self {
            UnknownClass { class } => write!(f, "no codec registered for class '{class}' (and none found along its class hierarchy)"),
            Truncated { class, what } => write!(f, "dataset tagged '{class}' is too short to contain its {what}"),
            InvalidUtf8 { class } => write!(f, "dataset tagged '{class}' is not valid UTF-8"),
            InvalidIntWidth { len } => write!(f, "dataset tagged 'int' must be exactly 4 bytes, got {len}"),
            Unencodable { class, reason } => write!(f, "cannot encode value as class '{class}': {reason}"),
        }
    }
}

impl Error for CodecError {}
