use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The file's magic value does not match the expectation {magic}")]
    InvalidMagicValue { magic: u32 },

    #[error("The file is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    #[error("Unknown format version {version:#x}")]
    UnknownVersion { version: u32 },

    #[error("Decompressed size {actual} does not match the recorded size {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The compressed stream references data outside of its window or ends mid-token.
    #[error("Compressed stream is corrupt")]
    CorruptStream,

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UTF8ConversationError(#[from] std::string::FromUtf8Error),
}

impl ParserError {
    /// True when the underlying reader ran out of data, which several formats use as a terminator.
    pub fn is_eof(&self) -> bool {
        matches!(self, ParserError::IOError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub mod atomic;
pub mod common;
pub mod magpack;
pub mod segment;
