use std::io;
use thiserror::Error;

/// Errors which abort a parse or an encode.
///
/// Content decoding problems are not in here: a part whose body fails to
/// decode keeps whatever prefix decoded cleanly and parsing goes on.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading from the source or writing to the sink failed
    #[error("Stream error: {0}")]
    Io(#[from] io::Error),

    /// `Content-Type` could not be parsed, even after repair
    #[error("Media type error in part {part_id:?}: {reason} (value {value:?})")]
    MediaType {
        part_id: String,
        value: String,
        reason: String,
    },

    /// Multipart body framing is broken
    #[error("Malformed multipart body in part {part_id:?}: {source}")]
    MalformedBoundary {
        part_id: String,
        #[source]
        source: BoundaryError,
    },
}

/// The ways a multipart body can violate its framing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// No more parts: the stream ended before the closing delimiter
    #[error("stream ended before the closing delimiter")]
    Truncated,

    /// Something other than a blank line sits where a delimiter was required
    #[error("unexpected line where a delimiter was required: {0:?}")]
    UnexpectedLine(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Content decoding failure.
///
/// Never leaves the crate; the decoder reports it next to the partially
/// decoded bytes and the parser logs it.
#[derive(Debug, Error)]
pub(crate) enum DecodeError {
    #[error("base64: {0}")]
    Base64(&'static str),

    #[error("quoted-printable: {0}")]
    QuotedPrintable(&'static str),

    #[error("charset {0:?}: unknown label or malformed input")]
    Charset(String),
}
