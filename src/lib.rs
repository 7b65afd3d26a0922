//! Tolerant MIME message parser and encoder
//!
//! A message is parsed into a tree of [`Part`]s: multipart bodies are split
//! at their boundaries, `message/rfc822` bodies are parsed as nested
//! messages, and leaf bodies are decoded from their transfer encoding and
//! charset. The tree can be inspected, changed and written out again.
//!
//! ```
//! let message = mimetree::parse_bytes(concat!(
//!     "Content-Type: multipart/mixed; boundary=sep\r\n",
//!     "\r\n",
//!     "--sep\r\n",
//!     "\r\n",
//!     "Hello!\r\n",
//!     "--sep\r\n",
//!     "Content-Type: application/octet-stream\r\n",
//!     "Content-Disposition: attachment; filename=data.bin\r\n",
//!     "Content-Transfer-Encoding: base64\r\n",
//!     "\r\n",
//!     "AAECAw==\r\n",
//!     "--sep--\r\n",
//! ).as_bytes()).unwrap();
//!
//! assert_eq!(message.children()[0].content(), "Hello!");
//!
//! let attachments = mimetree::attachments(&message);
//! assert_eq!(attachments[0].file_name, "data.bin");
//! assert_eq!(attachments[0].size, 4);
//! ```

#[macro_use]
extern crate log;

mod attachment;
mod boundary;
mod charset;
mod decoder;
mod encoder;
mod error;
pub mod header;
mod lookahead;
mod message;
mod mimebody;
mod parser;

use std::io::Read;

pub use attachment::{attachments, Attachment};
pub use boundary::{find_boundary, BoundaryReader, Scan};
pub use charset::{CharsetCodec, EncodingRs};
pub use decoder::Base64Cleaner;
pub use encoder::{EncoderChunk, EncoderCodec, DEFAULT_LINE_WIDTH};
pub use error::{BoundaryError, Error, Result};
pub use lookahead::{Lookahead, DEFAULT_PEEK_SIZE};
pub use message::{HeaderPair, MessagePart, MessagePartBody};
pub use mimebody::{child_id, Encoder, EncoderOptions, Part, Walk, DEFAULT_CONTENT_TYPE};
pub use parser::{Parser, ParserOptions, DEFAULT_MAX_DEPTH};

/// Parses a message using default options
pub fn parse<R: Read>(reader: R) -> Result<Part> {
    Parser::new().parse(reader)
}

/// Parses a message held in memory
pub fn parse_bytes(input: &[u8]) -> Result<Part> {
    parse(input)
}
