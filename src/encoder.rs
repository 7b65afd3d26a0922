use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::header::ContentTransferEncoding;

/// Default line width of encoded content
pub const DEFAULT_LINE_WIDTH: usize = 76;

pub trait EncoderCodec {
    fn encode_chunk(&mut self, chunk: &[u8]) -> Vec<u8>;
}

/// 7bit codec
///
/// Content goes out as it is.
struct SevenBitCodec();

impl SevenBitCodec {
    pub fn new() -> Self {
        SevenBitCodec()
    }
}

impl EncoderCodec for SevenBitCodec {
    fn encode_chunk(&mut self, chunk: &[u8]) -> Vec<u8> {
        chunk.to_vec()
    }
}

/// Quoted-Printable codec
///
struct QuotedPrintableCodec();

impl QuotedPrintableCodec {
    pub fn new() -> Self {
        QuotedPrintableCodec()
    }
}

impl EncoderCodec for QuotedPrintableCodec {
    fn encode_chunk(&mut self, chunk: &[u8]) -> Vec<u8> {
        quoted_printable::encode(chunk)
    }
}

/// Base64 codec
///
/// Every line, the last one included, ends with CRLF.
struct Base64Codec {
    line_width: usize,
}

impl Base64Codec {
    pub fn new() -> Self {
        Base64Codec {
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    pub fn with_limit(mut self, line_width: usize) -> Self {
        self.line_width = line_width.max(4);
        self
    }
}

impl EncoderCodec for Base64Codec {
    fn encode_chunk(&mut self, chunk: &[u8]) -> Vec<u8> {
        let text = STANDARD.encode(chunk);
        let lines = text.len() / self.line_width + 1;
        let mut out = Vec::with_capacity(text.len() + 2 * lines);

        for line in text.as_bytes().chunks(self.line_width) {
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

pub struct EncoderChunk();

impl EncoderChunk {
    /// Codec for the mechanism used on output
    ///
    /// `8bit` and `binary` content goes out untransformed.
    pub fn get(encoding: ContentTransferEncoding, line_width: usize) -> Box<dyn EncoderCodec> {
        use self::ContentTransferEncoding::*;
        match encoding {
            SevenBit | EightBit | Binary => Box::new(SevenBitCodec::new()),
            QuotedPrintable => Box::new(QuotedPrintableCodec::new()),
            Base64 => Box::new(Base64Codec::new().with_limit(line_width)),
        }
    }
}
