//! Charset transcoding
//!
//! Text bodies are kept as UTF-8 in memory. The parser turns them into UTF-8
//! from their declared charset and the encoder turns them back.

use encoding_rs::{Encoding, UTF_8};

/// Converter between UTF-8 and named charsets
///
/// `None` means the charset is unknown or the data does not fit it; callers
/// then keep the bytes as they are.
pub trait CharsetCodec {
    /// Converts `bytes` in `charset` into UTF-8
    fn decode(&self, charset: &str, bytes: &[u8]) -> Option<Vec<u8>>;

    /// Converts UTF-8 `bytes` into `charset`
    fn encode(&self, charset: &str, bytes: &[u8]) -> Option<Vec<u8>>;
}

/// Default charset codec backed by `encoding_rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingRs;

impl EncodingRs {
    fn lookup(charset: &str) -> Option<&'static Encoding> {
        Encoding::for_label_no_replacement(charset.trim().as_bytes())
    }
}

impl CharsetCodec for EncodingRs {
    fn decode(&self, charset: &str, bytes: &[u8]) -> Option<Vec<u8>> {
        let encoding = Self::lookup(charset)?;
        if encoding == UTF_8 {
            return std::str::from_utf8(bytes).ok().map(|_| bytes.to_vec());
        }
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned().into_bytes())
    }

    fn encode(&self, charset: &str, bytes: &[u8]) -> Option<Vec<u8>> {
        let encoding = Self::lookup(charset)?;
        let text = std::str::from_utf8(bytes).ok()?;
        let (encoded, _, had_errors) = encoding.encode(text);
        if had_errors {
            None
        } else {
            Some(encoded.into_owned())
        }
    }
}
