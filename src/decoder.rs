//! Content transfer decoding
//!
//! Decoding never fails outright: the decoders return whatever decoded
//! cleanly together with the error which stopped them.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use std::io::{Read, Result as IoResult};

use crate::error::DecodeError;
use crate::header::ContentTransferEncoding;

/// Standard alphabet base64 engine which does not insist on padding
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[inline]
fn is_base64_symbol(b: u8) -> bool {
    match b {
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' | b'=' => true,
        _ => false,
    }
}

/// Reader which drops everything but base64 symbols and padding
///
/// Line breaks, spaces, stray punctuation and 8-bit garbage in a base64 body
/// disappear before the decoder sees it.
pub struct Base64Cleaner<R> {
    inner: R,
}

impl<R: Read> Base64Cleaner<R> {
    pub fn new(inner: R) -> Self {
        Base64Cleaner { inner }
    }
}

impl<R: Read> Read for Base64Cleaner<R> {
    fn read(&mut self, dest: &mut [u8]) -> IoResult<usize> {
        loop {
            let read = self.inner.read(dest)?;
            if read == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..read {
                if is_base64_symbol(dest[i]) {
                    dest[kept] = dest[i];
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Reverts a content transfer encoding
///
/// `7bit`, `8bit` and `binary` pass through unchanged.
pub(crate) fn decode_transfer(
    encoding: ContentTransferEncoding,
    raw: &[u8],
) -> (Vec<u8>, Option<DecodeError>) {
    use self::ContentTransferEncoding::*;
    match encoding {
        Base64 => decode_base64(raw),
        QuotedPrintable => decode_quoted_printable(raw),
        SevenBit | EightBit | Binary => (raw.to_vec(), None),
    }
}

pub(crate) fn decode_base64(raw: &[u8]) -> (Vec<u8>, Option<DecodeError>) {
    let clean = raw
        .iter()
        .cloned()
        .filter(|b| is_base64_symbol(*b))
        .collect::<Vec<_>>();

    let (data, padding) = match clean.iter().position(|b| *b == b'=') {
        Some(pad) => clean.split_at(pad),
        None => (&clean[..], &[][..]),
    };

    let mut error = None;
    if padding.iter().any(|b| *b != b'=') {
        error = Some(DecodeError::Base64("data after padding"));
    }

    let usable = if data.len() % 4 == 1 {
        error = Some(DecodeError::Base64("dangling symbol"));
        data.len() - 1
    } else {
        data.len()
    };

    match LENIENT_BASE64.decode(&data[..usable]) {
        Ok(decoded) => (decoded, error),
        // not reachable with a filtered input of valid length
        Err(_) => (Vec::new(), Some(DecodeError::Base64("malformed input"))),
    }
}

pub(crate) fn decode_quoted_printable(raw: &[u8]) -> (Vec<u8>, Option<DecodeError>) {
    let mut out = Vec::with_capacity(raw.len());

    for line in raw.split_inclusive(|b| *b == b'\n') {
        let (text, ending) = if line.ends_with(b"\r\n") {
            line.split_at(line.len() - 2)
        } else if line.ends_with(b"\n") {
            line.split_at(line.len() - 1)
        } else {
            (line, &[][..])
        };

        let end = text
            .iter()
            .rposition(|b| *b != b' ' && *b != b'\t')
            .map_or(0, |i| i + 1);
        let text = &text[..end];

        let (text, soft_break) = match text.split_last() {
            Some((&b'=', text)) => (text, true),
            _ => (text, false),
        };

        let mut i = 0;
        while i < text.len() {
            if text[i] != b'=' {
                out.push(text[i]);
                i += 1;
                continue;
            }
            match text.get(i + 1..i + 3).and_then(hex_byte) {
                Some(b) => out.push(b),
                None => {
                    return (out, Some(DecodeError::QuotedPrintable("invalid escape")));
                }
            }
            i += 3;
        }

        if !soft_break {
            out.extend_from_slice(ending);
        }
    }

    (out, None)
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
