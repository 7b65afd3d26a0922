use base64::Engine;
use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::decoder::{decode_quoted_printable, LENIENT_BASE64};

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([^?\s]+)\?([bBqQ])\?([^?\s]*)\?=").unwrap();
}

/// Decodes RFC 2047 encoded-words inside a header value
///
/// Whitespace between two adjacent encoded-words is dropped. Words which fail
/// to decode are left as they are.
pub fn decode_header_value(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    let mut after_word = false;

    for captures in ENCODED_WORD.captures_iter(raw) {
        let whole = match captures.get(0) {
            Some(whole) => whole,
            None => continue,
        };
        let between = &raw[last..whole.start()];
        last = whole.end();

        match ew_decode(&captures) {
            Some(decoded) => {
                if !after_word || !between.trim().is_empty() {
                    out.push_str(between);
                }
                out.push_str(&decoded);
                after_word = true;
            }
            None => {
                out.push_str(between);
                out.push_str(whole.as_str());
                after_word = false;
            }
        }
    }

    out.push_str(&raw[last..]);
    out
}

fn ew_decode(captures: &Captures) -> Option<String> {
    // RFC 2231 allows a language suffix: `utf-8*en`
    let charset = captures[1].split('*').next()?;
    let text = captures[3].as_bytes();

    let bytes = match &captures[2] {
        "b" | "B" => LENIENT_BASE64.decode(text).ok()?,
        _ => {
            let text = text
                .iter()
                .map(|b| if *b == b'_' { b' ' } else { *b })
                .collect::<Vec<_>>();
            match decode_quoted_printable(&text) {
                (bytes, None) => bytes,
                (_, Some(_)) => return None,
            }
        }
    };

    Encoding::for_label_no_replacement(charset.as_bytes())?
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .map(|text| text.into_owned())
}

#[cfg(test)]
mod test {
    use super::decode_header_value;
    use proptest::prelude::*;

    #[test]
    fn plain_values() {
        assert_eq!(decode_header_value("hello world"), "hello world");
        assert_eq!(decode_header_value("a =? b"), "a =? b");
    }

    #[test]
    fn words() {
        assert_eq!(
            decode_header_value("=?US-ASCII?Q?Keith_Moore?= <moore@cs.utk.edu>"),
            "Keith Moore <moore@cs.utk.edu>"
        );
        assert_eq!(
            decode_header_value("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?="),
            "Keld Jørn Simonsen"
        );
        assert_eq!(decode_header_value("=?utf-8?B?0YTQsNC50LsudHh0?="), "файл.txt");
        assert_eq!(decode_header_value("=?utf-8*ru?b?0YTQsNC50Ls=?="), "файл");
    }

    #[test]
    fn adjacent_words() {
        assert_eq!(
            decode_header_value(concat!(
                "=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?=\r\n ",
                "=?ISO-8859-2?B?dSB1bmRlcnN0YW5kIHRoZSBleGFtcGxlLg==?="
            )),
            "If you can read this you understand the example."
        );
        assert_eq!(
            decode_header_value("(=?ISO-8859-1?Q?a?= b =?ISO-8859-1?Q?c?=)"),
            "(a b c)"
        );
    }

    #[test]
    fn broken_words() {
        assert_eq!(
            decode_header_value("=?x-unknown?Q?abc?= =?utf-8?Q?d=ZZ?="),
            "=?x-unknown?Q?abc?= =?utf-8?Q?d=ZZ?="
        );
        assert_eq!(
            decode_header_value("=?utf-8?Q?ok?= =?utf-8?B?#?="),
            "ok =?utf-8?B?#?="
        );
    }

    proptest! {
        #[test]
        fn never_panics(s in r"=\?.*\?.*\?.*\?=.*") {
            decode_header_value(&s);
        }
    }
}
