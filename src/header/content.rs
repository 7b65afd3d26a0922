use encoding_rs::{Encoding, UTF_8};
use mime::Mime;
use percent_encoding::percent_decode_str;
use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};
use std::str::FromStr;

/// `Content-Transfer-Encoding` mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    SevenBit,
    QuotedPrintable,
    Base64,
    // 8BITMIME
    EightBit,
    Binary,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::SevenBit
    }
}

impl ContentTransferEncoding {
    /// Mechanism used when writing the part out
    ///
    /// Nothing transforms content for `8bit` and `binary`, so these are
    /// written as `7bit`.
    pub fn for_output(self) -> Self {
        use self::ContentTransferEncoding::*;
        match self {
            EightBit | Binary => SevenBit,
            other => other,
        }
    }
}

impl Display for ContentTransferEncoding {
    fn fmt(&self, f: &mut FmtFormatter) -> FmtResult {
        use self::ContentTransferEncoding::*;
        f.write_str(match *self {
            SevenBit => "7bit",
            QuotedPrintable => "quoted-printable",
            Base64 => "base64",
            EightBit => "8bit",
            Binary => "binary",
        })
    }
}

impl FromStr for ContentTransferEncoding {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use self::ContentTransferEncoding::*;
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" => Ok(SevenBit),
            "quoted-printable" => Ok(QuotedPrintable),
            "base64" => Ok(Base64),
            "8bit" => Ok(EightBit),
            "binary" => Ok(Binary),
            _ => Err(s.into()),
        }
    }
}

/// Parsed `Content-Type` value
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    /// Lowercase `type/subtype` without parameters
    pub essence: String,
    /// Parameters with lowercase names, in declaration order
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// Parses a `Content-Type` value
    ///
    /// A value which does not parse gets one repair pass with
    /// [`fix_media_type`] before giving up.
    pub fn parse(value: &str) -> Result<Self, String> {
        match parse_mime(value) {
            Ok(media_type) => Ok(media_type),
            Err(error) => {
                let fixed = fix_media_type(value);
                debug!("Repairing media type {:?} ({}) as {:?}", value, error, fixed);
                parse_mime(&fixed)
            }
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)
    }

    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }
}

fn parse_mime(value: &str) -> Result<MediaType, String> {
    let mime = value.trim().parse::<Mime>().map_err(|error| error.to_string())?;
    let params = mime
        .params()
        .map(|(name, value)| (name.as_str().to_ascii_lowercase(), unquote(value.as_str())))
        .collect();
    Ok(MediaType {
        essence: mime.essence_str().to_ascii_lowercase(),
        params: combine_sections(params),
    })
}

/// Parsed `Content-Disposition` value
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    /// Lowercase disposition type, like `attachment` or `inline`
    pub kind: String,
    pub params: Vec<(String, String)>,
}

impl Disposition {
    /// Parses a `Content-Disposition` value
    ///
    /// Parameters which are not `token=token` or `token="quoted"` are
    /// skipped. Gives `None` when even the disposition type is unusable.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (kind, params) = match value.find(';') {
            Some(semi) => (value[..semi].trim(), &value[semi + 1..]),
            None => (value, ""),
        };
        if !is_token(kind) {
            return None;
        }
        Some(Disposition {
            kind: kind.to_ascii_lowercase(),
            params: combine_sections(parse_parameter_list(params)),
        })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)
    }
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn is_token_char(c: u8) -> bool {
    match c {
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' => true,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' => true,
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~' => true,
        _ => false,
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

fn unquote(value: &str) -> String {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() - 2);
    let mut chars = value[1..value.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn parse_parameter_list(list: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for segment in split_segments(list) {
        let eq = match segment.find('=') {
            Some(eq) => eq,
            None => continue,
        };
        let name = segment[..eq].trim();
        let value = segment[eq + 1..].trim();
        if !is_token(name) {
            continue;
        }
        let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            unquote(value)
        } else if is_token(value) {
            value.to_string()
        } else {
            continue;
        };
        params.push((name.to_ascii_lowercase(), value));
    }
    params
}

// splits at `;` outside of quoted strings
fn split_segments(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

/// Rewrites a broken `Content-Type` value into something parseable
///
/// Keeps the type and every `name=value` parameter whose name is a token and
/// whose value is a token or a quoted string. Unquoted values with spaces or
/// special characters get quoted, parameters without a value or with a
/// repeated name are dropped.
pub fn fix_media_type(value: &str) -> String {
    let segments = split_segments(value);
    let mut fixed = segments[0].trim().to_string();
    let mut names: Vec<String> = Vec::new();

    for segment in &segments[1..] {
        let eq = match segment.find('=') {
            Some(eq) => eq,
            None => continue,
        };
        let name = segment[..eq].trim();
        let value = segment[eq + 1..].trim();
        if name.is_empty() || unquote(value).is_empty() || !is_token(name) {
            continue;
        }
        let lower = name.to_ascii_lowercase();
        if names.contains(&lower) {
            continue;
        }

        let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value.to_string()
        } else if value.contains('"') {
            continue;
        } else if is_token(value) {
            value.to_string()
        } else {
            quote(value)
        };

        fixed.push_str("; ");
        fixed.push_str(name);
        fixed.push('=');
        fixed.push_str(&value);
        names.push(lower);
    }

    fixed
}

// RFC 2231: joins `name*0`, `name*1*`, ... and decodes `charset'lang'%XX`
// values. A combined value replaces a plain parameter of the same name.
fn combine_sections(raw: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut plain: Vec<(String, String)> = Vec::with_capacity(raw.len());
    let mut split: Vec<(String, Vec<(u32, bool, String)>)> = Vec::new();

    for (name, value) in raw {
        match parse_section_name(&name) {
            None => {
                if !plain.iter().any(|(n, _)| *n == name) {
                    plain.push((name, value));
                }
            }
            Some((base, index, extended)) => {
                match split.iter_mut().find(|(n, _)| n == base) {
                    Some((_, sections)) => sections.push((index, extended, value)),
                    None => split.push((base.to_string(), vec![(index, extended, value)])),
                }
            }
        }
    }

    for (base, mut sections) in split {
        sections.sort_by_key(|section| section.0);
        let value = join_sections(&sections);
        match plain.iter_mut().find(|(n, _)| *n == base) {
            Some(param) => param.1 = value,
            None => plain.push((base, value)),
        }
    }

    plain
}

fn parse_section_name(name: &str) -> Option<(&str, u32, bool)> {
    let star = name.find('*')?;
    let (base, rest) = (&name[..star], &name[star + 1..]);
    if base.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some((base, 0, true));
    }
    let (index, extended) = match rest.strip_suffix('*') {
        Some(index) => (index, true),
        None => (rest, false),
    };
    index.parse().ok().map(|index| (base, index, extended))
}

fn join_sections(sections: &[(u32, bool, String)]) -> String {
    let mut charset = None;
    let mut bytes = Vec::new();

    for (i, (_, extended, value)) in sections.iter().enumerate() {
        if !*extended {
            bytes.extend_from_slice(value.as_bytes());
            continue;
        }
        let mut value = value.as_str();
        if i == 0 {
            let mut fields = value.splitn(3, '\'');
            if let (Some(label), Some(_language), Some(rest)) =
                (fields.next(), fields.next(), fields.next())
            {
                charset = Some(label);
                value = rest;
            }
        }
        bytes.extend(percent_decode_str(value));
    }

    let encoding = charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (value, _) = encoding.decode_without_bom_handling(&bytes);
    value.into_owned()
}

#[cfg(test)]
mod test {
    use super::{fix_media_type, ContentTransferEncoding, Disposition, MediaType};

    #[test]
    fn transfer_encoding() {
        assert_eq!(
            " Base64\t".parse::<ContentTransferEncoding>(),
            Ok(ContentTransferEncoding::Base64)
        );
        assert_eq!(
            "QUOTED-PRINTABLE".parse::<ContentTransferEncoding>(),
            Ok(ContentTransferEncoding::QuotedPrintable)
        );
        assert!("x-uuencode".parse::<ContentTransferEncoding>().is_err());

        assert_eq!(
            ContentTransferEncoding::EightBit.for_output(),
            ContentTransferEncoding::SevenBit
        );
        assert_eq!(
            ContentTransferEncoding::Binary.for_output(),
            ContentTransferEncoding::SevenBit
        );
        assert_eq!(
            ContentTransferEncoding::Base64.for_output(),
            ContentTransferEncoding::Base64
        );
        assert_eq!(
            format!("{}", ContentTransferEncoding::QuotedPrintable),
            "quoted-printable"
        );
    }

    #[test]
    fn media_type() {
        let media = MediaType::parse("Multipart/Mixed; boundary=\"Abc Def\"; charset=utf-8").unwrap();

        assert_eq!(media.essence, "multipart/mixed");
        assert!(media.is_multipart());
        assert_eq!(media.param("boundary"), Some("Abc Def"));
        assert_eq!(media.param("CHARSET"), Some("utf-8"));
        assert_eq!(media.param("name"), None);
    }

    #[test]
    fn repaired_media_type() {
        let media = MediaType::parse("text/html; charset=utf-8; format flowed; charset=koi8-r").unwrap();

        assert_eq!(media.essence, "text/html");
        assert_eq!(media.params, vec![("charset".to_string(), "utf-8".to_string())]);
    }

    #[test]
    fn broken_media_type() {
        assert!(MediaType::parse("not a media type").is_err());
    }

    #[test]
    fn fixing() {
        assert_eq!(
            fix_media_type("text/plain; charset = utf-8;; name=my file.txt; charset=latin1;"),
            "text/plain; charset=utf-8; name=\"my file.txt\""
        );
        assert_eq!(
            fix_media_type("application/pdf; name=\"a;b.pdf\"; x=\"bad"),
            "application/pdf; name=\"a;b.pdf\""
        );
    }

    #[test]
    fn empty_quoted_values() {
        assert_eq!(fix_media_type("text/plain; charset=\"\""), "text/plain");
        assert_eq!(
            fix_media_type("multipart/mixed; boundary=\"\"; boundary=\"b1\""),
            "multipart/mixed; boundary=\"b1\""
        );

        let media = MediaType::parse("text/plain; charset=\"\"").unwrap();
        assert_eq!(media.essence, "text/plain");
        assert_eq!(media.param("charset"), None);

        let media = MediaType::parse("multipart/mixed; boundary=\"\"").unwrap();
        assert!(media.is_multipart());
        assert_eq!(media.param("boundary"), None);
    }

    #[test]
    fn extended_parameters() {
        let media = MediaType::parse(concat!(
            "application/octet-stream; name=fallback.bin; ",
            "name*0*=utf-8''%D1%84%D0%B0%D0%B9; name*1=l.txt"
        ))
        .unwrap();

        assert_eq!(media.param("name"), Some("файl.txt"));
    }

    #[test]
    fn disposition() {
        let disposition = Disposition::parse(
            "Attachment; filename=\"report; final.pdf\"; size=12; creation-date=\"bad",
        )
        .unwrap();

        assert_eq!(disposition.kind, "attachment");
        assert_eq!(disposition.param("filename"), Some("report; final.pdf"));
        assert_eq!(disposition.param("size"), Some("12"));
        assert_eq!(disposition.param("creation-date"), None);

        let disposition = Disposition::parse("inline; filename*=iso-8859-1'en'caf%E9.txt").unwrap();
        assert_eq!(disposition.param("filename"), Some("café.txt"));

        assert_eq!(Disposition::parse("in line"), None);
        assert_eq!(Disposition::parse(""), None);
    }
}
