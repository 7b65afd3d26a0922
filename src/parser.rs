use std::io::{self, Read};

use crate::boundary::{BoundaryReader, Scan};
use crate::charset::{CharsetCodec, EncodingRs};
use crate::decoder::{decode_base64, decode_transfer, Base64Cleaner};
use crate::error::{BoundaryError, DecodeError, Error, Result};
use crate::header::{read_header, ContentTransferEncoding};
use crate::lookahead::{Lookahead, DEFAULT_PEEK_SIZE};
use crate::mimebody::{child_id, Part, DEFAULT_CONTENT_TYPE};

/// Default nesting limit of multipart and message bodies
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser options
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub(crate) peek_size: usize,
    pub(crate) decode_charset: bool,
    pub(crate) strict_termination: bool,
    pub(crate) default_content_type: String,
    pub(crate) max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            peek_size: DEFAULT_PEEK_SIZE,
            decode_charset: true,
            strict_termination: false,
            default_content_type: DEFAULT_CONTENT_TYPE.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the lookahead window used to find boundaries
    pub fn peek_size(mut self, peek_size: usize) -> Self {
        self.peek_size = peek_size;
        self
    }

    /// Convert text parts into UTF-8
    pub fn decode_charset(mut self, decode_charset: bool) -> Self {
        self.decode_charset = decode_charset;
        self
    }

    /// Fail on multipart bodies which end without the closing delimiter
    pub fn strict_termination(mut self, strict_termination: bool) -> Self {
        self.strict_termination = strict_termination;
        self
    }

    /// Content type of parts which declare none
    pub fn default_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    /// Nesting depth below which container parts are kept whole
    ///
    /// A multipart or message part at this depth becomes a leaf holding its
    /// raw body. The root is at depth zero.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

type Source<'a> = Lookahead<&'a mut dyn Read>;

/// Message parser
///
/// Builds the whole part tree in one pass over the stream. Broken content
/// encodings do not stop it, broken structure does.
///
/// # Example
///
/// ```
/// use mimetree::Parser;
///
/// let message = Parser::new()
///     .parse(&b"Content-Type: text/plain; charset=koi8-r\r\n\r\n\xf0\xd2\xc9\xd7\xc5\xd4"[..])
///     .unwrap();
///
/// assert_eq!(message.content(), "Привет");
/// ```
pub struct Parser<C = EncodingRs> {
    options: ParserOptions,
    charsets: C,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            options: ParserOptions::default(),
            charsets: EncodingRs,
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CharsetCodec> Parser<C> {
    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_charsets<D: CharsetCodec>(self, charsets: D) -> Parser<D> {
        Parser {
            options: self.options,
            charsets,
        }
    }

    /// Parses a message into a part tree
    pub fn parse<R: Read>(&self, mut reader: R) -> Result<Part> {
        let mut src = Lookahead::with_capacity(self.options.peek_size, &mut reader as &mut dyn Read);
        self.parse_part(String::new(), 0, &mut src)
    }

    fn parse_part(&self, id: String, depth: usize, src: &mut Source) -> Result<Part> {
        let mut part = Part::with_id(id);
        part.headers = read_header(src)?;
        part.setup_headers(&self.options.default_content_type)?;
        trace!("Found part {:?} of type {}", part.id, part.content_type);

        let multipart = part.content_type.starts_with("multipart/") && !part.boundary.is_empty();
        let container = multipart || part.is_message();
        if container && depth >= self.options.max_depth {
            debug!("Keeping part {:?} unsplit at depth {}", part.id, depth);
            self.read_content(&mut part, src)?;
        } else if multipart {
            self.parse_multipart(&mut part, depth, src)?;
        } else if part.is_message() {
            self.parse_message(&mut part, depth, src)?;
        } else {
            self.read_content(&mut part, src)?;
        }

        Ok(part)
    }

    fn parse_multipart(&self, part: &mut Part, depth: usize, src: &mut Source) -> Result<()> {
        let mut scanner = BoundaryReader::with_window(src, &part.boundary, self.options.peek_size);

        loop {
            match scanner.next_part()? {
                Scan::Delimiter => {}
                Scan::Terminator => break,
                Scan::Malformed(BoundaryError::Truncated) if !self.options.strict_termination => {
                    debug!("Multipart body of part {:?} ended without terminator", part.id);
                    break;
                }
                Scan::Malformed(source) => {
                    return Err(Error::MalformedBoundary {
                        part_id: part.id.clone(),
                        source,
                    });
                }
            }

            let id = child_id(&part.id, part.children.len());
            let mut body = Lookahead::with_capacity(
                self.options.peek_size,
                &mut scanner as &mut dyn Read,
            );
            let child = self.parse_part(id, depth + 1, &mut body)?;
            // whatever the child did not consume belongs to it too
            io::copy(&mut body, &mut io::sink())?;
            part.children.push(child);
        }

        // epilogue
        io::copy(src, &mut io::sink())?;
        Ok(())
    }

    fn parse_message(&self, part: &mut Part, depth: usize, src: &mut Source) -> Result<()> {
        let id = child_id(&part.id, 0);

        if part.transfer_encoding() == Some(ContentTransferEncoding::Base64) {
            // the message stays opaque: one text child with the decoded bytes
            let mut child = Part::with_id(id);
            child.content_type = "text/plain".into();

            let mut raw = Vec::new();
            Base64Cleaner::new(&mut *src).read_to_end(&mut raw)?;
            let (content, error) = decode_base64(&raw);
            if let Some(error) = error {
                warn!("Keeping partially decoded message {:?}: {}", child.id, error);
            }
            child.content = content.into();
            part.children.push(child);
        } else {
            let child = self.parse_part(id, depth + 1, src)?;
            part.children.push(child);
        }

        Ok(())
    }

    fn read_content(&self, part: &mut Part, src: &mut Source) -> Result<()> {
        let encoding = part.transfer_encoding().unwrap_or_default();

        let mut raw = Vec::new();
        if encoding == ContentTransferEncoding::Base64 {
            Base64Cleaner::new(&mut *src).read_to_end(&mut raw)?;
        } else {
            src.read_to_end(&mut raw)?;
        }

        let (content, error) = decode_transfer(encoding, &raw);
        if let Some(error) = error {
            warn!("Keeping partially decoded content of part {:?}: {}", part.id, error);
        }

        let content = if self.options.decode_charset && part.is_text() && !part.charset.is_empty() {
            match self.charsets.decode(&part.charset, &content) {
                Some(decoded) => decoded,
                None => {
                    warn!(
                        "Keeping undecoded text of part {:?}: {}",
                        part.id,
                        DecodeError::Charset(part.charset.clone())
                    );
                    content
                }
            }
        } else {
            content
        };

        part.content = content.into();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Parser, ParserOptions, DEFAULT_MAX_DEPTH};
    use crate::error::{BoundaryError, Error};
    use std::cmp::min;
    use std::io::{self, Read};

    // hands out `data`, then fails
    struct BrokenReader<'a> {
        data: &'a [u8],
    }

    impl Read for BrokenReader<'_> {
        fn read(&mut self, dest: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::Other, "connection reset"));
            }
            let len = min(dest.len(), self.data.len());
            dest[..len].copy_from_slice(&self.data[..len]);
            self.data = &self.data[len..];
            Ok(len)
        }
    }

    fn nested(levels: usize) -> String {
        let mut body = String::from("\r\nleaf");
        for level in (0..levels).rev() {
            body = format!(
                "Content-Type: multipart/mixed; boundary=b{0}\r\n\r\n--b{0}\r\n{1}\r\n--b{0}--\r\n",
                level, body
            );
        }
        body
    }

    #[test]
    fn single_part() {
        let message = Parser::new()
            .parse(
                concat!(
                    "Subject: test\r\n",
                    "Content-Type: text/plain; charset=utf-8\r\n",
                    "Content-Transfer-Encoding: quoted-printable\r\n",
                    "\r\n",
                    "=D0=9F=D1=80=D0=B8=D0=B2=D0=B5=D1=82, =\r\n",
                    "=D0=BC=D0=B8=D1=80!"
                )
                .as_bytes(),
            )
            .unwrap();

        assert_eq!(message.id(), "");
        assert_eq!(message.content_type(), "text/plain");
        assert_eq!(message.charset(), "utf-8");
        assert_eq!(message.content(), "Привет, мир!");
        assert!(message.children().is_empty());
    }

    #[test]
    fn default_content_type() {
        let message = Parser::new().parse(&b"\r\nbody"[..]).unwrap();
        assert_eq!(message.content_type(), "text/plain");
        assert_eq!(message.charset(), "us-ascii");
        assert_eq!(message.content(), "body");

        let message = Parser::new()
            .with_options(ParserOptions::new().default_content_type("application/octet-stream"))
            .parse(&b"X-Header: 1\r\n\r\nbody"[..])
            .unwrap();
        assert_eq!(message.content_type(), "application/octet-stream");
    }

    #[test]
    fn nested_multipart() {
        let input = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "This is a multi-part message in MIME format.\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<b>html</b>\r\n",
            "--inner--\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "AAEC\r\n",
            "Aw==\r\n",
            "--outer--\r\n",
            "epilogue\r\n"
        );

        for peek_size in &[16, 64, 4096] {
            let message = Parser::new()
                .with_options(ParserOptions::new().peek_size(*peek_size))
                .parse(input.as_bytes())
                .unwrap();

            let ids = message.walk().map(|part| part.id().to_string()).collect::<Vec<_>>();
            assert_eq!(ids, vec!["", "0", "0.0", "0.1", "1"]);

            assert!(message.content().is_empty());
            assert_eq!(message.find("0.0").unwrap().content(), "plain");
            assert_eq!(message.find("0.1").unwrap().content(), "<b>html</b>");
            assert_eq!(message.find("1").unwrap().content(), &[0u8, 1, 2, 3][..]);
        }
    }

    #[test]
    fn missing_terminator() {
        let input = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "first\r\n",
            "--b\r\n",
            "\r\n",
            "second"
        );

        let message = Parser::new().parse(input.as_bytes()).unwrap();
        assert_eq!(message.children().len(), 2);
        assert_eq!(message.children()[1].content(), "second");

        let error = Parser::new()
            .with_options(ParserOptions::new().strict_termination(true))
            .parse(input.as_bytes())
            .unwrap_err();
        match error {
            Error::MalformedBoundary { part_id, source } => {
                assert_eq!(part_id, "");
                assert_eq!(source, BoundaryError::Truncated);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn inner_scanner_runs_out() {
        let input = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: multipart/related; boundary=c\r\n",
            "\r\n",
            "--c\r\n",
            "\r\n",
            "inner\r\n",
            "--c\r\n",
            "\r\n",
            "x\r\n",
            "--b--\r\n"
        );

        // "--b--" ends part 0 while "c" is still open
        let message = Parser::new().parse(input.as_bytes()).unwrap();
        assert_eq!(message.find("0.0").unwrap().content(), "inner");
        assert_eq!(message.find("0.1").unwrap().content(), "x");
    }

    #[test]
    fn unexpected_line() {
        let input = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "one\r\n",
            "--b x\r\n",
            "\r\n",
            "two\r\n",
            "--b--\r\n"
        );

        match Parser::new().parse(input.as_bytes()).unwrap_err() {
            Error::MalformedBoundary { part_id, source } => {
                assert_eq!(part_id, "");
                assert_eq!(source, BoundaryError::UnexpectedLine("--b x".into()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn broken_content_is_kept() {
        let input = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "SGVsbG8h\r\n",
            "Z\r\n",
            "--b\r\n",
            "Content-Type: text/plain; charset=x-unknown\r\n",
            "\r\n",
            "raw \u{ff}\r\n",
            "--b--\r\n"
        );

        let message = Parser::new().parse(input.as_bytes()).unwrap();

        assert_eq!(message.children()[0].content(), "Hello!");
        assert_eq!(message.children()[1].content(), "raw \u{ff}");
    }

    #[test]
    fn other_message_types() {
        let input = concat!(
            "Content-Type: multipart/report; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: message/delivery-status\r\n",
            "\r\n",
            "Reporting-MTA: dns; mx.example.com\r\n",
            "--b--\r\n"
        );

        let message = Parser::new().parse(input.as_bytes()).unwrap();
        let status = &message.children()[0];

        assert_eq!(status.content_type(), "message/delivery-status");
        assert!(status.children().is_empty());
        assert_eq!(status.content(), "Reporting-MTA: dns; mx.example.com");
    }

    #[test]
    fn empty_quoted_parameters() {
        let message = Parser::new()
            .parse(&b"Content-Type: text/plain; charset=\"\"\r\n\r\nhello"[..])
            .unwrap();
        assert_eq!(message.content_type(), "text/plain");
        assert_eq!(message.charset(), "");
        assert_eq!(message.content(), "hello");

        let input = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: multipart/alternative; boundary=\"\"\r\n",
            "\r\n",
            "body\r\n",
            "--b\r\n",
            "Content-Type: text/plain; charset=\"\"\r\n",
            "\r\n",
            "text\r\n",
            "--b--\r\n"
        );

        let message = Parser::new().parse(input.as_bytes()).unwrap();
        let unsplit = &message.children()[0];
        assert_eq!(unsplit.content_type(), "multipart/alternative");
        assert_eq!(unsplit.boundary(), "");
        assert!(unsplit.children().is_empty());
        assert_eq!(unsplit.content(), "body");
        assert_eq!(message.children()[1].content(), "text");
    }

    #[test]
    fn depth_limit() {
        let message = Parser::new()
            .with_options(ParserOptions::new().max_depth(2))
            .parse(nested(3).as_bytes())
            .unwrap();

        let ids = message.walk().map(|part| part.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["", "0", "0.0"]);

        let unsplit = message.find("0.0").unwrap();
        assert_eq!(unsplit.boundary(), "b2");
        assert!(unsplit.children().is_empty());
        assert_eq!(unsplit.content(), "--b2\r\n\r\nleaf\r\n--b2--\r\n");

        let message = Parser::new().parse(nested(3).as_bytes()).unwrap();
        assert_eq!(message.find("0.0.0").unwrap().content(), "leaf");
    }

    #[test]
    fn deep_nesting() {
        let message = Parser::new().parse(nested(1000).as_bytes()).unwrap();

        assert_eq!(message.walk().count(), DEFAULT_MAX_DEPTH + 1);
        let deepest = message.walk().last().unwrap();
        assert!(deepest.children().is_empty());
        assert!(!deepest.content().is_empty());
    }

    #[test]
    fn keep_charset() {
        let message = Parser::new()
            .with_options(ParserOptions::new().decode_charset(false))
            .parse(&b"Content-Type: text/plain; charset=koi8-r\r\n\r\n\xf0\xd2\xc9\xd7\xc5\xd4"[..])
            .unwrap();

        assert_eq!(message.charset(), "koi8-r");
        assert_eq!(message.content(), &b"\xf0\xd2\xc9\xd7\xc5\xd4"[..]);
    }

    #[test]
    fn read_failure() {
        let input = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "first\r\n",
            "--b\r\n",
            "\r\n",
            "second part cut "
        );

        let error = Parser::new()
            .parse(BrokenReader {
                data: input.as_bytes(),
            })
            .unwrap_err();
        match error {
            Error::Io(error) => assert_eq!(error.kind(), io::ErrorKind::Other),
            other => panic!("unexpected error: {}", other),
        }

        let error = Parser::new()
            .parse(BrokenReader { data: b"Subject: " })
            .unwrap_err();
        assert!(matches!(error, Error::Io(_)));
    }
}
