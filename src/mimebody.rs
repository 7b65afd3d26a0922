use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::io::{BufWriter, Write};

use crate::charset::{CharsetCodec, EncodingRs};
use crate::encoder::{EncoderChunk, DEFAULT_LINE_WIDTH};
use crate::error::{Error, Result};
use crate::header::{
    decode_header_value, fold_header, ContentTransferEncoding, Disposition, Headers, MediaType,
    CONTENT_DISPOSITION, CONTENT_ID, CONTENT_TRANSFER_ENCODING, CONTENT_TYPE,
};

/// Content type assumed when a part declares none (RFC 2045)
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=us-ascii";

pub(crate) const MESSAGE_RFC822: &str = "message/rfc822";

/// Id of the `index`-th child of the part with id `parent`
pub fn child_id(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{}.{}", parent, index)
    }
}

/// Node of a parsed message
///
/// The root is the message itself and has an empty id. Children are
/// numbered from zero, so the second child of the first child of the root
/// has id `0.1`.
///
/// # Example
///
/// ```
/// use mimetree::Part;
///
/// let mut message = Part::new()
///     .with_header("Content-Type", "multipart/mixed; boundary=\"sep\"")
///     .with_child(Part::new().with_content("first"))
///     .with_child(Part::new().with_content("second"));
///
/// assert_eq!(message.children()[1].id(), "1");
/// assert!(message.to_bytes().unwrap().ends_with(b"\r\n--sep--\r\n"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub(crate) id: String,
    pub(crate) headers: Headers,

    pub(crate) content_type: String,
    pub(crate) disposition: String,
    pub(crate) file_name: String,
    pub(crate) charset: String,
    pub(crate) boundary: String,
    pub(crate) content_id: String,

    pub(crate) content: Bytes,
    pub(crate) children: Vec<Part>,
}

impl Part {
    /// Creates an empty `text/plain` part
    pub fn new() -> Self {
        Part {
            content_type: "text/plain".into(),
            charset: "us-ascii".into(),
            ..Part::default()
        }
    }

    pub(crate) fn with_id(id: String) -> Self {
        Part {
            id,
            ..Part::default()
        }
    }

    /// Path of the part in the tree
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Lowercase `type/subtype` of the part
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Lowercase disposition type, empty when not declared
    #[inline]
    pub fn disposition(&self) -> &str {
        &self.disposition
    }

    /// File name from the disposition, or from the `name` type parameter
    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[inline]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    #[inline]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[inline]
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Decoded body of a leaf part
    #[inline]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    #[inline]
    pub fn children(&self) -> &[Part] {
        &self.children
    }

    /// Length of the decoded body
    #[inline]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// `message/rfc822` container
    #[inline]
    pub fn is_message(&self) -> bool {
        self.content_type == MESSAGE_RFC822
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/")
    }

    /// Declared transfer encoding, if it is a known one
    pub fn transfer_encoding(&self) -> Option<ContentTransferEncoding> {
        self.headers
            .get(CONTENT_TRANSFER_ENCODING)
            .and_then(|value| value.parse().ok())
    }

    /// Adds a header line and move the Part
    ///
    /// Useful for the "builder-style" pattern.
    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.append(name, value);
        self.refresh();
        self
    }

    /// Replaces a header
    pub fn set_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.headers.set(name, value);
        self.refresh();
    }

    /// Set the body and move the Part
    #[inline]
    pub fn with_content<T: Into<Bytes>>(mut self, content: T) -> Self {
        self.content = content.into();
        self
    }

    /// Adds a child and move the Part
    pub fn with_child(mut self, child: Part) -> Self {
        self.children.push(child);
        self.renumber();
        self
    }

    /// Reassigns the ids of all descendants from the id of this part
    pub fn renumber(&mut self) {
        for (index, child) in self.children.iter_mut().enumerate() {
            child.id = child_id(&self.id, index);
            child.renumber();
        }
    }

    /// Sets the multipart boundary
    ///
    /// The `Content-Type` header gets the `boundary` parameter, a part without
    /// `Content-Type` becomes `multipart/mixed`.
    pub fn set_boundary<S: Into<String>>(&mut self, boundary: S) {
        let boundary = boundary.into();
        match self.headers.get(CONTENT_TYPE) {
            Some(value) => {
                let value = format!(
                    "{}; boundary=\"{}\"",
                    value.trim_end().trim_end_matches(';'),
                    boundary
                );
                self.headers.set(CONTENT_TYPE, value);
            }
            None => {
                self.headers.append(
                    CONTENT_TYPE,
                    format!("multipart/mixed; boundary=\"{}\"", boundary),
                );
                self.content_type = "multipart/mixed".into();
            }
        }
        self.boundary = boundary;
    }

    /// Finds a part of the subtree by id
    pub fn find(&self, id: &str) -> Option<&Part> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .filter(|child| {
                id == child.id
                    || (id.starts_with(child.id.as_str()) && id[child.id.len()..].starts_with('.'))
            })
            .find_map(|child| child.find(id))
    }

    /// Id of the parent part, `None` for the root
    pub fn parent_id(&self) -> Option<&str> {
        match self.id.rfind('.') {
            Some(dot) => Some(&self.id[..dot]),
            None if self.id.is_empty() => None,
            None => Some(""),
        }
    }

    /// Depth-first iterator over the subtree, this part first
    pub fn walk(&self) -> Walk {
        Walk { stack: vec![self] }
    }

    /// Writes the part out using default encoder
    pub fn encode<W: Write>(&mut self, writer: W) -> Result<()> {
        Encoder::new().encode(self, writer)
    }

    /// Encodes the part into a byte vector
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Derives the typed fields from the headers
    pub(crate) fn setup_headers(&mut self, default_content_type: &str) -> Result<()> {
        let value = self
            .headers
            .get(CONTENT_TYPE)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_content_type);
        let media_type = MediaType::parse(value).map_err(|reason| Error::MediaType {
            part_id: self.id.clone(),
            value: value.to_string(),
            reason,
        })?;

        self.content_type = media_type.essence.clone();
        self.boundary = media_type.param("boundary").unwrap_or("").to_string();
        self.charset = media_type
            .param("charset")
            .unwrap_or("")
            .to_ascii_lowercase();
        self.content_id = self.headers.get(CONTENT_ID).unwrap_or("").to_string();
        self.disposition.clear();
        self.file_name.clear();

        if let Some(value) = self.headers.get(CONTENT_DISPOSITION) {
            match Disposition::parse(value) {
                Some(disposition) => {
                    self.file_name = decode_header_value(disposition.param("filename").unwrap_or(""));
                    self.disposition = disposition.kind;
                }
                None => debug!("Ignoring disposition {:?} of part {:?}", value, self.id),
            }
        }
        if self.file_name.is_empty() {
            if let Some(name) = media_type.param("name") {
                self.file_name = decode_header_value(name);
            }
        }

        Ok(())
    }

    fn refresh(&mut self) {
        if let Err(error) = self.setup_headers(DEFAULT_CONTENT_TYPE) {
            debug!("Keeping previous content type: {}", error);
        }
    }
}

/// Depth-first walk over a part tree
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}

/// Encoder options
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub(crate) line_width: usize,
    pub(crate) encode_charset: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            line_width: DEFAULT_LINE_WIDTH,
            encode_charset: true,
        }
    }
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column to fold headers and wrap base64 at
    pub fn line_width(mut self, line_width: usize) -> Self {
        self.line_width = line_width;
        self
    }

    /// Convert text content into its declared charset
    pub fn encode_charset(mut self, encode_charset: bool) -> Self {
        self.encode_charset = encode_charset;
        self
    }
}

/// Part tree serializer
///
/// Generates boundaries for multiparts which have none, using its own random
/// generator.
pub struct Encoder<C = EncodingRs, G = StdRng> {
    options: EncoderOptions,
    charsets: C,
    rng: G,
}

impl Encoder {
    /// Creates encoder with a freshly seeded generator
    pub fn new() -> Self {
        Encoder {
            options: EncoderOptions::default(),
            charsets: EncodingRs,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CharsetCodec, G: Rng> Encoder<C, G> {
    pub fn with_options(mut self, options: EncoderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_rng<H: Rng>(self, rng: H) -> Encoder<C, H> {
        Encoder {
            options: self.options,
            charsets: self.charsets,
            rng,
        }
    }

    pub fn with_charsets<D: CharsetCodec>(self, charsets: D) -> Encoder<D, G> {
        Encoder {
            options: self.options,
            charsets,
            rng: self.rng,
        }
    }

    /// Random boundary token
    pub fn boundary(&mut self) -> String {
        format!("{:028x}", self.rng.gen::<u64>())
    }

    /// Writes the part tree out
    ///
    /// Drops duplicate `Content-Type` headers and sets missing multipart
    /// boundaries on the way.
    pub fn encode<W: Write>(&mut self, part: &mut Part, writer: W) -> Result<()> {
        part.renumber();
        let mut out = BufWriter::new(writer);
        self.encode_part(part, None, &mut out)?;
        out.flush()?;
        Ok(())
    }

    fn encode_part(
        &mut self,
        part: &mut Part,
        inherited: Option<ContentTransferEncoding>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let encoding = self.setup_part(part, inherited);

        for (name, value) in part.headers.iter() {
            out.write_all(fold_header(name, value, self.options.line_width).as_bytes())?;
        }

        if !part.content.is_empty() {
            out.write_all(b"\r\n")?;
            let content = self.charset_encode(part);
            let mut codec = EncoderChunk::get(encoding, self.options.line_width);
            out.write_all(&codec.encode_chunk(&content))?;
        }

        if part.children.is_empty() {
            return Ok(());
        }

        if part.is_message() {
            let declared = part.transfer_encoding();
            // a base64 body follows the headers directly
            if declared != Some(ContentTransferEncoding::Base64) {
                out.write_all(b"\r\n")?;
            }
            return self.encode_part(&mut part.children[0], declared, out);
        }

        let delimiter = format!("\r\n--{}\r\n", part.boundary);
        for child in part.children.iter_mut() {
            out.write_all(delimiter.as_bytes())?;
            self.encode_part(child, None, &mut *out)?;
        }
        write!(out, "\r\n--{}--\r\n", part.boundary)?;
        Ok(())
    }

    // Picks the output transfer encoding and prepares headers
    fn setup_part(
        &mut self,
        part: &mut Part,
        inherited: Option<ContentTransferEncoding>,
    ) -> ContentTransferEncoding {
        part.headers.dedup(CONTENT_TYPE);

        // synthetic body of a base64 message takes the encoding of the container
        let declared = if part.headers.is_empty() {
            inherited
        } else {
            part.transfer_encoding()
        };

        if !part.is_message() && !part.children.is_empty() && part.boundary.is_empty() {
            let boundary = self.boundary();
            trace!("Generated boundary {:?} for part {:?}", boundary, part.id);
            part.set_boundary(boundary);
        }

        declared.unwrap_or_default().for_output()
    }

    fn charset_encode<'a>(&self, part: &'a Part) -> Cow<'a, [u8]> {
        if self.options.encode_charset && part.is_text() && !part.charset.is_empty() {
            if let Some(encoded) = self.charsets.encode(&part.charset, &part.content) {
                return Cow::Owned(encoded);
            }
        }
        Cow::Borrowed(&part.content)
    }
}
