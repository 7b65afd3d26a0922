//! Multipart body scanner
//!
//! [`BoundaryReader`] sits on top of a [`Lookahead`] and splits a multipart
//! body into its parts. `next_part()` skips to the next delimiter line, and
//! the `Read` implementation yields the body of the current part, stopping
//! right before the line ending which introduces the next delimiter.

use crate::error::BoundaryError;
use crate::lookahead::{Lookahead, DEFAULT_PEEK_SIZE};
use std::cmp::min;
use std::io::{Read, Result as IoResult};

/// Outcome of a delimiter scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// `--boundary` line found, another part follows
    Delimiter,

    /// `--boundary--` line found, no more parts
    Terminator,

    /// Framing is broken, no more parts can be read
    Malformed(BoundaryError),
}

/// Reader of the parts of a multipart body
pub struct BoundaryReader<'a, R> {
    src: &'a mut Lookahead<R>,
    window: usize,
    parts_read: usize,
    at_part_start: bool,
    done: Option<Scan>,

    // "\r\n" until the first delimiter line shows a bare "\n"
    crlf: bool,
    // "\r\n--boundary"
    nl_dash_boundary: Vec<u8>,
    // "--boundary--"
    dash_boundary_dash: Vec<u8>,
}

impl<'a, R: Read> BoundaryReader<'a, R> {
    /// Creates scanner using default window size
    pub fn new(src: &'a mut Lookahead<R>, boundary: &str) -> Self {
        Self::with_window(src, boundary, DEFAULT_PEEK_SIZE)
    }

    /// Creates scanner using custom window size
    ///
    /// The window never gets smaller than twice the delimiter marker.
    pub fn with_window(src: &'a mut Lookahead<R>, boundary: &str, window: usize) -> Self {
        let mut nl_dash_boundary = Vec::with_capacity(boundary.len() + 4);
        nl_dash_boundary.extend_from_slice(b"\r\n--");
        nl_dash_boundary.extend_from_slice(boundary.as_bytes());

        let mut dash_boundary_dash = nl_dash_boundary[2..].to_vec();
        dash_boundary_dash.extend_from_slice(b"--");

        let window = window.max(2 * nl_dash_boundary.len());

        BoundaryReader {
            src,
            window,
            parts_read: 0,
            at_part_start: false,
            done: None,
            crlf: true,
            nl_dash_boundary,
            dash_boundary_dash,
        }
    }

    /// Skips to the start of the next part
    ///
    /// Preamble lines before the first delimiter and blank lines between
    /// parts are skipped. Once the terminator was seen, or the framing broke,
    /// every later call returns the same outcome without touching the stream.
    pub fn next_part(&mut self) -> IoResult<Scan> {
        if let Some(done) = &self.done {
            return Ok(done.clone());
        }

        loop {
            let line = self.src.read_line()?;

            if line.is_empty() {
                return Ok(self.finish(Scan::Malformed(BoundaryError::Truncated)));
            }
            if self.is_delimiter(&line) {
                self.parts_read += 1;
                self.at_part_start = true;
                return Ok(Scan::Delimiter);
            }
            if line.starts_with(&self.dash_boundary_dash) {
                return Ok(self.finish(Scan::Terminator));
            }
            if !line.ends_with(b"\n") {
                return Ok(self.finish(Scan::Malformed(BoundaryError::Truncated)));
            }
            if line == b"\r\n" || line == b"\n" {
                continue;
            }
            if self.parts_read == 0 {
                // preamble
                continue;
            }

            let line = String::from_utf8_lossy(trim_line_ending(&line)).into_owned();
            return Ok(self.finish(Scan::Malformed(BoundaryError::UnexpectedLine(line))));
        }
    }

    fn finish(&mut self, scan: Scan) -> Scan {
        self.done = Some(scan.clone());
        scan
    }

    #[inline]
    fn marker(&self) -> &[u8] {
        if self.crlf {
            &self.nl_dash_boundary
        } else {
            &self.nl_dash_boundary[1..]
        }
    }

    // matches `^--boundary[ \t]*\r?\n`
    fn is_delimiter(&mut self, line: &[u8]) -> bool {
        let dash_boundary = &self.nl_dash_boundary[2..];
        if !line.starts_with(dash_boundary) {
            return false;
        }
        let rest = &line[dash_boundary.len()..];
        let rest = &rest[rest
            .iter()
            .position(|b| *b != b' ' && *b != b'\t')
            .unwrap_or(rest.len())..];

        if self.parts_read == 0 && rest == b"\n" {
            // first delimiter fixes the line ending for the whole body
            self.crlf = false;
        }

        match rest.first() {
            Some(b'\r') | Some(b'\n') => true,
            _ => false,
        }
    }
}

impl<'a, R: Read> Read for BoundaryReader<'a, R> {
    /// Reads body bytes of the current part
    ///
    /// Returns `Ok(0)` once the next delimiter is reached.
    fn read(&mut self, dest: &mut [u8]) -> IoResult<usize> {
        if dest.is_empty() {
            return Ok(0);
        }

        let marker_len = self.marker().len();
        let marker = if self.crlf {
            &self.nl_dash_boundary[..]
        } else {
            &self.nl_dash_boundary[1..]
        };
        let dash_boundary = &self.nl_dash_boundary[2..];

        let peek = self.src.peek(self.window)?;

        if self.at_part_start && starts_with_delimiter(peek, dash_boundary) {
            // empty body right before the next delimiter line
            return Ok(0);
        }

        let len = match find_boundary(peek, marker) {
            Some(0) => return Ok(0),
            Some(index) => index,
            None if peek.len() > marker_len => peek.len() - marker_len,
            // end of stream, nothing left to hold back
            None => peek.len(),
        };

        let len = min(len, dest.len());
        dest[..len].copy_from_slice(&peek[..len]);
        self.src.advance(len);
        if len > 0 {
            self.at_part_start = false;
        }
        Ok(len)
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn starts_with_delimiter(buf: &[u8], dash_boundary: &[u8]) -> bool {
    buf.starts_with(dash_boundary) && is_marker_end(&buf[dash_boundary.len()..])
}

// what may follow a marker for it to count: whitespace, line ending,
// "--", or nothing yet
fn is_marker_end(rest: &[u8]) -> bool {
    match rest.first() {
        None => true,
        Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => true,
        Some(b'-') => rest.len() == 1 || rest[1] == b'-',
        _ => false,
    }
}

/// Finds the delimiter marker in `buf`
///
/// Matches `\r\n--boundary` followed by whitespace, a line ending, `--`, or
/// the end of the buffer, but not `--boundary2` or `--boundary-2`. For such a
/// false match the offset right past it is returned, so the caller moves
/// over it as plain content.
pub fn find_boundary(buf: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || buf.len() < marker.len() {
        return None;
    }
    let index = buf.windows(marker.len()).position(|w| w == marker)?;
    if is_marker_end(&buf[index + marker.len()..]) {
        Some(index)
    } else {
        Some(index + marker.len())
    }
}
