use std::cmp::min;
use std::io::{BufRead, ErrorKind, Read, Result as IoResult};

/// Default size of the lookahead window
pub const DEFAULT_PEEK_SIZE: usize = 4096;

/// Buffered reader with explicit lookahead
///
/// Unlike `BufReader`, a `peek()` is allowed to ask for more bytes than are
/// buffered right now: the buffer is compacted or grown until it holds the
/// requested amount or the source is exhausted. A short peek therefore always
/// means end of stream.
pub struct Lookahead<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    chunk: usize,
    eof: bool,
}

impl<R: Read> Lookahead<R> {
    /// Wraps reader using default window size
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_PEEK_SIZE, inner)
    }

    /// Wraps reader using custom window size
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        let capacity = capacity.max(1);
        Lookahead {
            inner,
            buf: vec![0; capacity],
            start: 0,
            end: 0,
            chunk: capacity,
            eof: false,
        }
    }

    /// Number of bytes buffered but not yet consumed
    #[inline]
    pub fn available(&self) -> usize {
        self.end - self.start
    }

    /// Returns up to `n` bytes without consuming them
    ///
    /// Fewer than `n` bytes are returned only at end of stream.
    pub fn peek(&mut self, n: usize) -> IoResult<&[u8]> {
        self.fill_to(n)?;
        let len = min(n, self.available());
        Ok(&self.buf[self.start..self.start + len])
    }

    /// Consumes `n` buffered bytes
    pub fn advance(&mut self, n: usize) {
        self.start += min(n, self.available());
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Reads one line including its `\n`
    ///
    /// At end of stream the unterminated rest is returned, and after that an
    /// empty vector.
    pub fn read_line(&mut self) -> IoResult<Vec<u8>> {
        let mut scanned = 0;
        loop {
            let pending = &self.buf[self.start + scanned..self.end];
            if let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let len = scanned + pos + 1;
                let line = self.buf[self.start..self.start + len].to_vec();
                self.advance(len);
                return Ok(line);
            }
            scanned = self.available();
            if self.eof {
                let line = self.buf[self.start..self.end].to_vec();
                self.advance(scanned);
                return Ok(line);
            }
            let want = scanned + self.chunk;
            self.fill_to(want)?;
        }
    }

    fn fill_to(&mut self, n: usize) -> IoResult<()> {
        while self.available() < n && !self.eof {
            if self.buf.len() - self.start < n {
                self.buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
                if self.buf.len() < n {
                    self.buf.resize(n, 0);
                }
            }
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => self.eof = true,
                Ok(read) => self.end += read,
                Err(ref error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for Lookahead<R> {
    fn read(&mut self, dest: &mut [u8]) -> IoResult<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        let len = {
            let data = self.fill_buf()?;
            let len = min(data.len(), dest.len());
            dest[..len].copy_from_slice(&data[..len]);
            len
        };
        self.advance(len);
        Ok(len)
    }
}

impl<R: Read> BufRead for Lookahead<R> {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        self.fill_to(1)?;
        Ok(&self.buf[self.start..self.end])
    }

    fn consume(&mut self, amt: usize) {
        self.advance(amt);
    }
}

#[cfg(test)]
mod test {
    use super::Lookahead;
    use std::io::{BufRead, Read};

    #[test]
    fn peek_beyond_capacity() {
        let mut la = Lookahead::with_capacity(4, &b"0123456789"[..]);

        assert_eq!(la.peek(2).unwrap(), b"01");
        assert_eq!(la.peek(8).unwrap(), b"01234567");
        la.advance(3);
        assert_eq!(la.peek(20).unwrap(), b"3456789");
        la.advance(7);
        assert_eq!(la.peek(1).unwrap(), b"");
    }

    #[test]
    fn lines() {
        let mut la = Lookahead::with_capacity(3, &b"first\r\nsecond\nrest"[..]);

        assert_eq!(la.read_line().unwrap(), b"first\r\n");
        assert_eq!(la.read_line().unwrap(), b"second\n");
        assert_eq!(la.read_line().unwrap(), b"rest");
        assert_eq!(la.read_line().unwrap(), b"");
    }

    #[test]
    fn read_after_peek() {
        let mut la = Lookahead::with_capacity(4, &b"Hello, world!"[..]);
        la.peek(6).unwrap();

        let mut out = String::new();
        la.read_to_string(&mut out).unwrap();
        assert_eq!(out, "Hello, world!");
    }

    #[test]
    fn buf_read_lines() {
        let la = Lookahead::new(&b"a\nb\nc"[..]);

        let lines = la.lines().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }
}
