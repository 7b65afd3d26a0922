//! Part headers
//!
//! [`Headers`] keeps every header line of a part: lookups ignore the case of
//! the name, while the declaration order, the original spelling of names and
//! duplicates are kept for encoding.

mod content;
mod encoded_word;
mod fold;

pub use self::content::*;
pub use self::encoded_word::decode_header_value;
pub use self::fold::fold_header;

use encoding_rs::WINDOWS_1252;
use std::collections::HashMap;
use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};
use std::io::{BufRead, Result as IoResult};
use std::str::from_utf8;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
pub const CONTENT_ID: &str = "Content-ID";

/// Ordered collection of header fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    // names as declared on the wire, duplicates included
    order: Vec<String>,
    // lowercased name -> values in declaration order
    values: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    /// Number of header lines
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Declared names in wire order
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// First value of the header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values of the header in declaration order
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_ascii_lowercase())
    }

    /// Adds one more header line
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        self.values
            .entry(name.to_ascii_lowercase())
            .or_insert_with(Vec::new)
            .push(value.into());
        self.order.push(name);
    }

    /// Replaces all values of the header with a single one
    ///
    /// The header keeps the position of its first declaration.
    pub fn set<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        if self.contains(&name) {
            self.dedup(&name);
            if let Some(values) = self.values.get_mut(&name.to_ascii_lowercase()) {
                values[0] = value.into();
            }
        } else {
            self.append(name, value);
        }
    }

    /// Removes every line of the header, returning the values
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        self.order.retain(|n| !n.eq_ignore_ascii_case(name));
        self.values
            .remove(&name.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Drops every line of the header but the first one
    pub fn dedup(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        match self.values.get_mut(&key) {
            Some(values) if values.len() > 1 => values.truncate(1),
            _ => return,
        }
        let mut seen = false;
        self.order.retain(|n| {
            if !n.eq_ignore_ascii_case(&key) {
                true
            } else if seen {
                false
            } else {
                seen = true;
                true
            }
        });
    }

    /// Iterates `(name, value)` pairs in declaration order
    pub fn iter(&self) -> Iter {
        Iter {
            headers: self,
            index: 0,
            cursors: HashMap::new(),
        }
    }
}

impl Display for Headers {
    fn fmt(&self, f: &mut FmtFormatter) -> FmtResult {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over header lines in declaration order
pub struct Iter<'a> {
    headers: &'a Headers,
    index: usize,
    cursors: HashMap<String, usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let headers = self.headers;
        while let Some(name) = headers.order.get(self.index) {
            self.index += 1;
            let key = name.to_ascii_lowercase();
            let cursor = self.cursors.entry(key.clone()).or_insert(0);
            let value = headers
                .values
                .get(&key)
                .and_then(|values| values.get(*cursor));
            *cursor += 1;
            if let Some(value) = value {
                return Some((name.as_str(), value.as_str()));
            }
        }
        None
    }
}

/// Reads a header block
///
/// Stops after the first blank line or at end of stream. Folded lines are
/// joined with a single space. A line without a colon is taken for an
/// unintended continuation, a line starting with a colon is dropped.
pub fn read_header<R: BufRead>(src: &mut R) -> IoResult<Headers> {
    let mut headers = Headers::new();
    let mut current: Option<(String, String)> = None;
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if src.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let line = decode_line(&raw);
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        if line.starts_with(&[' ', '\t'][..]) {
            if let Some((_, value)) = current.as_mut() {
                push_continuation(value, line);
            }
            continue;
        }

        match line.find(':') {
            Some(0) => {}
            Some(colon) => {
                if let Some((name, value)) = current.take() {
                    headers.append(name, value);
                }
                current = Some((
                    line[..colon].trim().to_string(),
                    line[colon + 1..].trim().to_string(),
                ));
            }
            None if line.is_empty() => break,
            None => {
                if let Some((_, value)) = current.as_mut() {
                    push_continuation(value, line);
                }
            }
        }
    }

    if let Some((name, value)) = current {
        headers.append(name, value);
    }
    Ok(headers)
}

fn push_continuation(value: &mut String, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if !value.is_empty() {
        value.push(' ');
    }
    value.push_str(line);
}

fn decode_line(raw: &[u8]) -> String {
    match from_utf8(raw) {
        Ok(line) => line.to_string(),
        Err(_) => {
            let (line, _, _) = WINDOWS_1252.decode(raw);
            line.into_owned()
        }
    }
}
