/// Formats a header line, folding it when it grows past `width` columns
///
/// The line is broken at the last space or tab seen before the limit, and the
/// whitespace is replaced by a line break and a tab. A line without any
/// whitespace before the limit stays long. The result ends with CRLF.
pub fn fold_header(name: &str, value: &str, width: usize) -> String {
    let line = format!("{}: {}\r\n", name, value);
    let bytes = line.as_bytes();
    // never break right after the colon
    let first_break = name.len() + 1;

    let mut out = String::with_capacity(line.len() + 8);
    let mut last_space: Option<usize> = None;
    let mut last_read = 0;
    let mut line_len = 0;

    for (i, b) in bytes.iter().enumerate() {
        line_len += 1;
        if (*b == b' ' || *b == b'\t') && i > first_break {
            last_space = Some(i);
        }
        if line_len >= width {
            if let Some(space) = last_space.take() {
                out.push_str(&line[last_read..space]);
                out.push_str("\r\n\t");
                last_read = space + 1;
                line_len = i - space;
            }
        }
    }
    out.push_str(&line[last_read..]);
    out
}
