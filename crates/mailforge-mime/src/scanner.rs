//! Line scanner over raw message bytes.
//!
//! Header blocks and multipart boundaries are located line by line instead of
//! by substring offsets. Every line carries the byte range it came from so
//! callers can slice the original input without re-counting terminators.

/// A single line of input with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line content without the trailing `\n` or `\r\n`.
    pub text: &'a [u8],
    /// Offset of the first byte of the line.
    pub start: usize,
    /// Offset of the first byte after the line terminator.
    pub next: usize,
}

impl Line<'_> {
    /// Returns true if the line is empty or only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.iter().all(u8::is_ascii_whitespace)
    }
}

/// Iterator over the lines of a byte buffer.
#[derive(Debug, Clone)]
pub struct LineScanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> LineScanner<'a> {
    /// Creates a scanner positioned at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.input.len() {
            return None;
        }

        let start = self.pos;
        let rest = &self.input[start..];
        let (raw, next) = rest.iter().position(|&b| b == b'\n').map_or_else(
            || (rest, self.input.len()),
            |idx| (&rest[..idx], start + idx + 1),
        );
        self.pos = next;

        let text = raw.strip_suffix(b"\r").unwrap_or(raw);
        Some(Line { text, start, next })
    }
}

/// Splits a message into its header block and body at the first blank line.
///
/// The blank line itself belongs to neither half. Returns `None` when the
/// input has no blank line.
#[must_use]
pub fn split_head_body(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    LineScanner::new(raw)
        .find(|line| line.text.is_empty())
        .map(|line| (&raw[..line.start], &raw[line.next..]))
}

/// Splits a multipart body into the raw bytes of each part.
///
/// The preamble before the first delimiter and the epilogue after the closing
/// delimiter are dropped. A missing closing delimiter ends the last part at the
/// end of input. The line break preceding each delimiter belongs to the
/// delimiter.
#[must_use]
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut current: Option<usize> = None;

    for line in LineScanner::new(body) {
        let text = trim_end(line.text);
        let Some(rest) = text.strip_prefix(delimiter) else {
            continue;
        };

        let closing = rest == b"--";
        if !rest.is_empty() && !closing {
            continue;
        }

        if let Some(start) = current.take() {
            parts.push(strip_line_break(&body[start..line.start]));
        }

        if closing {
            return parts;
        }
        current = Some(line.next);
    }

    if let Some(start) = current {
        parts.push(&body[start..]);
    }
    parts
}

/// Trims trailing ASCII whitespace.
fn trim_end(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    &bytes[..end]
}

/// Removes a single trailing `\n` or `\r\n`.
fn strip_line_break(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_strip_terminators() {
        let lines: Vec<_> = LineScanner::new(b"a\r\nb\nc").map(|l| l.text).collect();
        assert_eq!(lines, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn test_line_offsets() {
        let input = b"ab\r\ncd\n";
        let lines: Vec<_> = LineScanner::new(input).collect();
        assert_eq!(lines[0].start, 0);
        assert_eq!(lines[0].next, 4);
        assert_eq!(lines[1].start, 4);
        assert_eq!(lines[1].next, 7);
    }

    #[test]
    fn test_split_head_body() {
        let (head, body) = split_head_body(b"Subject: x\r\nFrom: y\r\n\r\nbody\r\n").unwrap();
        assert_eq!(head, b"Subject: x\r\nFrom: y\r\n");
        assert_eq!(body, b"body\r\n");
    }

    #[test]
    fn test_split_head_body_without_blank_line() {
        assert!(split_head_body(b"Subject: x\nFrom: y").is_none());
    }

    #[test]
    fn test_split_head_body_leading_blank_line() {
        let (head, body) = split_head_body(b"\nonly body").unwrap();
        assert!(head.is_empty());
        assert_eq!(body, b"only body");
    }

    #[test]
    fn test_split_multipart() {
        let body = b"preamble\r\n--b1\r\nA: 1\r\n\r\nfirst\r\n--b1\r\n\r\nsecond\r\n--b1--\r\nepilogue";
        let parts = split_multipart(body, "b1");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"A: 1\r\n\r\nfirst");
        assert_eq!(parts[1], b"\r\nsecond");
    }

    #[test]
    fn test_split_multipart_without_closing_delimiter() {
        let parts = split_multipart(b"--xyz\nhello\n", "xyz");
        assert_eq!(parts, vec![&b"hello\n"[..]]);
    }

    #[test]
    fn test_split_multipart_ignores_longer_boundaries() {
        let parts = split_multipart(b"--ab\nx\n--abc\ny\n--ab--\n", "ab");
        assert_eq!(parts, vec![&b"x\n--abc\ny"[..]]);
    }

    #[test]
    fn test_split_multipart_no_delimiter() {
        assert!(split_multipart(b"plain text only", "zzz").is_empty());
    }
}
