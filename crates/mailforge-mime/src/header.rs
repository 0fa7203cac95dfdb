//! Header block parsing.

use crate::error::{Error, Result};
use crate::scanner::LineScanner;
use std::collections::HashMap;
use std::fmt;

/// Ordered collection of header fields with case-insensitive lookup.
///
/// Names keep the spelling they arrived with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the first value of every header, keyed by its first spelling.
    #[must_use]
    pub fn first_values(&self) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = HashMap::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            if !map.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                map.insert(name.clone(), value.clone());
            }
        }
        map
    }

    /// Parses an RFC 5322 header block.
    ///
    /// Parsing stops at the first empty line. Continuation lines are unfolded
    /// into the previous field with a single space.
    ///
    /// # Errors
    ///
    /// Returns an error if the block starts with a continuation line, or if a
    /// line is neither a continuation nor a `Name: value` field with a
    /// non-empty name free of whitespace and control characters.
    pub fn parse(block: &[u8]) -> Result<Self> {
        let mut headers = Self::new();

        for line in LineScanner::new(block) {
            if line.text.is_empty() {
                break;
            }
            let text = String::from_utf8_lossy(line.text);

            if text.starts_with([' ', '\t']) {
                let (_, value) = headers.fields.last_mut().ok_or_else(|| {
                    Error::InvalidHeader("continuation line before first field".into())
                })?;
                value.push(' ');
                value.push_str(text.trim());
                continue;
            }

            let (name, value) = text
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(format!("missing colon: {text}")))?;

            if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(Error::InvalidHeader(format!("malformed name: {name}")));
            }

            headers.add(name, value.trim());
        }

        Ok(headers)
    }

    /// Extracts whatever `Name: value` fields a malformed header block holds.
    ///
    /// Lines without a usable name are skipped and continuations are ignored,
    /// so this never fails.
    #[must_use]
    pub fn scan_lenient(block: &[u8]) -> Self {
        let mut headers = Self::new();

        for line in LineScanner::new(block) {
            if line.text.is_empty() {
                break;
            }
            let text = String::from_utf8_lossy(line.text);
            if text.starts_with([' ', '\t']) {
                continue;
            }

            if let Some((name, value)) = text.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(char::is_whitespace) {
                    headers.add(name, value.trim());
                }
            }
        }

        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_first_value_wins() {
        let mut headers = Headers::new();
        headers.add("Received", "from a");
        headers.add("received", "from b");
        assert_eq!(headers.get("Received"), Some("from a"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n"
        );

        let headers = Headers::parse(text.as_bytes()).unwrap();
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_parse_empty_value() {
        let headers = Headers::parse(b"Subject:\nX-Empty:   \n").unwrap();
        assert_eq!(headers.get("Subject"), Some(""));
        assert_eq!(headers.get("X-Empty"), Some(""));
    }

    #[test]
    fn test_headers_parse_rejects_missing_colon() {
        assert!(Headers::parse(b"Subject: ok\nthis is not a header\n").is_err());
    }

    #[test]
    fn test_headers_parse_rejects_leading_continuation() {
        assert!(Headers::parse(b" folded\nSubject: x\n").is_err());
    }

    #[test]
    fn test_headers_parse_rejects_spaced_name() {
        assert!(Headers::parse(b"Bad Name: x\n").is_err());
    }

    #[test]
    fn test_scan_lenient_skips_junk() {
        let block = b"From nobody Mon Jan 1\nSubject: Hi\ngarbage line\nTo: a@b.c\n";
        let headers = Headers::scan_lenient(block);
        assert_eq!(headers.get("subject"), Some("Hi"));
        assert_eq!(headers.get("to"), Some("a@b.c"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_first_values_keeps_first_spelling() {
        let mut headers = Headers::new();
        headers.add("X-Tag", "one");
        headers.add("x-tag", "two");
        let map = headers.first_values();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("X-Tag").map(String::as_str), Some("one"));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");

        let s = headers.to_string();
        assert_eq!(s, "From: sender@example.com\nTo: recipient@example.com\n");
    }
}
