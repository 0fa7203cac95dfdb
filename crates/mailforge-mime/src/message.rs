//! MIME part structure and body decoding.

use crate::charset::{self, DEFAULT_CHARSET};
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64_lenient, decode_quoted_printable, decode_rfc2047};
use crate::header::Headers;
use crate::scanner::split_head_body;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Decodes content in this encoding.
    ///
    /// Base64 that cannot be decoded even leniently is returned unchanged.
    #[must_use]
    pub fn decode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => {
                let text = String::from_utf8_lossy(body);
                decode_base64_lenient(&text).unwrap_or_else(|_| body.to_vec())
            }
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => body.to_vec(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// A MIME entity: a header block and the raw body that follows it.
///
/// Used both for the top-level message and for each multipart section.
#[derive(Debug, Clone)]
pub struct Part<'a> {
    /// Part headers.
    pub headers: Headers,
    /// Raw body bytes, still transfer-encoded.
    pub body: &'a [u8],
    /// True when the header block was malformed and scanned leniently.
    pub recovered: bool,
}

impl<'a> Part<'a> {
    /// Splits raw bytes into headers and body. Never fails.
    ///
    /// A malformed header block falls back to [`Headers::scan_lenient`]. Input
    /// without a blank line is all headers if it parses as such, otherwise all
    /// body.
    #[must_use]
    pub fn parse(raw: &'a [u8]) -> Self {
        let Some((head, body)) = split_head_body(raw) else {
            return match Headers::parse(raw) {
                Ok(headers) if !headers.is_empty() => Self {
                    headers,
                    body: &[],
                    recovered: false,
                },
                _ => Self {
                    headers: Headers::new(),
                    body: raw,
                    recovered: true,
                },
            };
        };

        match Headers::parse(head) {
            Ok(headers) => Self {
                headers,
                body,
                recovered: false,
            },
            Err(_) => Self {
                headers: Headers::scan_lenient(head),
                body,
                recovered: true,
            },
        }
    }

    /// Returns the declared content type, defaulting to text/plain.
    ///
    /// `None` means the header is present but unparseable.
    #[must_use]
    pub fn content_type(&self) -> Option<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Some(ContentType::text_plain()), |v| ContentType::parse(v).ok())
    }

    /// Returns the declared transfer encoding, if any.
    #[must_use]
    pub fn transfer_encoding(&self) -> Option<TransferEncoding> {
        self.headers
            .get("content-transfer-encoding")
            .map(TransferEncoding::parse)
    }

    /// Returns the parsed `Content-Disposition`, if any.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Returns the charset parameter or the default.
    #[must_use]
    pub fn charset(&self) -> String {
        self.content_type()
            .and_then(|ct| ct.charset().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string())
    }

    /// Returns the filename from the disposition, then the content type.
    ///
    /// RFC 2047 encoded names are decoded.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let from_disposition = self
            .disposition()
            .and_then(|d| d.filename().map(str::to_string));
        let from_type = || {
            self.content_type()
                .and_then(|ct| ct.name().map(str::to_string))
        };

        from_disposition
            .or_else(from_type)
            .map(|name| decode_rfc2047(&name))
            .filter(|name| !name.trim().is_empty())
    }

    /// Returns the `Content-ID` without angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<String> {
        self.headers
            .get("content-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
            .filter(|id| !id.is_empty())
    }

    /// Decodes the body according to its transfer encoding.
    #[must_use]
    pub fn decode_body(&self) -> Vec<u8> {
        self.transfer_encoding()
            .unwrap_or(TransferEncoding::SevenBit)
            .decode(self.body)
    }

    /// Decodes the body to text using the transfer encoding and charset.
    #[must_use]
    pub fn body_text(&self) -> String {
        charset::decode_lossy(&self.decode_body(), &self.charset())
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
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("Base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_transfer_encoding_decode() {
        assert_eq!(TransferEncoding::Base64.decode(b"SGk=\r\n"), b"Hi");
        assert_eq!(TransferEncoding::QuotedPrintable.decode(b"a=3Db"), b"a=b");
        assert_eq!(TransferEncoding::EightBit.decode(b"raw"), b"raw");
    }

    #[test]
    fn test_transfer_encoding_bad_base64_kept() {
        assert_eq!(TransferEncoding::Base64.decode(b"!!not base64!!"), b"!!not base64!!");
    }

    #[test]
    fn test_part_parse() {
        let part = Part::parse(b"Content-Type: text/plain; charset=utf-8\r\n\r\nHello");
        assert!(!part.recovered);
        assert_eq!(part.body, b"Hello");
        assert!(part.content_type().unwrap().is("text", "plain"));
        assert_eq!(part.charset(), "utf-8");
    }

    #[test]
    fn test_part_without_headers() {
        let part = Part::parse(b"\r\nJust text");
        assert!(part.headers.is_empty());
        assert_eq!(part.body, b"Just text");
        assert!(part.content_type().unwrap().is("text", "plain"));
    }

    #[test]
    fn test_part_malformed_headers_recovered() {
        let part = Part::parse(b"Subject: hi\nnot a header\n\nbody");
        assert!(part.recovered);
        assert_eq!(part.headers.get("subject"), Some("hi"));
        assert_eq!(part.body, b"body");
    }

    #[test]
    fn test_part_no_blank_line_plain_text() {
        let part = Part::parse(b"hello there");
        assert!(part.recovered);
        assert_eq!(part.body, b"hello there");
    }

    #[test]
    fn test_part_filename_sources() {
        let part = Part::parse(
            b"Content-Type: application/pdf; name=\"fallback.pdf\"\r\nContent-Disposition: attachment; filename=\"file.pdf\"\r\n\r\n",
        );
        assert_eq!(part.filename().as_deref(), Some("file.pdf"));

        let part = Part::parse(b"Content-Type: application/pdf; name=\"only.pdf\"\r\n\r\n");
        assert_eq!(part.filename().as_deref(), Some("only.pdf"));

        let part = Part::parse(b"Content-Type: image/png; name=\"=?UTF-8?B?w6kucG5n?=\"\r\n\r\n");
        assert_eq!(part.filename().as_deref(), Some("é.png"));
    }

    #[test]
    fn test_part_content_id() {
        let part = Part::parse(b"Content-ID: <logo@mail>\r\n\r\n");
        assert_eq!(part.content_id().as_deref(), Some("logo@mail"));
    }

    #[test]
    fn test_part_body_text_latin1_qp() {
        let part = Part::parse(
            b"Content-Type: text/plain; charset=iso-8859-1\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9",
        );
        assert_eq!(part.body_text(), "café");
    }
}
