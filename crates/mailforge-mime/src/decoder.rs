//! Raw message to [`DecodedEmail`].
//!
//! Decoding never fails. Each stage that can go wrong has a fallback: strict
//! header parsing falls back to a line scan, a broken multipart body falls
//! back to a heuristic text extractor, and undecodable content is kept as is.

use crate::charset::{self, DEFAULT_CHARSET};
use crate::classify::{extract_signature, is_auto_reply};
use crate::content_type::{ContentType, split_unquoted};
use crate::email::{Attachment, DecodedEmail, Disposition};
use crate::embedded::EmbeddedContent;
use crate::encoding::{decode_rfc2047, decode_unlabeled_base64};
use crate::html::html_to_text;
use crate::message::{Part, TransferEncoding};
use crate::scanner::split_multipart;

/// Multipart nesting deeper than this is not descended into.
const MAX_NESTING: usize = 16;

/// Format used for the date of messages without a `Date` header.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Decodes a raw RFC 5322 message.
///
/// # Example
///
/// ```
/// let raw = b"From: a@example.com\r\nSubject: =?UTF-8?B?SGVsbG8=?=\r\n\r\nHi there";
/// let email = mailforge_mime::decode(raw);
/// assert_eq!(email.subject, "Hello");
/// assert_eq!(email.body, "Hi there");
/// ```
#[must_use]
pub fn decode(raw: &[u8]) -> DecodedEmail {
    let top = Part::parse(raw);
    let headers = &top.headers;
    let content_type = top
        .content_type()
        .unwrap_or_else(ContentType::text_plain);

    let mut collected = Collected::default();
    if content_type.is_multipart() {
        collected.visit(&top, 0);
        if collected.body.is_none() && collected.html.is_none() {
            collected.body = Some(salvage_text(top.body));
        }
    } else if top.recovered {
        collected.body = Some(salvage_text(top.body));
    } else {
        collected.single(&top, &content_type);
    }

    let subject = headers.get("subject").map(decode_rfc2047).unwrap_or_default();
    let body = collected.body.unwrap_or_default();

    let mut embedded = EmbeddedContent::new();
    if let Some(html) = &collected.html {
        embedded.scan_html(html);
    }
    embedded.scan_text(&body);
    for attachment in &collected.attachments {
        if attachment.disposition == Disposition::Inline
            && attachment.is_image()
            && let Some(id) = &attachment.content_id
        {
            embedded.push_inline_image(id);
        }
    }

    DecodedEmail {
        id: headers
            .get("message-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
            .unwrap_or_default(),
        sender: headers.get("from").map(decode_rfc2047).unwrap_or_default(),
        recipient: headers.get("to").map(decode_rfc2047).unwrap_or_default(),
        cc: headers.get("cc").map(split_addresses).unwrap_or_default(),
        is_auto_reply: is_auto_reply(&subject, headers, &body),
        subject,
        signature: extract_signature(&body),
        body,
        html_body: collected.html,
        date: headers.get("date").map_or_else(
            || chrono::Local::now().format(DATE_FORMAT).to_string(),
            |d| d.trim().to_string(),
        ),
        attachments: collected.attachments,
        charset: content_type
            .charset()
            .map(str::to_string)
            .or(collected.text_charset)
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
        headers: headers.first_values(),
        embedded: embedded.into_map(),
    }
}

/// Splits an address list on commas outside quotes and decodes each entry.
fn split_addresses(value: &str) -> Vec<String> {
    split_unquoted(value, ',')
        .into_iter()
        .map(|address| decode_rfc2047(address.trim()))
        .filter(|address| !address.is_empty())
        .collect()
}

/// Content gathered while walking the part tree.
#[derive(Debug, Default)]
struct Collected {
    body: Option<String>,
    body_from_html: bool,
    html: Option<String>,
    attachments: Vec<Attachment>,
    text_charset: Option<String>,
}

impl Collected {
    /// Handles a non-multipart top-level body.
    fn single(&mut self, part: &Part<'_>, content_type: &ContentType) {
        let disposition = part.disposition();
        let wants_attachment = disposition.as_ref().is_some_and(|d| d.is_attachment())
            || (!content_type.is_text() && part.filename().is_some());

        if wants_attachment {
            self.push_attachment(part, content_type);
            self.body = Some(String::new());
            return;
        }

        let mut text = part.body_text();
        if part.transfer_encoding().is_none() {
            text = decode_unlabeled_base64(&text).unwrap_or(text);
        }
        let text = text.trim().to_string();
        self.text_charset = content_type.charset().map(str::to_string);

        if content_type.is("text", "html") {
            self.body = Some(html_to_text(&text));
            self.html = Some(text);
        } else {
            self.body = Some(text);
        }
    }

    /// Dispatches one part of a multipart tree.
    fn visit(&mut self, part: &Part<'_>, depth: usize) {
        let content_type = part.content_type().unwrap_or_else(ContentType::text_plain);

        if content_type.is_multipart() {
            if depth >= MAX_NESTING {
                return;
            }
            if let Some(boundary) = content_type.boundary() {
                for section in split_multipart(part.body, boundary) {
                    self.visit(&Part::parse(section), depth + 1);
                }
            }
            return;
        }

        let disposition = part.disposition();
        if disposition.as_ref().is_some_and(|d| d.is_attachment()) {
            self.push_attachment(part, &content_type);
            return;
        }

        if content_type.is("text", "plain") {
            if self.body.is_none() || self.body_from_html {
                self.body = Some(part_text(part));
                self.body_from_html = false;
                self.note_charset(&content_type);
            }
            return;
        }

        if content_type.is("text", "html") {
            if self.html.is_none() {
                let html = part_text(part);
                if self.body.is_none() {
                    self.body = Some(html_to_text(&html));
                    self.body_from_html = true;
                }
                self.html = Some(html);
                self.note_charset(&content_type);
            }
            return;
        }

        if part.filename().is_some() || (!content_type.is_text() && part.content_id().is_some()) {
            self.push_attachment(part, &content_type);
        }
    }

    fn note_charset(&mut self, content_type: &ContentType) {
        if self.text_charset.is_none() {
            self.text_charset = content_type.charset().map(str::to_string);
        }
    }

    fn push_attachment(&mut self, part: &Part<'_>, content_type: &ContentType) {
        let content_id = part.content_id();
        let disposition = match part.disposition() {
            Some(d) if d.is_inline() => Disposition::Inline,
            None if content_id.is_some() => Disposition::Inline,
            _ => Disposition::Attachment,
        };

        let attachment = Attachment::new(
            part.filename().unwrap_or_default(),
            content_type.mime_type(),
            part.decode_body(),
            disposition,
        )
        .with_content_id(content_id);
        self.attachments.push(attachment);
    }
}

/// Decodes a text part with its transfer encoding and charset, trimmed.
fn part_text(part: &Part<'_>) -> String {
    part.body_text().trim().to_string()
}

/// Pulls readable text out of a body whose structure could not be decoded.
///
/// Without any embedded `Content-Type` line the body is returned as is, after
/// the unlabeled Base64 check. Otherwise the first `text/plain` section is
/// extracted along with its transfer encoding and charset. When there is no
/// such section, the first run of non-structural lines is used.
fn salvage_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if !text.to_ascii_lowercase().contains("content-type:") {
        return unlabeled_text(&text);
    }

    let mut section: Vec<&str> = Vec::new();
    let mut inside = false;
    let mut skip_blank = false;
    let mut encoding = None;
    let mut label = DEFAULT_CHARSET.to_string();

    for line in text.lines() {
        let lower = line.trim_start().to_ascii_lowercase();

        if lower.starts_with("content-type:") {
            if inside {
                break;
            }
            if lower.contains("text/plain") {
                inside = true;
                skip_blank = true;
                let value = &line.trim_start()["content-type:".len()..];
                if let Ok(ct) = ContentType::parse(value)
                    && let Some(cs) = ct.charset()
                {
                    label = cs.to_string();
                }
            }
            continue;
        }

        if !inside {
            continue;
        }
        if line.starts_with("--") {
            break;
        }
        if lower.starts_with("content-transfer-encoding:") {
            encoding = Some(TransferEncoding::parse(&lower["content-transfer-encoding:".len()..]));
            continue;
        }
        if lower.starts_with("content-") {
            continue;
        }
        if skip_blank && line.trim().is_empty() {
            skip_blank = false;
            continue;
        }
        skip_blank = false;
        section.push(line);
    }

    if section.is_empty() {
        return first_text_content(&text);
    }

    let joined = section.join("\n");
    let bytes = encoding.map_or_else(
        || joined.as_bytes().to_vec(),
        |e: TransferEncoding| e.decode(joined.as_bytes()),
    );
    charset::decode_lossy(&bytes, &label).trim().to_string()
}

/// Returns the first run of lines that are not headers or delimiters.
fn first_text_content(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !is_structural(line))
        .skip_while(|line| line.trim().is_empty())
        .collect();
    unlabeled_text(&kept.join("\n"))
}

fn is_structural(line: &str) -> bool {
    ["Content-", "MIME-", "X-", "--"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
        || line.contains("boundary=")
}

fn unlabeled_text(text: &str) -> String {
    let trimmed = text.trim();
    decode_unlabeled_base64(trimmed).map_or_else(|| trimmed.to_string(), |d| d.trim().to_string())
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
    use crate::embedded::{IMAGES, INLINE_IMAGES, LINKS};

    #[test]
    fn test_decode_simple() {
        let raw = concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: bob@example.org\r\n",
            "Subject: Hello\r\n",
            "Date: Mon, 1 Jan 2024 10:00:00 +0000\r\n",
            "Message-ID: <abc@example.com>\r\n",
            "\r\n",
            "Hi Bob\r\n"
        );
        let email = decode(raw.as_bytes());
        assert_eq!(email.sender, "Alice <alice@example.com>");
        assert_eq!(email.recipient, "bob@example.org");
        assert_eq!(email.subject, "Hello");
        assert_eq!(email.date, "Mon, 1 Jan 2024 10:00:00 +0000");
        assert_eq!(email.id, "abc@example.com");
        assert_eq!(email.body, "Hi Bob");
        assert_eq!(email.charset, "utf-8");
        assert!(email.html_body.is_none());
        assert!(!email.is_auto_reply);
    }

    #[test]
    fn test_decode_missing_date_uses_now() {
        let email = decode(b"Subject: x\r\n\r\nbody");
        assert!(!email.date.is_empty());
        assert!(chrono::DateTime::parse_from_str(&email.date, DATE_FORMAT).is_ok());
    }

    #[test]
    fn test_decode_cc_list() {
        let email = decode(b"Cc: \"Doe, Jane\" <jane@x.org>, bob@y.org\r\n\r\nhi");
        assert_eq!(email.cc, vec!["\"Doe, Jane\" <jane@x.org>", "bob@y.org"]);
    }

    #[test]
    fn test_decode_base64_body() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: base64\r\n\r\nSGVsbG8g\r\nV29ybGQ=\r\n";
        assert_eq!(decode(raw).body, "Hello World");
    }

    #[test]
    fn test_decode_unlabeled_base64_body() {
        let email = decode(b"Subject: t\r\n\r\nSGVsbG8gV29ybGQ=");
        assert_eq!(email.body, "Hello World");
    }

    #[test]
    fn test_decode_charset_conversion() {
        let mut raw = b"Content-Type: text/plain; charset=gbk\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xd6, 0xd0, 0xce, 0xc4]);
        let email = decode(&raw);
        assert_eq!(email.body, "中文");
        assert_eq!(email.charset, "gbk");
    }

    #[test]
    fn test_decode_html_single() {
        let raw = b"Content-Type: text/html\r\n\r\n<p>Hello <a href=\"https://example.com\">link</a></p>";
        let email = decode(raw);
        assert_eq!(email.body, "Hello link");
        assert!(email.html_body.unwrap().starts_with("<p>"));
        assert_eq!(email.embedded[LINKS], vec!["https://example.com"]);
    }

    #[test]
    fn test_decode_multipart_alternative() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>Rich</p><img src=\"https://img.example.com/x.png\">\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Plain\r\n",
            "--b1--\r\n"
        );
        let email = decode(raw.as_bytes());
        assert_eq!(email.body, "Plain");
        assert!(email.html_body.unwrap().contains("Rich"));
        assert_eq!(email.embedded[IMAGES], vec!["https://img.example.com/x.png"]);
    }

    #[test]
    fn test_decode_nested_multipart_with_inline_image() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/related; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Body text\r\n",
            "--inner\r\n",
            "Content-Type: image/png\r\n",
            "Content-ID: <logo@mail>\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "iVBORw0=\r\n",
            "--inner--\r\n",
            "--outer--\r\n"
        );
        let email = decode(raw.as_bytes());
        assert_eq!(email.body, "Body text");
        assert_eq!(email.attachments.len(), 1);
        let image = &email.attachments[0];
        assert_eq!(image.disposition, Disposition::Inline);
        assert_eq!(image.content_id.as_deref(), Some("logo@mail"));
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.size, 5);
        assert_eq!(email.embedded[INLINE_IMAGES], vec!["cid:logo@mail"]);
    }

    #[test]
    fn test_decode_attachment_disposition_beats_text() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "attached notes\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "real body\r\n",
            "--b--\r\n"
        );
        let email = decode(raw.as_bytes());
        assert_eq!(email.body, "real body");
        assert_eq!(email.attachments[0].filename, "notes.txt");
        assert_eq!(email.attachments[0].content, b"attached notes");
    }

    #[test]
    fn test_decode_multipart_without_boundary_salvages_text() {
        let raw = concat!(
            "Content-Type: multipart/mixed\r\n",
            "\r\n",
            "--zzz\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=C3=A9\r\n",
            "--zzz--\r\n"
        );
        assert_eq!(decode(raw.as_bytes()).body, "café");
    }

    #[test]
    fn test_decode_recovered_headers() {
        let raw = b"Subject: broken\r\nthis line has no colon\r\n\r\nStill readable";
        let email = decode(raw);
        assert_eq!(email.subject, "broken");
        assert_eq!(email.body, "Still readable");
    }

    #[test]
    fn test_decode_no_headers_at_all() {
        let email = decode(b"just some words");
        assert_eq!(email.body, "just some words");
        assert!(email.headers.is_empty());
    }

    #[test]
    fn test_salvage_first_text_content() {
        let body = b"Content-Type: application/octet-stream\nX-Thing: 1\n\nSGVsbG8gV29ybGQ=\n";
        assert_eq!(salvage_text(body), "Hello World");
    }

    #[test]
    fn test_decode_signature_and_auto_reply() {
        let raw = b"Subject: Automatic reply: away\r\n\r\nI am out.\r\n-- \r\nCarol";
        let email = decode(raw);
        assert!(email.is_auto_reply);
        assert_eq!(email.signature, "Carol");
        assert!(email.body.contains("Carol"));
    }

    #[test]
    fn test_decode_single_attachment_body() {
        let raw = b"Content-Type: application/pdf; name=\"doc.pdf\"\r\nContent-Transfer-Encoding: base64\r\n\r\nJVBERg==";
        let email = decode(raw);
        assert_eq!(email.body, "");
        assert_eq!(email.attachments[0].filename, "doc.pdf");
        assert_eq!(email.attachments[0].content, b"%PDF");
    }
}
