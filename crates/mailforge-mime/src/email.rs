//! Structured result of decoding a raw message.

use std::collections::HashMap;
use std::fmt;

/// How an attachment is meant to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Disposition {
    /// Displayed within the message body.
    Inline,
    /// Offered as a separate file.
    #[default]
    Attachment,
}

impl Disposition {
    /// Returns the header token for this disposition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file carried by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    /// Decoded filename, empty if the part declared none.
    pub filename: String,
    /// Declared `type/subtype`.
    pub content_type: String,
    /// Size of the decoded content in bytes.
    pub size: usize,
    /// Decoded content.
    pub content: Vec<u8>,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Presentation hint.
    pub disposition: Disposition,
}

impl Attachment {
    /// Creates an attachment, deriving the size from the content.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
        disposition: Disposition,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size: content.len(),
            content,
            content_id: None,
            disposition,
        }
    }

    /// Sets the content id.
    #[must_use]
    pub fn with_content_id(mut self, content_id: Option<String>) -> Self {
        self.content_id = content_id;
        self
    }

    /// Returns true for image attachments.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    }
}

/// A decoded message.
///
/// Produced by [`decode`](crate::decode), which never fails; fields the
/// message did not provide are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedEmail {
    /// Storage identifier, or the `Message-ID` until storage assigns one.
    pub id: String,
    /// Sender address.
    pub sender: String,
    /// Recipient address.
    pub recipient: String,
    /// Carbon-copy addresses.
    pub cc: Vec<String>,
    /// Decoded subject.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// HTML body, if the message had one.
    pub html_body: Option<String>,
    /// RFC 2822 date string.
    pub date: String,
    /// Attachments in message order.
    pub attachments: Vec<Attachment>,
    /// Signature text after the `-- ` delimiter, possibly empty.
    pub signature: String,
    /// Whether the message is an automatic reply.
    pub is_auto_reply: bool,
    /// Charset the message declared.
    pub charset: String,
    /// First value of every header, keyed by name as first seen.
    pub headers: HashMap<String, String>,
    /// Images and links the message references, keyed by kind.
    pub embedded: HashMap<String, Vec<String>>,
}

impl DecodedEmail {
    /// Returns true if the message has attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_size() {
        let attachment = Attachment::new("a.txt", "text/plain", b"abc".to_vec(), Disposition::Attachment);
        assert_eq!(attachment.size, 3);
        assert!(!attachment.is_image());
    }

    #[test]
    fn test_attachment_is_image() {
        let attachment = Attachment::new("", "IMAGE/png", Vec::new(), Disposition::Inline)
            .with_content_id(Some("logo".into()));
        assert!(attachment.is_image());
        assert_eq!(attachment.content_id.as_deref(), Some("logo"));
        assert_eq!(attachment.disposition.to_string(), "inline");
    }

    #[test]
    fn test_header_lookup() {
        let mut email = DecodedEmail::default();
        email.headers.insert("X-Mailer".into(), "test".into());
        assert_eq!(email.header("x-mailer"), Some("test"));
        assert!(!email.has_attachments());
    }
}
