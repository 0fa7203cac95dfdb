//! SMTP reply types.

use std::fmt;

/// SMTP reply, as read by the client or written by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply text, one entry per line.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Creates a single-line reply.
    #[must_use]
    pub fn single(code: ReplyCode, text: impl Into<String>) -> Self {
        Self::new(code, vec![text.into()])
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Serializes the reply with CRLF line endings.
    ///
    /// Every line but the last uses the `-` continuation separator.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        let code = self.code;
        if self.message.is_empty() {
            return format!("{code}\r\n").into_bytes();
        }

        let last = self.message.len() - 1;
        self.message
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let sep = if idx == last { ' ' } else { '-' };
                format!("{code}{sep}{line}\r\n")
            })
            .collect::<String>()
            .into_bytes()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message_text())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes this crate sends or checks for.
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 500 Syntax error, command unrecognized (also used for overlong lines)
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 552 Requested mail action aborted: exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::CLOSING.is_success());
        assert!(!ReplyCode::START_DATA.is_success());
        assert!(!ReplyCode::EXCEEDED_STORAGE.is_success());
        assert!(!ReplyCode::NOT_IMPLEMENTED.is_success());
        assert_eq!(ReplyCode::new(451).as_u16(), 451);
    }

    #[test]
    fn test_to_wire_single() {
        let reply = Reply::single(ReplyCode::OK, "OK");
        assert_eq!(reply.to_wire(), b"250 OK\r\n");
    }

    #[test]
    fn test_to_wire_multi() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec!["mx.example.org".to_string(), "8BITMIME".to_string()],
        );
        assert_eq!(reply.to_wire(), b"250-mx.example.org\r\n250 8BITMIME\r\n");
    }

    #[test]
    fn test_message_text() {
        let reply = Reply::new(ReplyCode::SERVICE_READY, vec!["a".into(), "b".into()]);
        assert_eq!(reply.message_text(), "a\nb");
        assert_eq!(reply.to_string(), "220 a\nb");
    }
}
