//! Outbound message and destination types.

use chrono::Local;
use mailforge_mime::encoding::encode_rfc2047;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A plain-text message to route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Returns the recipient's domain, if the address has exactly one `@`
    /// and a non-empty domain.
    #[must_use]
    pub fn recipient_domain(&self) -> Option<&str> {
        let (_, domain) = self.to.split_once('@')?;
        (!domain.is_empty() && !domain.contains('@')).then_some(domain)
    }

    /// Builds the RFC 5322 formatted message.
    ///
    /// `domain` is used on the right-hand side of the Message-ID.
    #[must_use]
    pub fn to_rfc5322(&self, domain: &str) -> String {
        use std::fmt::Write;

        let mut message = String::new();

        let _ = write!(message, "From: {}\r\n", self.from);
        let _ = write!(message, "To: {}\r\n", self.to);
        let _ = write!(message, "Subject: {}\r\n", encode_rfc2047(&self.subject, "UTF-8"));
        let _ = write!(message, "Date: {}\r\n", Local::now().to_rfc2822());
        let _ = write!(message, "Message-ID: {}\r\n", message_id(domain));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");

        // Empty line between headers and body
        message.push_str("\r\n");

        message.push_str(&self.body);

        message
    }
}

fn message_id(domain: &str) -> String {
    let seconds = Local::now().timestamp();
    format!("<{seconds}.{:08x}@{domain}>", rand::random::<u32>())
}

/// A `host:port` delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostPort {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl HostPort {
    /// Creates a target from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got {s:?}"))?;
        if host.is_empty() {
            return Err(format!("missing host in {s:?}"));
        }
        let port = port
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| format!("invalid port in {s:?}"))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for HostPort {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HostPort> for String {
    fn from(value: HostPort) -> Self {
        value.to_string()
    }
}
