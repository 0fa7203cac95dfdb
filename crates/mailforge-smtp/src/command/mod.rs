//! Outbound SMTP commands.

use crate::types::{Address, AuthMechanism};
use std::fmt;

/// SMTP command sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - greeting for servers without ESMTP
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - upgrade to TLS
    StartTls,
    /// AUTH - begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (SASL-IR)
        initial_response: Option<String>,
    },
    /// MAIL FROM - start a mail transaction
    MailFrom {
        /// Reverse path
        from: Address,
        /// BODY parameter (7BIT, 8BITMIME)
        body: Option<String>,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - add a recipient
    RcptTo {
        /// Forward path
        to: Address,
    },
    /// DATA - begin message content
    Data,
    /// QUIT - close the session
    Quit,
}

impl Command {
    /// Serializes the command with its CRLF terminator.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {}", mechanism.as_str())?;
                if let Some(response) = initial_response {
                    write!(f, " {response}")?;
                }
                Ok(())
            }
            Self::MailFrom { from, body, size } => {
                write!(f, "MAIL FROM:<{from}>")?;
                if let Some(body) = body {
                    write!(f, " BODY={body}")?;
                }
                if let Some(size) = size {
                    write!(f, " SIZE={size}")?;
                }
                Ok(())
            }
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}
