//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, SmtpConnection,
};
pub use stream::{SmtpStream, connect, connect_tls, with_timeout};

use crate::error::Result;
use crate::types::Extension;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    ///
    /// `SIZE` matches regardless of the advertised limit.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        match ext {
            Extension::Size(_) => self
                .extensions
                .iter()
                .any(|e| matches!(e, Extension::Size(_))),
            _ => self.extensions.contains(ext),
        }
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<crate::types::AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// How a session gets encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Plaintext for the whole session.
    None,
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// STARTTLS when offered, plaintext otherwise, including after a failed
    /// handshake.
    Opportunistic,
    /// STARTTLS or fail.
    Required,
}

impl Security {
    /// Picks the conventional mode for a submission port.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        match port {
            465 => Self::Implicit,
            587 => Self::Opportunistic,
            _ => Self::None,
        }
    }
}

/// Opens a session and greets the server.
///
/// The dial timeout covers the TCP connect, plus the handshake for implicit
/// TLS. The returned client has already sent EHLO (or HELO) and, where
/// `security` asks for it, completed STARTTLS.
///
/// # Errors
///
/// Returns an error if the connection, greeting, or TLS negotiation fails.
pub async fn establish(
    host: &str,
    port: u16,
    security: Security,
    client_hostname: &str,
    dial_timeout: Duration,
) -> Result<Client<Connected>> {
    let client = match security {
        Security::Implicit => {
            let stream =
                with_timeout(dial_timeout, "connect", connect_tls(host, port)).await?;
            Client::from_stream(stream).await?.hello(client_hostname).await?
        }
        _ => plain_session(host, port, client_hostname, dial_timeout).await?,
    };

    match security {
        Security::Required => client.starttls(host).await,
        Security::Opportunistic => match client.try_starttls(host).await {
            Ok((client, upgraded)) => {
                if !upgraded {
                    debug!(host, port, "continuing without STARTTLS");
                }
                Ok(client)
            }
            // The failed handshake leaves the stream unusable, so start over
            // in plaintext.
            Err(e) if e.is_transport() => {
                debug!(host, port, error = %e, "STARTTLS handshake failed, redialing in plaintext");
                plain_session(host, port, client_hostname, dial_timeout).await
            }
            Err(e) => Err(e),
        },
        Security::None | Security::Implicit => Ok(client),
    }
}

async fn plain_session(
    host: &str,
    port: u16,
    client_hostname: &str,
    dial_timeout: Duration,
) -> Result<Client<Connected>> {
    let stream = with_timeout(dial_timeout, "connect", connect(host, port)).await?;
    Client::from_stream(stream).await?.hello(client_hostname).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_for_port() {
        assert_eq!(Security::for_port(465), Security::Implicit);
        assert_eq!(Security::for_port(587), Security::Opportunistic);
        assert_eq!(Security::for_port(25), Security::None);
        assert_eq!(Security::for_port(2525), Security::None);
    }

    #[test]
    fn test_server_info_size() {
        let mut info = ServerInfo::default();
        assert!(!info.supports(&Extension::Size(None)));
        assert_eq!(info.max_message_size(), None);

        info.extensions.insert(Extension::Size(Some(1000)));
        assert!(info.supports(&Extension::Size(None)));
        assert_eq!(info.max_message_size(), Some(1000));
    }
}
