//! One SMTP transaction against one host.

use super::error::DeliveryError;
use super::message::HostPort;
use mailforge_smtp::connection::{Security, establish};
use mailforge_smtp::{Address, Client, MailTransaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default per-attempt dial timeout.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Carries a rendered message to one host.
pub trait Transport: Send + Sync {
    /// Runs `MAIL FROM`, `RCPT TO` and `DATA` for `raw` against `target`.
    fn send(
        &self,
        target: &HostPort,
        from: &str,
        to: &str,
        raw: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        target: &HostPort,
        from: &str,
        to: &str,
        raw: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        (**self).send(target, from, to, raw)
    }
}

/// Direct delivery over SMTP.
///
/// Port 465 gets implicit TLS, port 587 opportunistic STARTTLS, anything else
/// plaintext.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    hostname: String,
    dial_timeout: Duration,
}

impl SmtpTransport {
    /// Creates a transport that greets as `hostname`.
    #[must_use]
    pub fn new(hostname: impl Into<String>, dial_timeout: Duration) -> Self {
        Self {
            hostname: hostname.into(),
            dial_timeout,
        }
    }
}

impl Transport for SmtpTransport {
    async fn send(
        &self,
        target: &HostPort,
        from: &str,
        to: &str,
        raw: &str,
    ) -> Result<(), DeliveryError> {
        let attempt = async {
            let client = establish(
                &target.host,
                target.port,
                Security::for_port(target.port),
                &self.hostname,
                self.dial_timeout,
            )
            .await?;
            debug!(host = %target, tls = client.is_tls(), "session established");

            let client = client.mail_from(Address::new(from)?, raw.len()).await?;
            complete_transaction(client, Address::new(to)?, raw.as_bytes()).await
        };

        attempt
            .await
            .map_err(|e| DeliveryError::from_smtp(target.to_string(), e))
    }
}

/// Finishes a transaction once the sender was accepted.
///
/// A failing `QUIT` after the message was accepted is ignored.
pub(crate) async fn complete_transaction(
    client: Client<MailTransaction>,
    to: Address,
    raw: &[u8],
) -> mailforge_smtp::Result<()> {
    let client = client
        .rcpt_to(to)
        .await?
        .data()
        .await?
        .send_message(raw)
        .await?;

    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT failed after delivery");
    }
    Ok(())
}
