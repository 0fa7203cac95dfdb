//! Outbound relay provider.

use crate::config::RelayConfig;
use crate::delivery::transport::complete_transaction;
use crate::delivery::{DeliveryError, OutgoingMessage};
use mailforge_smtp::{Address, AuthMechanism, SmtpConnection};
use mailforge_smtp::connection::{Security, establish};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Shared, hot-reloadable relay settings.
///
/// Readers take a snapshot; a reload swaps the whole value.
#[derive(Debug, Clone, Default)]
pub struct RelaySettings(Arc<RwLock<RelayConfig>>);

impl RelaySettings {
    /// Wraps an initial configuration.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Returns a copy of the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> RelayConfig {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the configuration.
    pub fn replace(&self, config: RelayConfig) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

/// A third-party service that sends mail on our behalf.
pub trait Relay: Send + Sync {
    /// Returns true if the relay may be used right now.
    fn is_enabled(&self) -> bool;

    /// Sends one message through the relay.
    fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl<T: Relay> Relay for Arc<T> {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        (**self).send_email(from, to, subject, body)
    }
}

/// Relay client speaking SMTP to the configured provider.
///
/// With TLS, port 465 uses implicit TLS and any other port requires
/// STARTTLS. AUTH PLAIN is used when credentials are set.
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    settings: RelaySettings,
    domain: String,
    hostname: String,
    dial_timeout: Duration,
}

impl SmtpRelay {
    /// Creates a relay client.
    ///
    /// `domain` goes into Message-IDs, `hostname` into EHLO.
    #[must_use]
    pub fn new(
        settings: RelaySettings,
        domain: impl Into<String>,
        hostname: impl Into<String>,
        dial_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            domain: domain.into(),
            hostname: hostname.into(),
            dial_timeout,
        }
    }

    /// Returns the settings handle.
    #[must_use]
    pub const fn settings(&self) -> &RelaySettings {
        &self.settings
    }
}

const fn security(config: &RelayConfig) -> Security {
    match (config.use_tls, config.port) {
        (true, 465) => Security::Implicit,
        (true, _) => Security::Required,
        (false, _) => Security::None,
    }
}

impl Relay for SmtpRelay {
    fn is_enabled(&self) -> bool {
        self.settings.snapshot().enabled
    }

    async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let config = self.settings.snapshot();
        if !config.enabled {
            return Err(DeliveryError::RelayDisabled);
        }

        let raw = OutgoingMessage::new(from, to, subject, body).to_rfc5322(&self.domain);
        let target = format!("{}:{}", config.host, config.port);
        info!(relay = %target, from, to, size = raw.len(), "sending through relay");

        let attempt = async {
            let client = establish(
                &config.host,
                config.port,
                security(&config),
                &self.hostname,
                self.dial_timeout,
            )
            .await?;

            let sender = Address::new(from)?;
            let client = if config.has_credentials() {
                if !client.server_info().auth_mechanisms().contains(&AuthMechanism::Plain) {
                    return Err(mailforge_smtp::Error::NotSupported("AUTH PLAIN".into()));
                }
                debug!(relay = %target, user = %config.username, "authenticating");
                client
                    .auth_plain(&config.username, &config.password)
                    .await?
                    .mail_from(sender, raw.len())
                    .await?
            } else {
                client.mail_from(sender, raw.len()).await?
            };

            complete_transaction(client, Address::new(to)?, raw.as_bytes()).await
        };

        attempt
            .await
            .map_err(|e| DeliveryError::from_smtp(target, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryErrorKind;

    #[test]
    fn test_security_selection() {
        let mut config = RelayConfig::default();
        assert_eq!(security(&config), Security::Required);
        config.port = 465;
        assert_eq!(security(&config), Security::Implicit);
        config.use_tls = false;
        assert_eq!(security(&config), Security::None);
    }

    #[test]
    fn test_settings_replace_is_visible_to_clones() {
        let settings = RelaySettings::new(RelayConfig::default());
        let relay = SmtpRelay::new(
            settings.clone(),
            "example.org",
            "mail.example.org",
            Duration::from_secs(1),
        );
        assert!(!relay.is_enabled());

        settings.replace(RelayConfig {
            enabled: true,
            ..RelayConfig::default()
        });
        assert!(relay.is_enabled());
        assert!(relay.settings().snapshot().enabled);
    }

    #[tokio::test]
    async fn test_disabled_relay_refuses() {
        let relay = SmtpRelay::new(
            RelaySettings::default(),
            "example.org",
            "mail.example.org",
            Duration::from_secs(1),
        );
        let err = relay
            .send_email("a@example.org", "b@example.net", "s", "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), DeliveryErrorKind::RelayDisabled);
    }
}
