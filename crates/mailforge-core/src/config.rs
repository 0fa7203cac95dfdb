//! Server configuration.
//!
//! Loaded once at startup from a JSON file. Every field has a default, so a
//! missing file or a partial one still yields a runnable configuration.

use crate::delivery::HostPort;
use crate::error::{Error, Result};
use mailforge_smtp::SessionLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Settings for the outbound relay provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Whether external mail goes through the relay.
    pub enabled: bool,
    /// Relay hostname.
    pub host: String,
    /// Relay port (465 for implicit TLS, 587 for STARTTLS).
    pub port: u16,
    /// Username for AUTH PLAIN.
    pub username: String,
    /// Password for AUTH PLAIN.
    pub password: String,
    /// Whether the session must be encrypted.
    pub use_tls: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "smtp.qcloudmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            use_tls: true,
        }
    }
}

impl RelayConfig {
    /// Returns true if both username and password are set.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Validates the relay settings.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn collect_errors(&self, errors: &mut Vec<ValidationError>) {
        if self.host.trim().is_empty() {
            errors.push(ValidationError::EmptyRelayHost);
        }
        if self.port == 0 {
            errors.push(ValidationError::InvalidRelayPort);
        }
        if self.enabled && !self.has_credentials() {
            errors.push(ValidationError::MissingRelayCredentials);
        }
    }
}

/// A local mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Mailbox address.
    pub address: String,
    /// Address every received message is forwarded to.
    #[serde(default)]
    pub forward_to: Option<String>,
    /// Keep a copy when forwarding.
    #[serde(default = "default_keep_original")]
    pub keep_original: bool,
}

const fn default_keep_original() -> bool {
    true
}

impl MailboxConfig {
    /// Creates a mailbox without forwarding.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            forward_to: None,
            keep_original: true,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mail domain served locally.
    pub domain: String,
    /// Name used in EHLO.
    pub hostname: String,
    /// Listen address for inbound SMTP.
    pub listen: String,
    /// Where mail for the local domain is sent.
    pub local_endpoint: HostPort,
    /// Per-attempt dial timeout in seconds.
    pub dial_timeout_secs: u64,
    /// Longest inbound line in bytes, CRLF included.
    pub max_line_length: usize,
    /// Largest inbound message in bytes.
    pub max_message_size: usize,
    /// Extra static MX entries, merged over the built-in table.
    pub static_mx: HashMap<String, Vec<HostPort>>,
    /// Local mailboxes.
    pub mailboxes: Vec<MailboxConfig>,
    /// Relay provider.
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            hostname: "localhost".to_string(),
            listen: "0.0.0.0:2525".to_string(),
            local_endpoint: HostPort::new("localhost", 25),
            dial_timeout_secs: 10,
            max_line_length: SessionLimits::DEFAULT_MAX_LINE_LENGTH,
            max_message_size: SessionLimits::DEFAULT_MAX_MESSAGE_SIZE,
            static_mx: HashMap::new(),
            mailboxes: Vec::new(),
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    /// Returns `<config dir>/mailforge/config.json`, if the platform has a
    /// config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailforge").join("config.json"))
    }

    /// Loads and validates the configuration at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str::<Self>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.validate().map_err(Error::Invalid)?;
        Ok(config)
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        if self.domain.trim().is_empty() {
            errors.push(ValidationError::EmptyDomain);
        }
        if self.hostname.trim().is_empty() {
            errors.push(ValidationError::EmptyHostname);
        }
        if self.listen.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidListenAddress);
        }
        if self.dial_timeout_secs == 0 {
            errors.push(ValidationError::ZeroDialTimeout);
        }
        if self.max_line_length < MIN_LINE_LENGTH {
            errors.push(ValidationError::LineLimitTooSmall);
        }
        if self.max_message_size == 0 {
            errors.push(ValidationError::ZeroMessageSize);
        }
        for mailbox in &self.mailboxes {
            if !is_valid_address(&mailbox.address) {
                errors.push(ValidationError::InvalidMailboxAddress);
            }
            if mailbox
                .forward_to
                .as_deref()
                .is_some_and(|to| !is_valid_address(to))
            {
                errors.push(ValidationError::InvalidForwardAddress);
            }
        }
        self.relay.collect_errors(&mut errors);

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Returns the per-attempt dial timeout.
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    /// Returns the limits for inbound sessions.
    #[must_use]
    pub const fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_line_length: self.max_line_length,
            max_message_size: self.max_message_size,
        }
    }
}

/// RFC 5321 section 4.5.3.1.6: servers accept text lines of 1000 octets.
const MIN_LINE_LENGTH: usize = 1000;

fn is_valid_address(address: &str) -> bool {
    address
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'))
}

/// Validation error for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Domain is empty.
    EmptyDomain,
    /// Hostname is empty.
    EmptyHostname,
    /// Listen address is not `ip:port`.
    InvalidListenAddress,
    /// Dial timeout is zero.
    ZeroDialTimeout,
    /// Line limit is below 1000 bytes.
    LineLimitTooSmall,
    /// Message size limit is zero.
    ZeroMessageSize,
    /// A mailbox address is malformed.
    InvalidMailboxAddress,
    /// A forwarding address is malformed.
    InvalidForwardAddress,
    /// Relay host is empty.
    EmptyRelayHost,
    /// Relay port is zero.
    InvalidRelayPort,
    /// Relay is enabled without username and password.
    MissingRelayCredentials,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyDomain => "Domain is required",
            Self::EmptyHostname => "Hostname is required",
            Self::InvalidListenAddress => "Listen address must be ip:port",
            Self::ZeroDialTimeout => "Dial timeout must be at least one second",
            Self::LineLimitTooSmall => "Line limit must be at least 1000 bytes",
            Self::ZeroMessageSize => "Message size limit must be positive",
            Self::InvalidMailboxAddress => "Mailbox address is invalid",
            Self::InvalidForwardAddress => "Forwarding address is invalid",
            Self::EmptyRelayHost => "Relay host is required",
            Self::InvalidRelayPort => "Relay port must be 1-65535",
            Self::MissingRelayCredentials => "Relay username and password are required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyDomain => "domain",
            Self::EmptyHostname => "hostname",
            Self::InvalidListenAddress => "listen",
            Self::ZeroDialTimeout => "dial_timeout_secs",
            Self::LineLimitTooSmall => "max_line_length",
            Self::ZeroMessageSize => "max_message_size",
            Self::InvalidMailboxAddress => "mailboxes.address",
            Self::InvalidForwardAddress => "mailboxes.forward_to",
            Self::EmptyRelayHost => "relay.host",
            Self::InvalidRelayPort => "relay.port",
            Self::MissingRelayCredentials => "relay.username",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field(), self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a configuration.
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;
