//! # mailforge-core
//!
//! Everything between the SMTP listener and the outside world:
//! - configuration loading and validation
//! - the ingestion pipeline that decodes and stores received mail
//! - in-memory mailboxes
//! - the delivery router (local, relay, MX hosts, relay fallback)
//! - the relay client
//!
//! ## Example
//!
//! ```ignore
//! use mailforge_core::delivery::{DnsMxResolver, OutgoingMessage, Router, SmtpTransport};
//! use mailforge_core::relay::{RelaySettings, SmtpRelay};
//!
//! let config = mailforge_core::Config::load(&path)?;
//! let relay = SmtpRelay::new(
//!     RelaySettings::new(config.relay.clone()),
//!     &config.domain,
//!     &config.hostname,
//!     config.dial_timeout(),
//! );
//! let router = Router::new(
//!     &config.domain,
//!     relay,
//!     DnsMxResolver::from_system_conf(),
//!     SmtpTransport::new(&config.hostname, config.dial_timeout()),
//! );
//!
//! let route = router
//!     .deliver(&OutgoingMessage::new("me@example.org", "you@example.net", "Hi", "Hello"))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod delivery;
mod error;
pub mod ingest;
pub mod mailbox;
pub mod relay;

pub use config::{Config, MailboxConfig, RelayConfig, ValidationError, ValidationResult};
pub use error::{Error, Result};
pub use ingest::IngestPipeline;
pub use mailbox::{InMemoryMailStore, MailStore};
pub use relay::{Relay, RelaySettings, SmtpRelay};
