//! # mailforge-smtp
//!
//! SMTP for both directions of a mail transfer agent.
//!
//! - [`server`]: the inbound command state machine and a tokio accept loop
//!   that hands each received message to a [`MessageSink`].
//! - [`connection`]: a type-state outbound client over plain TCP, implicit
//!   TLS (port 465) or STARTTLS.
//!
//! ## Sending
//!
//! ```ignore
//! use mailforge_smtp::connection::{Security, establish};
//! use mailforge_smtp::Address;
//! use std::time::Duration;
//!
//! # async fn send() -> mailforge_smtp::Result<()> {
//! let client = establish(
//!     "mx.example.org",
//!     25,
//!     Security::for_port(25),
//!     "mail.example.com",
//!     Duration::from_secs(10),
//! )
//! .await?;
//!
//! let message = b"Subject: hi\r\n\r\nHello\r\n";
//! let client = client
//!     .mail_from(Address::new("alice@example.com")?, message.len())
//!     .await?
//!     .rcpt_to(Address::new("bob@example.org")?)
//!     .await?
//!     .data()
//!     .await?
//!     .send_message(message)
//!     .await?;
//! client.quit().await
//! # }
//! ```
//!
//! ## Client states
//!
//! ```text
//! Connected ── auth_plain() ──→ Authenticated
//!     │                              │
//!     └──────── mail_from() ─────────┴──→ MailTransaction ──→ RecipientAdded ──→ Data
//! ```
//!
//! ## Receiving
//!
//! ```text
//! Greeting ──→ Command ──DATA──→ DataCollection ──"."──→ Command ──QUIT──→ Closed
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod server;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, Security,
    ServerInfo, SmtpConnection, establish,
};
pub use error::{Error, Result};
pub use server::{MessageSink, ReceivedMessage, SessionLimits};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
