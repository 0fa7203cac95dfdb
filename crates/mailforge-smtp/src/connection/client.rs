//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::debug;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    client_hostname: String,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// the session.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        ensure_success(&greeting)?;

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            client_hostname: String::new(),
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        ensure_success(&reply)?;

        self.client_hostname = client_hostname.to_string();
        self.server_info.extensions = parse_extensions(&reply);
        Ok(self)
    }

    /// Greets with EHLO, falling back to HELO if EHLO is refused.
    ///
    /// After a HELO greeting no extensions are known.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings are refused or the connection fails.
    pub async fn hello(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            self.server_info.extensions = parse_extensions(&reply);
        } else {
            debug!(code = %reply.code, "EHLO refused, retrying with HELO");
            let reply = self
                .send_command(Command::Helo {
                    hostname: client_hostname.to_string(),
                })
                .await?;
            ensure_success(&reply)?;
            self.server_info.extensions.clear();
        }

        self.client_hostname = client_hostname.to_string();
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS and greets again.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or is refused, or if the
    /// handshake fails.
    pub async fn starttls(self, hostname: &str) -> Result<Self> {
        match self.try_starttls(hostname).await? {
            (client, true) => Ok(client),
            (_, false) => Err(Error::NotSupported("STARTTLS".into())),
        }
    }

    /// Upgrades to TLS if the server offers and accepts STARTTLS.
    ///
    /// Returns the client and whether the upgrade happened. A server that
    /// does not advertise STARTTLS, or answers it with an error, leaves the
    /// session in plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the TLS handshake fails
    /// after the server accepted STARTTLS.
    pub async fn try_starttls(mut self, hostname: &str) -> Result<(Self, bool)> {
        if !self.server_info.supports_starttls() {
            return Ok((self, false));
        }

        let reply = self.send_command(Command::StartTls).await?;
        if !reply.is_success() {
            debug!(code = %reply.code, "STARTTLS refused, continuing in plaintext");
            return Ok((self, false));
        }

        self.stream = self.stream.upgrade_to_tls(hostname).await?;

        // Extensions must be discovered again over the encrypted channel.
        let client_hostname = self.client_hostname.clone();
        let client = self.ehlo(&client_hostname).await?;
        Ok((client, true))
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;
        ensure_success(&reply)?;

        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication.
    ///
    /// `size` is announced when the server supports SIZE.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the advertised SIZE or the
    /// server rejects the sender.
    pub async fn mail_from(self, from: Address, size: usize) -> Result<Client<MailTransaction>> {
        self.start_transaction(from, size).await
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the advertised SIZE or the
    /// server rejects the sender.
    pub async fn mail_from(self, from: Address, size: usize) -> Result<Client<MailTransaction>> {
        self.start_transaction(from, size).await
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        ensure_success(&reply)?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails or the server rejects the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        self.stream.write_all(&encode_data(message)).await?;

        let reply = read_reply(&mut self.stream).await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            client_hostname: self.client_hostname,
            _state: PhantomData,
        }
    }

    async fn start_transaction(
        mut self,
        from: Address,
        size: usize,
    ) -> Result<Client<MailTransaction>> {
        let announced = match self.server_info.max_message_size() {
            Some(limit) if limit > 0 && size > limit => {
                return Err(Error::MessageTooLarge { size, limit });
            }
            Some(_) => Some(size),
            None if self.server_info.supports(&Extension::Size(None)) => Some(size),
            None => None,
        };
        let body = self
            .server_info
            .supports(&Extension::EightBitMime)
            .then(|| "8BITMIME".to_string());

        let reply = self
            .send_command(Command::MailFrom {
                from,
                body,
                size: announced,
            })
            .await?;
        ensure_success(&reply)?;
        Ok(self.transition())
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    /// Returns true if the session is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(())
    }
}

fn ensure_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()))
    }
}

/// Extension lines follow the greeting line of an EHLO reply.
fn parse_extensions(reply: &Reply) -> HashSet<Extension> {
    reply.message.iter().skip(1).map(|line| Extension::parse(line)).collect()
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);
        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Encodes message content for the DATA phase.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 32 + 5);
    let body = message.strip_suffix(b"\n").unwrap_or(message);

    for line in body.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b".\r\n");
    out
}
