//! Per-connection SMTP command state machine.

use crate::types::{Address, Reply, ReplyCode};

/// Where a session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, greeting not yet sent.
    Greeting,
    /// Waiting for a command.
    Command,
    /// Collecting message lines after `DATA`.
    DataCollection,
    /// `QUIT` was answered.
    Closed,
}

/// A message received between `DATA` and the terminating `.` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Normalized `MAIL FROM` path, empty if none was given.
    pub mail_from: String,
    /// Normalized `RCPT TO` path, empty if none was given.
    pub rcpt_to: String,
    /// Message lines joined by `\n`.
    pub data: Vec<u8>,
}

/// What the connection should do after one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A data line was buffered, nothing to send.
    Pending,
    /// Send the reply and keep reading.
    Reply(Reply),
    /// Hand the message off, then send the reply.
    Message(ReceivedMessage, Reply),
    /// Send the reply and close the connection.
    Close(Reply),
}

/// Bounds on what one session buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Longest accepted input line in bytes, terminator included.
    pub max_line_length: usize,
    /// Largest accepted message body in bytes.
    pub max_message_size: usize,
}

impl SessionLimits {
    /// Default line limit.
    pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;
    /// Default message limit (25 MiB).
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 25 * 1024 * 1024;
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_line_length: Self::DEFAULT_MAX_LINE_LENGTH,
            max_message_size: Self::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// SMTP server session.
///
/// Pure protocol logic: feed it lines with [`Session::handle_line`] and act on
/// the returned [`Step`]. The envelope is kept across transactions, so a
/// second `DATA` without new `MAIL FROM`/`RCPT TO` reuses the previous one.
///
/// A message that breaks a limit is still read up to its `.` line, then
/// refused without being handed off.
#[derive(Debug)]
pub struct Session {
    domain: String,
    limits: SessionLimits,
    state: SessionState,
    mail_from: String,
    rcpt_to: String,
    data: Vec<u8>,
    rejection: Option<Reply>,
}

impl Session {
    /// Creates a session that answers as `domain`, with default limits.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_limits(domain, SessionLimits::default())
    }

    /// Creates a session with explicit limits.
    #[must_use]
    pub fn with_limits(domain: impl Into<String>, limits: SessionLimits) -> Self {
        Self {
            domain: domain.into(),
            limits,
            state: SessionState::Greeting,
            mail_from: String::new(),
            rcpt_to: String::new(),
            data: Vec::new(),
            rejection: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the 220 greeting and moves to command state.
    pub fn greeting(&mut self) -> Reply {
        self.state = SessionState::Command;
        Reply::single(ReplyCode::SERVICE_READY, format!("{} ESMTP", self.domain))
    }

    /// Handles one line with its terminator already removed.
    pub fn handle_line(&mut self, line: &[u8]) -> Step {
        match self.state {
            SessionState::DataCollection => self.handle_data_line(line),
            SessionState::Closed => Step::Close(closing()),
            SessionState::Greeting | SessionState::Command => {
                self.state = SessionState::Command;
                self.handle_command(&String::from_utf8_lossy(line))
            }
        }
    }

    /// Handles a line that was cut off at the line limit.
    ///
    /// Outside `DATA` this answers 500 at once. Inside `DATA` the message is
    /// marked for rejection and the 500 is sent after the `.` line.
    pub fn line_too_long(&mut self) -> Step {
        match self.state {
            SessionState::DataCollection => {
                self.reject(too_long());
                Step::Pending
            }
            SessionState::Closed => Step::Close(closing()),
            SessionState::Greeting | SessionState::Command => {
                self.state = SessionState::Command;
                Step::Reply(too_long())
            }
        }
    }

    fn reject(&mut self, reply: Reply) {
        self.data = Vec::new();
        if self.rejection.is_none() {
            self.rejection = Some(reply);
        }
    }

    fn handle_command(&mut self, line: &str) -> Step {
        let line = line.trim();
        let upper = line.to_ascii_uppercase();

        if upper.starts_with("HELO") || upper.starts_with("EHLO") {
            Step::Reply(Reply::single(ReplyCode::OK, self.domain.clone()))
        } else if upper.starts_with("MAIL FROM:") {
            self.mail_from = Address::normalize_path(&line["MAIL FROM:".len()..]);
            Step::Reply(ok())
        } else if upper.starts_with("RCPT TO:") {
            self.rcpt_to = Address::normalize_path(&line["RCPT TO:".len()..]);
            Step::Reply(ok())
        } else if upper == "DATA" {
            self.state = SessionState::DataCollection;
            self.data.clear();
            self.rejection = None;
            Step::Reply(Reply::single(
                ReplyCode::START_DATA,
                "End data with <CR><LF>.<CR><LF>",
            ))
        } else if upper == "QUIT" {
            self.state = SessionState::Closed;
            Step::Close(closing())
        } else {
            Step::Reply(Reply::single(
                ReplyCode::NOT_IMPLEMENTED,
                "Command not implemented",
            ))
        }
    }

    fn handle_data_line(&mut self, line: &[u8]) -> Step {
        if line == b"." {
            self.state = SessionState::Command;
            if let Some(reply) = self.rejection.take() {
                return Step::Reply(reply);
            }
            let message = ReceivedMessage {
                mail_from: self.mail_from.clone(),
                rcpt_to: self.rcpt_to.clone(),
                data: std::mem::take(&mut self.data),
            };
            return Step::Message(message, Reply::single(ReplyCode::OK, "OK: Message accepted"));
        }

        if self.rejection.is_some() {
            return Step::Pending;
        }

        // RFC 5321 section 4.5.2 transparency
        let line = line.strip_prefix(b".").unwrap_or(line);
        let separator = usize::from(!self.data.is_empty());
        if self.data.len() + separator + line.len() > self.limits.max_message_size {
            self.reject(Reply::single(
                ReplyCode::EXCEEDED_STORAGE,
                "Message exceeds fixed maximum message size",
            ));
            return Step::Pending;
        }

        if separator == 1 {
            self.data.push(b'\n');
        }
        self.data.extend_from_slice(line);
        Step::Pending
    }
}

fn ok() -> Reply {
    Reply::single(ReplyCode::OK, "OK")
}

fn closing() -> Reply {
    Reply::single(ReplyCode::CLOSING, "Bye")
}

fn too_long() -> Reply {
    Reply::single(ReplyCode::SYNTAX_ERROR, "Line too long")
}
