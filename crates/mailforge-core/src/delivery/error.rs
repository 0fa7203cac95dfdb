//! Outbound delivery errors.

/// Error from routing or transmitting one outbound message.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient has no usable domain.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The host could not be reached or the connection broke.
    #[error("Transport failure at {host}: {source}")]
    Transport {
        /// Host the attempt was made against.
        host: String,
        /// Underlying SMTP error.
        #[source]
        source: mailforge_smtp::Error,
    },

    /// The host answered but refused the transaction.
    #[error("Protocol failure at {host}: {source}")]
    Protocol {
        /// Host the attempt was made against.
        host: String,
        /// Underlying SMTP error.
        #[source]
        source: mailforge_smtp::Error,
    },

    /// The relay was asked to send while disabled.
    #[error("SMTP relay is disabled")]
    RelayDisabled,

    /// Every candidate host failed.
    #[error("Delivery failed after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Number of hosts tried.
        attempts: usize,
        /// Most recent failure.
        #[source]
        last: Box<DeliveryError>,
    },
}

/// Coarse classification of a [`DeliveryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// Bad recipient address.
    InvalidRecipient,
    /// Dial, timeout, reset or TLS failure.
    Transport,
    /// Unexpected SMTP reply.
    Protocol,
    /// Relay not enabled.
    RelayDisabled,
    /// All candidates failed.
    Exhausted,
}

impl DeliveryError {
    /// Wraps an SMTP error from an attempt against `host`.
    #[must_use]
    pub fn from_smtp(host: impl Into<String>, source: mailforge_smtp::Error) -> Self {
        let host = host.into();
        if source.is_transport() {
            Self::Transport { host, source }
        } else {
            Self::Protocol { host, source }
        }
    }

    /// Returns the kind of failure.
    #[must_use]
    pub const fn kind(&self) -> DeliveryErrorKind {
        match self {
            Self::InvalidRecipient(_) => DeliveryErrorKind::InvalidRecipient,
            Self::Transport { .. } => DeliveryErrorKind::Transport,
            Self::Protocol { .. } => DeliveryErrorKind::Protocol,
            Self::RelayDisabled => DeliveryErrorKind::RelayDisabled,
            Self::Exhausted { .. } => DeliveryErrorKind::Exhausted,
        }
    }

    /// Returns the host an attempt failed against, if any.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Transport { host, .. } | Self::Protocol { host, .. } => Some(host),
            Self::Exhausted { last, .. } => last.host(),
            Self::InvalidRecipient(_) | Self::RelayDisabled => None,
        }
    }
}
