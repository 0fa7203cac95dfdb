//! Outbound routing: local, relay, MX hosts, relay fallback.

use super::error::DeliveryError;
use super::message::{HostPort, OutgoingMessage};
use super::mx::{MxResolver, StaticMxTable, resolve_candidates};
use super::signer::{MessageSigner, Unsigned};
use super::transport::Transport;
use crate::relay::Relay;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The path a delivered message took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Handed to the local endpoint.
    Local,
    /// Sent through the relay, which is preferred when enabled.
    Relay,
    /// Accepted by this MX host.
    Mx(HostPort),
    /// Every MX host failed and the relay took it.
    RelayFallback,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Relay => f.write_str("relay"),
            Self::Mx(host) => write!(f, "mx {host}"),
            Self::RelayFallback => f.write_str("relay fallback"),
        }
    }
}

/// Fire-and-forget outbound delivery.
pub trait Outbound: Send + Sync + 'static {
    /// Starts delivering `message` in the background.
    fn dispatch(&self, message: OutgoingMessage);
}

/// Decides where an outbound message goes and carries it there.
#[derive(Debug)]
pub struct Router<R, M, T, S = Unsigned> {
    domain: String,
    local_endpoint: HostPort,
    static_mx: StaticMxTable,
    relay: R,
    resolver: M,
    transport: T,
    signer: S,
}

impl<R, M, T> Router<R, M, T>
where
    R: Relay,
    M: MxResolver,
    T: Transport,
{
    /// Creates a router for mail from `domain`.
    ///
    /// Local mail goes to `localhost:25`, the static MX table is the built-in
    /// one, and messages are not signed.
    #[must_use]
    pub fn new(domain: impl Into<String>, relay: R, resolver: M, transport: T) -> Self {
        Self {
            domain: domain.into(),
            local_endpoint: HostPort::new("localhost", 25),
            static_mx: StaticMxTable::builtin(),
            relay,
            resolver,
            transport,
            signer: Unsigned,
        }
    }
}

impl<R, M, T, S> Router<R, M, T, S>
where
    R: Relay,
    M: MxResolver,
    T: Transport,
    S: MessageSigner,
{
    /// Sets where mail for the local domain is sent.
    #[must_use]
    pub fn with_local_endpoint(mut self, endpoint: HostPort) -> Self {
        self.local_endpoint = endpoint;
        self
    }

    /// Sets the fallback table for failed MX lookups.
    #[must_use]
    pub fn with_static_mx(mut self, table: StaticMxTable) -> Self {
        self.static_mx = table;
        self
    }

    /// Sets the signer applied to every rendered message.
    #[must_use]
    pub fn with_signer<S2: MessageSigner>(self, signer: S2) -> Router<R, M, T, S2> {
        Router {
            domain: self.domain,
            local_endpoint: self.local_endpoint,
            static_mx: self.static_mx,
            relay: self.relay,
            resolver: self.resolver,
            transport: self.transport,
            signer,
        }
    }

    /// Returns the relay.
    #[must_use]
    pub const fn relay(&self) -> &R {
        &self.relay
    }

    /// Delivers one message and reports the route taken.
    ///
    /// The first matching path wins:
    /// 1. recipient in our domain: the local endpoint;
    /// 2. relay enabled: the relay, with no MX lookup;
    /// 3. MX hosts in preference order, stopping at the first success;
    /// 4. the relay, if it became enabled meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidRecipient`] for an address without a
    /// domain, the local or relay error when those paths are taken, and
    /// [`DeliveryError::Exhausted`] with the last MX failure otherwise.
    pub async fn deliver(&self, message: &OutgoingMessage) -> Result<Route, DeliveryError> {
        let Some(domain) = message.recipient_domain() else {
            return Err(DeliveryError::InvalidRecipient(message.to.clone()));
        };

        if domain.eq_ignore_ascii_case(&self.domain) {
            let raw = self.render(message);
            debug!(to = %message.to, endpoint = %self.local_endpoint, "local delivery");
            self.transport
                .send(&self.local_endpoint, &message.from, &message.to, &raw)
                .await?;
            return Ok(Route::Local);
        }

        if self.relay.is_enabled() {
            self.send_via_relay(message).await?;
            return Ok(Route::Relay);
        }

        let raw = self.render(message);
        let candidates = resolve_candidates(&self.resolver, &self.static_mx, domain).await;
        let mut last = None;

        for (attempt, target) in candidates.iter().enumerate() {
            debug!(host = %target, attempt = attempt + 1, "trying MX host");
            match self
                .transport
                .send(target, &message.from, &message.to, &raw)
                .await
            {
                Ok(()) => return Ok(Route::Mx(target.clone())),
                Err(e) => {
                    warn!(host = %target, error = %e, "MX host failed");
                    last = Some(e);
                }
            }
        }

        // Only reachable when the relay was enabled after the check above.
        if self.relay.is_enabled() {
            debug!(to = %message.to, "all MX hosts failed, falling back to relay");
            match self.send_via_relay(message).await {
                Ok(()) => return Ok(Route::RelayFallback),
                Err(e) => warn!(error = %e, "relay fallback failed"),
            }
        }

        let last = last.ok_or_else(|| {
            DeliveryError::InvalidRecipient(format!("no delivery candidates for {}", message.to))
        })?;
        Err(DeliveryError::Exhausted {
            attempts: candidates.len(),
            last: Box::new(last),
        })
    }

    fn render(&self, message: &OutgoingMessage) -> String {
        self.signer.add_auth_headers(message.to_rfc5322(&self.domain))
    }

    async fn send_via_relay(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        self.relay
            .send_email(&message.from, &message.to, &message.subject, &message.body)
            .await
    }
}

impl<R, M, T, S> Router<R, M, T, S>
where
    R: Relay + 'static,
    M: MxResolver + 'static,
    T: Transport + 'static,
    S: MessageSigner + 'static,
{
    /// Delivers in a background task that logs the outcome.
    pub fn dispatch(self: &Arc<Self>, message: OutgoingMessage) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            match router.deliver(&message).await {
                Ok(route) => {
                    info!(from = %message.from, to = %message.to, %route, "message delivered");
                }
                Err(e) => {
                    warn!(from = %message.from, to = %message.to, error = %e, "delivery failed");
                }
            }
        })
    }
}

impl<R, M, T, S> Outbound for Arc<Router<R, M, T, S>>
where
    R: Relay + 'static,
    M: MxResolver + 'static,
    T: Transport + 'static,
    S: MessageSigner + 'static,
{
    fn dispatch(&self, message: OutgoingMessage) {
        Router::dispatch(self, message);
    }
}
