//! Outbound mail delivery.
//!
//! The [`Router`] picks a path for each message and drives the collaborators
//! behind it: a [`Relay`](crate::relay::Relay), an [`MxResolver`] and a
//! [`Transport`]. All three are traits so each path can be exercised
//! without a network.

mod error;
mod message;
pub mod mx;
mod router;
mod signer;
pub mod transport;

pub use error::{DeliveryError, DeliveryErrorKind};
pub use message::{HostPort, OutgoingMessage};
pub use mx::{DnsMxResolver, MxLookupError, MxRecord, MxResolver, StaticMxTable};
pub use router::{Outbound, Route, Router};
pub use signer::{MessageSigner, Unsigned};
pub use transport::{SmtpTransport, Transport};
