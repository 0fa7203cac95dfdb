//! Authentication headers for outbound mail.

/// Adds authentication headers (DKIM and the like) to a rendered message.
pub trait MessageSigner: Send + Sync {
    /// Returns `raw` with any headers this signer adds.
    fn add_auth_headers(&self, raw: String) -> String;
}

/// Signer that leaves messages untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsigned;

impl MessageSigner for Unsigned {
    fn add_auth_headers(&self, raw: String) -> String {
        raw
    }
}
