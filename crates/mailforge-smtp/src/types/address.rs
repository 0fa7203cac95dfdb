//! Envelope address types.

use crate::error::{Error, Result};
use std::fmt;

/// Email address for the SMTP envelope.
///
/// Holds exactly one `@` with non-empty local and domain parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty, has no `@` or more than one,
    /// or an empty local or domain part.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Normalizes a path argument from `MAIL FROM:` or `RCPT TO:`.
    ///
    /// Surrounding whitespace and angle brackets are removed, ESMTP parameters
    /// after the closing bracket are dropped, and the result is lowercased. No
    /// validation is done; an empty reverse path stays empty.
    #[must_use]
    pub fn normalize_path(arg: &str) -> String {
        let arg = arg.trim();
        let path = match (arg.find('<'), arg.find('>')) {
            (Some(start), Some(end)) if start < end => &arg[start + 1..end],
            _ => arg
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .trim_start_matches('<')
                .trim_end_matches('>'),
        };
        path.trim().to_lowercase()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("address cannot be empty".into()));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("{addr}: missing @")));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(format!("{addr}: more than one @")));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "{addr}: local and domain parts cannot be empty"
            )));
        }

        if addr.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidAddress(format!("{addr}: contains whitespace")));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("").is_err());
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
        assert!(Address::new("a b@c.d").is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(Address::normalize_path("<Alice@Example.COM>"), "alice@example.com");
        assert_eq!(Address::normalize_path(" <bob@x.org> SIZE=100"), "bob@x.org");
        assert_eq!(Address::normalize_path("carol@y.org"), "carol@y.org");
        assert_eq!(Address::normalize_path("<>"), "");
    }
}
