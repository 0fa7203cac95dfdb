//! Mailbox storage.

use crate::config::MailboxConfig;
use mailforge_mime::DecodedEmail;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Where decoded messages are kept.
///
/// Addresses are compared case-insensitively.
pub trait MailStore: Send + Sync + 'static {
    /// Returns the settings of a known mailbox.
    fn mailbox(&self, address: &str) -> Option<MailboxConfig>;

    /// Stores `email` in the recipient's mailbox.
    ///
    /// Returns false, without storing, if the mailbox does not exist.
    fn add_email(&self, recipient: &str, email: DecodedEmail) -> bool;
}

/// Mailboxes and their messages held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMailStore {
    mailboxes: RwLock<HashMap<String, MailboxConfig>>,
    emails: RwLock<HashMap<String, Vec<DecodedEmail>>>,
}

impl InMemoryMailStore {
    /// Creates a store with the given mailboxes.
    #[must_use]
    pub fn new(mailboxes: impl IntoIterator<Item = MailboxConfig>) -> Self {
        let store = Self::default();
        store.replace_mailboxes(mailboxes);
        store
    }

    /// Replaces the mailbox list. Stored messages are kept.
    pub fn replace_mailboxes(&self, mailboxes: impl IntoIterator<Item = MailboxConfig>) {
        let map = mailboxes
            .into_iter()
            .map(|mailbox| (mailbox.address.to_lowercase(), mailbox))
            .collect();
        *self
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner) = map;
    }

    /// Returns the messages stored for `address`, oldest first.
    #[must_use]
    pub fn emails(&self, address: &str) -> Vec<DecodedEmail> {
        self.emails
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of messages across all mailboxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Returns true if no messages are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MailStore for InMemoryMailStore {
    fn mailbox(&self, address: &str) -> Option<MailboxConfig> {
        self.mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address.to_lowercase())
            .cloned()
    }

    fn add_email(&self, recipient: &str, email: DecodedEmail) -> bool {
        let key = recipient.to_lowercase();
        if self.mailbox(&key).is_none() {
            debug!(mailbox = %key, "no such mailbox, message dropped");
            return false;
        }

        self.emails
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(email);
        true
    }
}
