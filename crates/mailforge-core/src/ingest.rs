//! Inbound pipeline: decode, store, forward.

use crate::delivery::{OutgoingMessage, Outbound};
use crate::mailbox::MailStore;
use mailforge_mime::DecodedEmail;
use mailforge_smtp::{MessageSink, ReceivedMessage};
use rand::RngCore;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Turns received messages into stored mail.
///
/// Every message is decoded, whatever its content. The envelope sender and
/// recipient replace the header addresses when present.
#[derive(Debug)]
pub struct IngestPipeline<St, O> {
    store: Arc<St>,
    outbound: O,
}

impl<St: MailStore, O: Outbound> IngestPipeline<St, O> {
    /// Creates a pipeline storing into `store` and forwarding via `outbound`.
    #[must_use]
    pub const fn new(store: Arc<St>, outbound: O) -> Self {
        Self { store, outbound }
    }

    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Processes one message. Returns true if a copy was stored.
    pub fn ingest(&self, message: &ReceivedMessage) -> bool {
        let mut email = mailforge_mime::decode(&message.data);
        if !message.mail_from.is_empty() {
            email.sender.clone_from(&message.mail_from);
        }
        if !message.rcpt_to.is_empty() {
            email.recipient.clone_from(&message.rcpt_to);
        }

        let recipient = email.recipient.to_lowercase();
        let Some(mailbox) = self.store.mailbox(&recipient) else {
            debug!(to = %recipient, "recipient has no mailbox");
            return false;
        };

        email.id = generate_email_id(&recipient);
        info!(
            mailbox = %recipient,
            id = %email.id,
            from = %email.sender,
            attachments = email.attachments.len(),
            "message received"
        );

        if let Some(target) = mailbox.forward_to.as_deref().filter(|t| !t.is_empty()) {
            debug!(mailbox = %recipient, to = target, "forwarding");
            self.outbound
                .dispatch(forwarded_message(&email, &mailbox.address, target));
        }

        if mailbox.keep_original {
            self.store.add_email(&recipient, email)
        } else {
            false
        }
    }
}

impl<St: MailStore, O: Outbound> MessageSink for IngestPipeline<St, O> {
    async fn deliver(&self, message: ReceivedMessage) {
        self.ingest(&message);
    }
}

/// Builds a storage ID: `{mailbox, @ as _at_}_{unix nanos}_{8 hex}`.
#[must_use]
pub fn generate_email_id(mailbox: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let suffix = rand::thread_rng().next_u32();
    format!("{}_{nanos}_{suffix:08x}", mailbox.replace('@', "_at_"))
}

/// Wraps a received message for forwarding from `mailbox` to `target`.
#[must_use]
pub fn forwarded_message(email: &DecodedEmail, mailbox: &str, target: &str) -> OutgoingMessage {
    let mut body = String::from("---------- Forwarded message ----------\n");
    let _ = writeln!(body, "From: {}", email.sender);
    let _ = writeln!(body, "Date: {}", email.date);
    let _ = writeln!(body, "Subject: {}", email.subject);
    let _ = writeln!(body, "To: {mailbox}");
    if !email.cc.is_empty() {
        let _ = writeln!(body, "CC: {}", email.cc.join(", "));
    }
    body.push('\n');
    body.push_str(&email.body);

    OutgoingMessage::new(mailbox, target, format!("Fwd: {}", email.subject), body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MailboxConfig;
    use crate::mailbox::InMemoryMailStore;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<OutgoingMessage>>>);

    impl Outbound for Recorder {
        fn dispatch(&self, message: OutgoingMessage) {
            self.0.lock().unwrap().push(message);
        }
    }

    fn received(rcpt: &str, data: &str) -> ReceivedMessage {
        ReceivedMessage {
            mail_from: "sender@example.net".to_string(),
            rcpt_to: rcpt.to_string(),
            data: data.as_bytes().to_vec(),
        }
    }

    const RAW: &str = "From: Header <header@example.net>\nTo: alice@example.org\nCc: carol@example.net\nSubject: Hello\n\nHi Alice";

    #[test]
    fn test_stores_with_envelope_and_id() {
        let store = Arc::new(InMemoryMailStore::new([MailboxConfig::new(
            "alice@example.org",
        )]));
        let outbound = Recorder::default();
        let pipeline = IngestPipeline::new(Arc::clone(&store), outbound.clone());

        assert!(pipeline.ingest(&received("Alice@Example.org", RAW)));

        let stored = store.emails("alice@example.org");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender, "sender@example.net");
        assert_eq!(stored[0].recipient, "Alice@Example.org");
        assert_eq!(stored[0].subject, "Hello");
        assert!(stored[0].id.starts_with("alice_at_example.org_"));
        assert!(outbound.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_recipient_dropped() {
        let store = Arc::new(InMemoryMailStore::default());
        let pipeline = IngestPipeline::new(Arc::clone(&store), Recorder::default());
        assert!(!pipeline.ingest(&received("nobody@example.org", RAW)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_forward_without_keeping() {
        let mailbox = MailboxConfig {
            address: "alice@example.org".to_string(),
            forward_to: Some("alice@elsewhere.net".to_string()),
            keep_original: false,
        };
        let store = Arc::new(InMemoryMailStore::new([mailbox]));
        let outbound = Recorder::default();
        let pipeline = IngestPipeline::new(Arc::clone(&store), outbound.clone());

        assert!(!pipeline.ingest(&received("alice@example.org", RAW)));
        assert!(store.is_empty());

        let sent = outbound.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "alice@example.org");
        assert_eq!(sent[0].to, "alice@elsewhere.net");
        assert_eq!(sent[0].subject, "Fwd: Hello");
        assert!(
            sent[0]
                .body
                .starts_with("---------- Forwarded message ----------\nFrom: sender@example.net\n")
        );
        assert!(sent[0].body.contains("CC: carol@example.net\n"));
        assert!(sent[0].body.ends_with("\n\nHi Alice"));
    }

    #[test]
    fn test_forward_and_keep() {
        let mailbox = MailboxConfig {
            address: "alice@example.org".to_string(),
            forward_to: Some("alice@elsewhere.net".to_string()),
            keep_original: true,
        };
        let store = Arc::new(InMemoryMailStore::new([mailbox]));
        let outbound = Recorder::default();
        let pipeline = IngestPipeline::new(Arc::clone(&store), outbound.clone());

        assert!(pipeline.ingest(&received("alice@example.org", RAW)));
        assert_eq!(store.len(), 1);
        assert_eq!(outbound.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_email_id_format() {
        let id = generate_email_id("bob@example.org");
        let (prefix, suffix) = id.rsplit_once('_').unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        let (mailbox, nanos) = prefix.rsplit_once('_').unwrap();
        assert_eq!(mailbox, "bob_at_example.org");
        assert!(nanos.parse::<u128>().is_ok());
    }

    #[tokio::test]
    async fn test_message_sink_delivers() {
        let store = Arc::new(InMemoryMailStore::new([MailboxConfig::new(
            "alice@example.org",
        )]));
        let pipeline = IngestPipeline::new(Arc::clone(&store), Recorder::default());
        pipeline
            .deliver(received("alice@example.org", "Subject: x\n\nbody"))
            .await;
        assert_eq!(store.len(), 1);
    }
}
