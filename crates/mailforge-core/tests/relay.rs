//! Relay client against a plaintext loopback server.

#![allow(clippy::unwrap_used)]

use mailforge_core::delivery::DeliveryErrorKind;
use mailforge_core::{Relay, RelayConfig, RelaySettings, SmtpRelay};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accepts one session, answering AUTH with `auth_reply`.
async fn relay_server(auth_reply: &'static str) -> (u16, JoinHandle<Vec<String>>) {
    relay_server_offering("250-relay.test\r\n250 AUTH PLAIN LOGIN\r\n", auth_reply).await
}

async fn relay_server_offering(
    ehlo_reply: &'static str,
    auth_reply: &'static str,
) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);
        stream.write_all(b"220 relay.test ESMTP\r\n").await.unwrap();

        let mut seen = Vec::new();
        let mut in_data = false;
        loop {
            let mut line = String::new();
            if stream.read_line(&mut line).await.unwrap() == 0 {
                return seen;
            }
            let line = line.trim_end().to_string();
            let reply = if in_data {
                if line != "." {
                    seen.push(line);
                    continue;
                }
                in_data = false;
                "250 queued\r\n"
            } else if line.starts_with("EHLO") {
                ehlo_reply
            } else if line.starts_with("AUTH") {
                auth_reply
            } else if line == "DATA" {
                in_data = true;
                "354 go\r\n"
            } else if line == "QUIT" {
                "221 bye\r\n"
            } else {
                "250 ok\r\n"
            };
            seen.push(line);
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
    });
    (port, handle)
}

fn relay(port: u16, username: &str) -> SmtpRelay {
    let settings = RelaySettings::new(RelayConfig {
        enabled: true,
        host: "127.0.0.1".to_string(),
        port,
        username: username.to_string(),
        password: "s3cret".to_string(),
        use_tls: false,
    });
    SmtpRelay::new(settings, "example.org", "mail.example.org", Duration::from_secs(5))
}

#[tokio::test]
async fn test_authenticated_send() {
    let (port, server) = relay_server("235 accepted\r\n").await;

    relay(port, "relay-user")
        .send_email("alice@example.org", "bob@example.net", "Greetings", "Hello Bob")
        .await
        .unwrap();

    let seen = server.await.unwrap();
    assert_eq!(seen[0], "EHLO mail.example.org");
    assert_eq!(seen[1], "AUTH PLAIN AHJlbGF5LXVzZXIAczNjcmV0");
    assert!(seen[2].starts_with("MAIL FROM:<alice@example.org>"));
    assert_eq!(seen[3], "RCPT TO:<bob@example.net>");
    assert!(seen.contains(&"Subject: Greetings".to_string()));
    assert!(seen.iter().any(|l| l.starts_with("Message-ID: <") && l.ends_with("@example.org>")));
    assert!(seen.contains(&"Hello Bob".to_string()));
    assert_eq!(seen.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_no_auth_without_username() {
    let (port, server) = relay_server("535 should not be asked\r\n").await;

    relay(port, "")
        .send_email("alice@example.org", "bob@example.net", "s", "b")
        .await
        .unwrap();

    let seen = server.await.unwrap();
    assert!(!seen.iter().any(|l| l.starts_with("AUTH")));
}

#[tokio::test]
async fn test_rejected_credentials() {
    let (port, _server) = relay_server("535 authentication failed\r\n").await;

    let err = relay(port, "relay-user")
        .send_email("alice@example.org", "bob@example.net", "s", "b")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::Protocol);
    let expected = format!("127.0.0.1:{port}");
    assert_eq!(err.host(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_plain_not_offered_fails_before_auth() {
    let (port, server) =
        relay_server_offering("250-relay.test\r\n250 AUTH LOGIN\r\n", "235 accepted\r\n").await;

    let err = relay(port, "relay-user")
        .send_email("alice@example.org", "bob@example.net", "s", "b")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::Protocol);
    let seen = server.await.unwrap();
    assert_eq!(seen, ["EHLO mail.example.org"]);
}
