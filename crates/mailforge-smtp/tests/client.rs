//! Integration tests for the SMTP client.
//!
//! Each test runs a scripted server on a loopback port: it checks every
//! command the client sends against an expected prefix and answers with a
//! canned reply.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mailforge_smtp::connection::{Security, establish};
use mailforge_smtp::{Address, Error, Extension, SmtpConnection};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

const DIAL: Duration = Duration::from_secs(5);

/// Expected command prefix and the reply to send back.
///
/// An expected prefix of `"."` collects message lines up to the terminator.
type Script = Vec<(&'static str, &'static str)>;

async fn scripted_server(script: Script) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);
        let mut received = Vec::new();

        stream.write_all(b"220 mx.test ESMTP\r\n").await.unwrap();
        for (expected, reply) in script {
            loop {
                let mut line = String::new();
                if stream.read_line(&mut line).await.unwrap() == 0 {
                    return received;
                }
                let line = line.trim_end_matches("\r\n").to_string();
                let done = expected != "." || line == ".";
                if expected != "." {
                    assert!(line.starts_with(expected), "expected {expected:?}, got {line:?}");
                }
                received.push(line);
                if done {
                    break;
                }
            }
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
        received
    });

    (port, handle)
}

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

#[tokio::test]
async fn test_full_transaction() {
    let (port, server) = scripted_server(vec![
        ("EHLO client.test", "250-mx.test\r\n250-SIZE 1000\r\n250 8BITMIME\r\n"),
        ("MAIL FROM:", "250 OK\r\n"),
        ("RCPT TO:<bob@mx.test>", "250 OK\r\n"),
        ("DATA", "354 go ahead\r\n"),
        (".", "250 queued\r\n"),
        ("QUIT", "221 Bye\r\n"),
    ])
    .await;

    let message = b"Subject: hi\n\n.dot line\nbody\n";
    let client = establish("127.0.0.1", port, Security::None, "client.test", DIAL)
        .await
        .unwrap();
    assert!(client.server_info().supports(&Extension::EightBitMime));
    assert_eq!(client.server_info().max_message_size(), Some(1000));

    client
        .mail_from(addr("alice@client.test"), message.len())
        .await
        .unwrap()
        .rcpt_to(addr("bob@mx.test"))
        .await
        .unwrap()
        .data()
        .await
        .unwrap()
        .send_message(message)
        .await
        .unwrap()
        .quit()
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert_eq!(
        received[1],
        format!("MAIL FROM:<alice@client.test> BODY=8BITMIME SIZE={}", message.len())
    );
    assert_eq!(
        &received[4..9],
        &["Subject: hi", "", "..dot line", "body", "."]
    );
}

#[tokio::test]
async fn test_helo_fallback() {
    let (port, server) = scripted_server(vec![
        ("EHLO client.test", "502 Command not implemented\r\n"),
        ("HELO client.test", "250 mx.test\r\n"),
        ("MAIL FROM:<alice@client.test>", "250 OK\r\n"),
    ])
    .await;

    let client = establish("127.0.0.1", port, Security::None, "client.test", DIAL)
        .await
        .unwrap();
    assert!(client.server_info().extensions.is_empty());

    // No SIZE or BODY parameters without EHLO.
    client.mail_from(addr("alice@client.test"), 10).await.unwrap();
    let received = server.await.unwrap();
    assert_eq!(received[2], "MAIL FROM:<alice@client.test>");
}

#[tokio::test]
async fn test_greetings_both_refused() {
    let (port, _server) = scripted_server(vec![
        ("EHLO", "500 go away\r\n"),
        ("HELO", "554 really\r\n"),
    ])
    .await;

    let err = establish("127.0.0.1", port, Security::None, "client.test", DIAL)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SmtpError { code: 554, .. }));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_opportunistic_without_starttls_stays_plain() {
    let (port, _server) = scripted_server(vec![("EHLO", "250-mx.test\r\n250 PIPELINING\r\n")]).await;

    let client = establish("127.0.0.1", port, Security::Opportunistic, "client.test", DIAL)
        .await
        .unwrap();
    assert!(!client.is_tls());
}

#[tokio::test]
async fn test_opportunistic_refused_starttls_stays_plain() {
    let (port, server) = scripted_server(vec![
        ("EHLO", "250-mx.test\r\n250 STARTTLS\r\n"),
        ("STARTTLS", "454 TLS not available\r\n"),
        ("QUIT", "221 Bye\r\n"),
    ])
    .await;

    let client = establish("127.0.0.1", port, Security::Opportunistic, "client.test", DIAL)
        .await
        .unwrap();
    assert!(!client.is_tls());
    assert_ok!(client.quit().await);
    assert_eq!(server.await.unwrap().len(), 3);
}

/// Accepts STARTTLS on the first connection and then answers the handshake
/// in plaintext. The second connection only greets.
async fn broken_starttls_server() -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        let replies: [&[(&str, &str)]; 2] = [
            &[
                ("EHLO", "250-mx.test\r\n250 STARTTLS\r\n"),
                ("STARTTLS", "220 go ahead\r\n220 not tls\r\n"),
            ],
            &[("EHLO", "250 mx.test\r\n")],
        ];

        for script in replies {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = BufReader::new(stream);
            stream.write_all(b"220 mx.test ESMTP\r\n").await.unwrap();
            for (expected, reply) in script {
                let mut line = String::new();
                stream.read_line(&mut line).await.unwrap();
                assert!(line.starts_with(expected), "expected {expected:?}, got {line:?}");
                received.push(line.trim_end().to_string());
                stream.write_all(reply.as_bytes()).await.unwrap();
            }
        }
        received
    });

    (port, handle)
}

#[tokio::test]
async fn test_opportunistic_failed_handshake_redials_plain() {
    let (port, server) = broken_starttls_server().await;

    let client = assert_ok!(
        establish("127.0.0.1", port, Security::Opportunistic, "client.test", DIAL).await
    );
    assert!(!client.is_tls());
    assert!(!client.server_info().supports_starttls());

    let received = server.await.unwrap();
    assert_eq!(received, ["EHLO client.test", "STARTTLS", "EHLO client.test"]);
}

#[tokio::test]
async fn test_required_failed_handshake_is_transport() {
    let (port, _server) = broken_starttls_server().await;

    let err = assert_err!(
        establish("127.0.0.1", port, Security::Required, "client.test", DIAL).await
    );
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_required_starttls_not_offered() {
    let (port, _server) = scripted_server(vec![("EHLO", "250 mx.test\r\n")]).await;

    let err = assert_err!(
        establish("127.0.0.1", port, Security::Required, "client.test", DIAL).await
    );
    assert!(matches!(err, Error::NotSupported(_)));
}

#[tokio::test]
async fn test_size_limit_rejected_before_mail_from() {
    let (port, server) = scripted_server(vec![("EHLO", "250-mx.test\r\n250 SIZE 10\r\n")]).await;

    let client = establish("127.0.0.1", port, Security::None, "client.test", DIAL)
        .await
        .unwrap();
    let err = client.mail_from(addr("alice@client.test"), 100).await.unwrap_err();
    assert!(matches!(err, Error::MessageTooLarge { size: 100, limit: 10 }));

    // The connection was dropped without a MAIL FROM.
    assert_eq!(server.await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_recipient() {
    let (port, _server) = scripted_server(vec![
        ("EHLO", "250 mx.test\r\n"),
        ("MAIL FROM:", "250 OK\r\n"),
        ("RCPT TO:", "550 5.1.1 no such user\r\n"),
    ])
    .await;

    let client = establish("127.0.0.1", port, Security::None, "client.test", DIAL)
        .await
        .unwrap();
    let err = client
        .mail_from(addr("alice@client.test"), 10)
        .await
        .unwrap()
        .rcpt_to(addr("nobody@mx.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SmtpError { code: 550, .. }));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = assert_err!(establish("127.0.0.1", port, Security::None, "client.test", DIAL).await);
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_server_closing_mid_dialogue_is_transport() {
    let (port, _server) = scripted_server(vec![]).await;

    let err = establish("127.0.0.1", port, Security::None, "client.test", DIAL)
        .await
        .unwrap_err();
    assert!(err.is_transport());
}
