//! Integration tests for the inbound SMTP session.
//!
//! A scripted client talks to `serve_connection` over an in-memory duplex
//! pipe and the transcript is checked line by line.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailforge_smtp::server::{MessageSink, ReceivedMessage, SessionLimits, run, serve_connection};
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Sink that keeps every message it is given.
#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<ReceivedMessage>>,
}

impl RecordingSink {
    fn received(&self) -> Vec<ReceivedMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageSink for RecordingSink {
    async fn deliver(&self, message: ReceivedMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// Sends `script` as one client and returns everything the server wrote.
async fn converse(script: &[u8], sink: &RecordingSink) -> String {
    converse_with(script, SessionLimits::default(), sink).await
}

async fn converse_with(script: &[u8], limits: SessionLimits, sink: &RecordingSink) -> String {
    let (mut client, server) = duplex(64 * 1024);
    client.write_all(script).await.unwrap();
    client.shutdown().await.unwrap();

    serve_connection(server, "example.org", limits, sink).await.unwrap();

    let mut transcript = Vec::new();
    client.read_to_end(&mut transcript).await.unwrap();
    String::from_utf8(transcript).unwrap()
}

#[tokio::test]
async fn test_full_transaction() {
    let sink = RecordingSink::default();
    let script = b"EHLO client.test\r\n\
        MAIL FROM:<Alice@Example.COM>\r\n\
        RCPT TO:<bob@example.org>\r\n\
        DATA\r\n\
        Subject: hello\r\n\
        \r\n\
        Hi Bob\r\n\
        .\r\n\
        QUIT\r\n";

    let transcript = converse(script, &sink).await;

    assert_eq!(
        transcript,
        "220 example.org ESMTP\r\n\
         250 example.org\r\n\
         250 OK\r\n\
         250 OK\r\n\
         354 End data with <CR><LF>.<CR><LF>\r\n\
         250 OK: Message accepted\r\n\
         221 Bye\r\n"
    );

    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].mail_from, "alice@example.com");
    assert_eq!(received[0].rcpt_to, "bob@example.org");
    assert_eq!(received[0].data, b"Subject: hello\n\nHi Bob");
}

#[tokio::test]
async fn test_unknown_verbs_keep_connection_open() {
    let sink = RecordingSink::default();
    let transcript = converse(b"NOOP\r\nRSET\r\nhelo there\r\nquit\r\n", &sink).await;

    assert_eq!(
        transcript,
        "220 example.org ESMTP\r\n\
         502 Command not implemented\r\n\
         502 Command not implemented\r\n\
         250 example.org\r\n\
         221 Bye\r\n"
    );
    assert!(sink.received().is_empty());
}

#[tokio::test]
async fn test_bare_lf_and_dot_stuffing() {
    let sink = RecordingSink::default();
    let script = b"RCPT TO:<bob@example.org>\nDATA\n..dotted\nplain\n.\nQUIT\n";

    converse(script, &sink).await;

    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data, b".dotted\nplain");
}

#[tokio::test]
async fn test_eight_bit_data_survives() {
    let sink = RecordingSink::default();
    let mut script = b"DATA\r\nSubject: caf".to_vec();
    script.extend_from_slice(&[0xE9, b'\r', b'\n']);
    script.extend_from_slice(b".\r\nQUIT\r\n");

    converse(&script, &sink).await;

    assert_eq!(sink.received()[0].data, b"Subject: caf\xE9");
}

#[tokio::test]
async fn test_eof_mid_data_drops_message() {
    let sink = RecordingSink::default();
    let (mut client, server) = duplex(1024);
    client.write_all(b"DATA\r\npartial\r\n").await.unwrap();
    client.shutdown().await.unwrap();

    serve_connection(server, "example.org", SessionLimits::default(), &sink)
        .await
        .unwrap();
    assert!(sink.received().is_empty());
}

#[tokio::test]
async fn test_listener_serves_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let server = tokio::spawn(run(
        listener,
        "example.org".to_string(),
        SessionLimits::default(),
        Arc::clone(&sink),
        shutdown_rx,
    ));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"RCPT TO:<bob@example.org>\r\nDATA\r\nbody\r\n.\r\nQUIT\r\n")
        .await
        .unwrap();
    let mut transcript = String::new();
    stream.read_to_string(&mut transcript).await.unwrap();
    assert!(transcript.ends_with("221 Bye\r\n"));

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sink.received().len(), 1);
    assert_eq!(sink.received()[0].data, b"body");
}

const TIGHT: SessionLimits = SessionLimits {
    max_line_length: 32,
    max_message_size: 64,
};

#[tokio::test]
async fn test_long_command_line_refused() {
    let sink = RecordingSink::default();
    let mut script = b"EHLO ".to_vec();
    script.extend_from_slice(&[b'x'; 100]);
    script.extend_from_slice(b"\r\nHELO client.test\r\nQUIT\r\n");

    let transcript = converse_with(&script, TIGHT, &sink).await;

    assert_eq!(
        transcript,
        "220 example.org ESMTP\r\n\
         500 Line too long\r\n\
         250 example.org\r\n\
         221 Bye\r\n"
    );
}

#[tokio::test]
async fn test_endless_line_does_not_stall() {
    let sink = RecordingSink::default();
    let script = vec![b'y'; 10_000];

    let transcript = converse_with(&script, TIGHT, &sink).await;

    assert_eq!(transcript, "220 example.org ESMTP\r\n500 Line too long\r\n");
}

#[tokio::test]
async fn test_oversized_message_refused() {
    let sink = RecordingSink::default();
    let mut script = b"RCPT TO:<bob@example.org>\r\nDATA\r\n".to_vec();
    for _ in 0..10 {
        script.extend_from_slice(b"0123456789abcdef\r\n");
    }
    script.extend_from_slice(b".\r\nDATA\r\nsmall\r\n.\r\nQUIT\r\n");

    let transcript = converse_with(&script, TIGHT, &sink).await;

    assert_eq!(
        transcript,
        "220 example.org ESMTP\r\n\
         250 OK\r\n\
         354 End data with <CR><LF>.<CR><LF>\r\n\
         552 Message exceeds fixed maximum message size\r\n\
         354 End data with <CR><LF>.<CR><LF>\r\n\
         250 OK: Message accepted\r\n\
         221 Bye\r\n"
    );
    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data, b"small");
}

#[tokio::test]
async fn test_long_data_line_rejects_message() {
    let sink = RecordingSink::default();
    let mut script = b"DATA\r\n".to_vec();
    script.extend_from_slice(&[b'z'; 200]);
    script.extend_from_slice(b"\r\n.\r\nQUIT\r\n");

    let transcript = converse_with(&script, TIGHT, &sink).await;

    assert!(transcript.ends_with("354 End data with <CR><LF>.<CR><LF>\r\n500 Line too long\r\n221 Bye\r\n"));
    assert!(sink.received().is_empty());
}
