//! End-to-end decoding of complete messages.

#![allow(clippy::unwrap_used)]

use mailforge_mime::encoding::looks_like_base64;
use mailforge_mime::{Disposition, decode};
use proptest::prelude::*;

#[test]
fn test_rfc2047_subject() {
    let email = decode(b"Subject: =?UTF-8?B?SGVsbG8=?=\r\n\r\nbody");
    assert_eq!(email.subject, "Hello");
}

#[test]
fn test_q_encoded_subject_underscore() {
    let email = decode(b"Subject: =?ISO-8859-1?Q?Caf=E9_au_lait?=\r\n\r\nbody");
    assert_eq!(email.subject, "Café au lait");
}

#[test]
fn test_adjacent_encoded_words_join() {
    let email = decode(b"Subject: =?UTF-8?Q?Hello_?= =?UTF-8?Q?World?=\r\n\r\nx");
    assert_eq!(email.subject, "Hello World");
}

#[test]
fn test_quoted_printable_body() {
    let raw = b"Content-Transfer-Encoding: quoted-printable\r\n\r\nline one=0D=0Aline=20two";
    assert_eq!(decode(raw).body, "line one\nline two");
}

#[test]
fn test_multipart_text_and_attachment() {
    let raw = concat!(
        "From: sender@example.com\r\n",
        "To: rcpt@example.org\r\n",
        "Subject: Report\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
        "\r\n",
        "This is a multi-part message in MIME format.\r\n",
        "--XYZ\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Hi\r\n",
        "--XYZ\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Disposition: attachment; filename=\"file.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERi0xLjQ=\r\n",
        "--XYZ--\r\n",
        "epilogue\r\n"
    );

    let email = decode(raw.as_bytes());
    assert_eq!(email.body, "Hi");
    assert_eq!(email.attachments.len(), 1);

    let attachment = &email.attachments[0];
    assert_eq!(attachment.filename, "file.pdf");
    assert_eq!(attachment.content_type, "application/pdf");
    assert_eq!(attachment.content, b"%PDF-1.4");
    assert_eq!(attachment.size, 8);
    assert_eq!(attachment.disposition, Disposition::Attachment);
    assert_eq!(email.charset, "utf-8");
}

#[test]
fn test_html_only_multipart_fills_plain_body() {
    let raw = concat!(
        "Content-Type: multipart/alternative; boundary=b\r\n",
        "\r\n",
        "--b\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<html><body><p>Hello&nbsp;there</p></body></html>\r\n",
        "--b--\r\n"
    );
    let email = decode(raw.as_bytes());
    assert_eq!(email.body, "Hello there");
    assert!(email.html_body.is_some());
}

#[test]
fn test_links_and_addresses_from_text() {
    let email = decode(b"Subject: x\r\n\r\nVisit https://example.com or write to help@example.com");
    let links = &email.embedded["links"];
    assert!(links.contains(&"https://example.com".to_string()));
    assert!(links.contains(&"mailto:help@example.com".to_string()));
}

#[test]
fn test_headers_map_keeps_raw_values() {
    let email = decode(b"Subject: =?UTF-8?B?SGVsbG8=?=\r\nX-Custom: 1\r\n\r\nbody");
    assert_eq!(email.header("subject"), Some("=?UTF-8?B?SGVsbG8=?="));
    assert_eq!(email.header("x-custom"), Some("1"));
}

#[test]
fn test_auto_submitted_header() {
    let email = decode(b"Subject: Re: hi\r\nAuto-Submitted: auto-replied\r\n\r\nok");
    assert!(email.is_auto_reply);
}

#[test]
fn test_auto_reply_phrase_in_body() {
    let email = decode(
        b"Subject: Re: meeting\r\nContent-Type: text/plain\r\n\r\nThank you.\r\nI am currently away until Friday.\r\n",
    );
    assert!(email.is_auto_reply);
}

#[test]
fn test_garbage_never_panics() {
    let email = decode(&[0xff, 0x00, b'\n', b'\n', 0xfe, b'=', b'?']);
    assert!(email.attachments.is_empty());
}

proptest! {
    #[test]
    fn prop_plain_body_is_untouched(body in "[a-zA-Z0-9 ,.!?]{0,200}") {
        prop_assume!(!looks_like_base64(&body));
        let raw = format!("Subject: t\r\n\r\n{body}");
        let email = decode(raw.as_bytes());
        prop_assert_eq!(email.body, body.trim());
    }

    #[test]
    fn prop_decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&raw);
    }
}
