//! # mailforge-mime
//!
//! Lenient MIME decoding for inbound mail.
//!
//! ## Features
//!
//! - **Decoding**: raw RFC 5322 bytes to a structured [`DecodedEmail`]
//! - **Multipart**: nested mixed, alternative and related messages
//! - **Encodings**: Base64, Quoted-Printable, RFC 2047 and RFC 2231 parameters
//! - **Charsets**: conversion to UTF-8 through `encoding_rs`
//! - **Classification**: auto-reply detection, signature and link extraction
//!
//! Decoding never fails. Malformed headers, missing boundaries and unlabeled
//! Base64 bodies all go through fallbacks that produce best-effort text.
//!
//! ## Quick Start
//!
//! ```
//! use mailforge_mime::decode;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             To: recipient@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let email = decode(raw);
//! assert_eq!(email.subject, "Test");
//! assert_eq!(email.body, "Hello, World!");
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```
//! use mailforge_mime::encoding::{decode_quoted_printable, decode_rfc2047, looks_like_base64};
//!
//! assert_eq!(decode_rfc2047("=?UTF-8?Q?caf=C3=A9?="), "café");
//! assert_eq!(decode_quoted_printable(b"a=20b"), b"a b");
//! assert!(!looks_like_base64("plain words"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod classify;
mod content_type;
mod decoder;
mod email;
mod error;
mod header;
mod html;
mod message;
mod scanner;

pub mod charset;
pub mod embedded;
pub mod encoding;

pub use classify::{
    AUTO_REPLY_BODY_KEYWORDS, AUTO_REPLY_KEYWORDS, extract_signature, is_auto_reply,
};
pub use content_type::{ContentDisposition, ContentType};
pub use decoder::decode;
pub use email::{Attachment, DecodedEmail, Disposition};
pub use error::{Error, Result};
pub use header::Headers;
pub use html::{decode_entities, html_to_text};
pub use message::{Part, TransferEncoding};
pub use scanner::{Line, LineScanner, split_head_body, split_multipart};
