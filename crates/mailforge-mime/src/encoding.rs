//! Transfer encoding codecs.
//!
//! Base64, quoted-printable and RFC 2047 encoded words, plus the heuristic
//! used for bodies that arrive without a `Content-Transfer-Encoding` header.
//! Decoders here are lenient: malformed escapes are kept literally instead of
//! failing the whole value.

use crate::charset;
use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

/// Minimum share of valid Base64 characters, in percent, for content that is
/// not a whole number of 4-character blocks.
pub const BASE64_MIN_VALID_PERCENT: usize = 75;

/// Minimum length of content accepted through the valid-character ratio.
pub const BASE64_MIN_LENGTH: usize = 8;

/// Base64 block size in characters.
pub const BASE64_BLOCK: usize = 4;

/// Maximum number of trailing `=` padding characters.
pub const BASE64_MAX_PADDING: usize = 2;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes strict, padded Base64.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Base64 the way transfer-encoded bodies need it.
///
/// Whitespace and line breaks are removed first. If the standard alphabet
/// fails, the input is retried with `=` padding appended and then with the
/// URL-safe alphabet.
///
/// # Errors
///
/// Returns the standard-alphabet error if every attempt fails.
pub fn decode_base64_lenient(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();

    let first_error = match STANDARD.decode(&cleaned) {
        Ok(bytes) => return Ok(bytes),
        Err(e) => e,
    };

    let padded = pad_base64(&cleaned);
    if let Ok(bytes) = STANDARD.decode(&padded) {
        return Ok(bytes);
    }
    if let Ok(bytes) = URL_SAFE.decode(&padded) {
        return Ok(bytes);
    }

    Err(first_error.into())
}

/// Appends `=` until the length is a multiple of four.
fn pad_base64(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    let missing = (BASE64_BLOCK - trimmed.len() % BASE64_BLOCK) % BASE64_BLOCK;
    let mut padded = String::with_capacity(trimmed.len() + missing);
    padded.push_str(trimmed);
    padded.extend(std::iter::repeat_n('=', missing));
    padded
}

const fn is_base64_byte(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' | b'=')
}

/// Reports whether unlabeled content should be treated as Base64.
///
/// The trimmed content must consist only of `[A-Za-z0-9+/=]` and carry at most
/// two trailing `=`. It is then accepted if its length is a multiple of four,
/// or if at least 75% of it is valid and it is at least eight characters long.
/// Content shorter than one block is never Base64.
#[must_use]
pub fn looks_like_base64(text: &str) -> bool {
    let trimmed = text.trim();
    let len = trimmed.len();
    if len < BASE64_BLOCK {
        return false;
    }

    let valid = trimmed.bytes().filter(|&b| is_base64_byte(b)).count();
    if valid != len {
        return false;
    }

    let padding = trimmed.bytes().rev().take_while(|&b| b == b'=').count();
    if padding > BASE64_MAX_PADDING {
        return false;
    }

    let ratio_ok = valid * 100 >= len * BASE64_MIN_VALID_PERCENT && len >= BASE64_MIN_LENGTH;
    ratio_ok || len % BASE64_BLOCK == 0
}

/// Decodes a body that arrived without a transfer-encoding label.
///
/// Returns the decoded text only when the content passes
/// [`looks_like_base64`], decodes to valid UTF-8, and the decoded text does not
/// itself look like Base64. Otherwise returns `None` and the caller keeps the
/// original content.
#[must_use]
pub fn decode_unlabeled_base64(text: &str) -> Option<String> {
    if !looks_like_base64(text) {
        return None;
    }

    let bytes = decode_base64(text.trim()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    if looks_like_base64(&decoded) {
        return None;
    }
    Some(decoded)
}

pub(crate) const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Decodes quoted-printable content (RFC 2045).
///
/// Soft line breaks are removed, `=XX` becomes the byte `XX`, and CRLF pairs
/// in the result collapse to `\n`. An `=` that starts no valid escape is
/// kept as is.
#[must_use]
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        let rest = &input[i + 1..];

        // Soft line break, tolerating transport padding before the newline.
        let pad = rest
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        let after = &rest[pad..];
        if after.starts_with(b"\r\n") {
            i += 1 + pad + 2;
            continue;
        }
        if after.starts_with(b"\n") {
            i += 1 + pad + 1;
            continue;
        }
        if after.is_empty() {
            break;
        }

        match (
            rest.first().copied().and_then(hex_value),
            rest.get(1).copied().and_then(hex_value),
        ) {
            (Some(high), Some(low)) => {
                out.push((high << 4) | low);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    collapse_crlf(out)
}

fn collapse_crlf(bytes: Vec<u8>) -> Vec<u8> {
    if !bytes.windows(2).any(|w| w == b"\r\n") {
        return bytes;
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.into_iter().peekable();
    while let Some(byte) = iter.next() {
        if byte == b'\r' && iter.peek() == Some(&b'\n') {
            continue;
        }
        out.push(byte);
    }
    out
}

/// Decodes the text of a `Q` encoded word, where `_` stands for a space.
#[must_use]
pub fn decode_q_word(text: &str) -> Vec<u8> {
    decode_quoted_printable(text.replace('_', " ").as_bytes())
}

/// Encodes a header value using RFC 2047 `B` encoding when needed.
///
/// Plain ASCII without `=` or `?` is returned unchanged.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Text outside encoded words is kept. Whitespace between two adjacent
/// encoded words is dropped. A word with an unknown encoding, bad Base64, or
/// bytes that are not valid in its charset stays in its encoded form.
#[must_use]
pub fn decode_rfc2047(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    out.push_str(rest);
    out
}

/// Decodes one encoded word at the start of `word`.
///
/// Returns the decoded text and the number of bytes the word spans.
fn decode_encoded_word(word: &str) -> Option<(String, usize)> {
    let inner = word.strip_prefix("=?")?;
    let (charset_label, rest) = inner.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let text = &rest[..end];

    if charset_label.is_empty()
        || charset_label.contains(char::is_whitespace)
        || encoding.len() != 1
        || text.contains(char::is_whitespace)
    {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64_lenient(text).ok()?,
        "Q" | "q" => decode_q_word(text),
        _ => return None,
    };

    let decoded = charset::decode_strict(&bytes, charset_label)?;
    let consumed = 2 + charset_label.len() + 1 + encoding.len() + 1 + end + 2;
    Some((decoded, consumed))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lenient_strips_line_breaks() {
        let decoded = decode_base64_lenient("SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_lenient_adds_padding() {
        assert_eq!(decode_base64_lenient("SGVsbG8").unwrap(), b"Hello");
        assert_eq!(decode_base64_lenient("SGk").unwrap(), b"Hi");
    }

    #[test]
    fn test_base64_lenient_url_safe() {
        // 0xfb 0xff encodes to "-_8" in the URL-safe alphabet.
        assert_eq!(decode_base64_lenient("-_8=").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_base64_lenient_rejects_garbage() {
        assert!(decode_base64_lenient("not base64 at all!").is_err());
    }

    #[test]
    fn test_looks_like_base64() {
        assert!(looks_like_base64("SGVsbG8gV29ybGQ="));
        assert!(looks_like_base64("  SGVsbG8gV29ybGQ=\n"));
        assert!(looks_like_base64("SGVsbG8gV29ybGQ"));
        assert!(!looks_like_base64("Hello World"));
        assert!(!looks_like_base64("abc"));
        assert!(!looks_like_base64(""));
        assert!(!looks_like_base64("SGVsbG8==="));
        assert!(!looks_like_base64("Hello"));
    }

    #[test]
    fn test_decode_unlabeled_base64() {
        assert_eq!(
            decode_unlabeled_base64("SGVsbG8gV29ybGQ=").as_deref(),
            Some("Hello World")
        );
        assert_eq!(decode_unlabeled_base64("Hello World"), None);
    }

    #[test]
    fn test_decode_unlabeled_base64_rejects_binary() {
        // Decodes to bytes that are not UTF-8.
        assert_eq!(decode_unlabeled_base64("Test"), None);
    }

    #[test]
    fn test_decode_unlabeled_base64_no_double_decode() {
        // "U0dWc2JHOD0=" decodes to "SGVsbG8=", which still looks like Base64.
        assert_eq!(decode_unlabeled_base64("U0dWc2JHOD0="), None);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(
            String::from_utf8(decode_quoted_printable(b"H=C3=A9llo")).unwrap(),
            "Héllo"
        );
    }

    #[test]
    fn test_quoted_printable_escapes() {
        assert_eq!(decode_quoted_printable(b"=0D=0A"), b"\n");
        assert_eq!(decode_quoted_printable(b"=20"), b" ");
        assert_eq!(decode_quoted_printable(b"a=3Db"), b"a=b");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \r\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_invalid_escape_kept() {
        assert_eq!(decode_quoted_printable(b"100=ZZ"), b"100=ZZ");
        assert_eq!(decode_quoted_printable(b"a=4"), b"a=4");
    }

    #[test]
    fn test_q_word_underscore() {
        assert_eq!(decode_q_word("Hello_World"), b"Hello World");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");

        let encoded = encode_rfc2047("Héllo", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_rfc2047(&encoded), "Héllo");
    }

    #[test]
    fn test_rfc2047_decode_base64() {
        assert_eq!(decode_rfc2047("=?UTF-8?B?SGVsbG8=?="), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_decode_q() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
    }

    #[test]
    fn test_rfc2047_mixed_text() {
        assert_eq!(
            decode_rfc2047("Re: =?UTF-8?B?SGVsbG8=?= again"),
            "Re: Hello again"
        );
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?UTF-8?B?SGVs?= =?UTF-8?B?bG8=?="),
            "Hello"
        );
    }

    #[test]
    fn test_rfc2047_unknown_encoding_untouched() {
        let value = "=?UTF-8?X?abc?=";
        assert_eq!(decode_rfc2047(value), value);
    }

    #[test]
    fn test_rfc2047_invalid_utf8_untouched() {
        // 0xff 0xfe is not UTF-8.
        let value = "=?UTF-8?B?//4=?=";
        assert_eq!(decode_rfc2047(value), value);
    }

    #[test]
    fn test_rfc2047_legacy_charset() {
        // "中文" in GBK.
        assert_eq!(decode_rfc2047("=?gb2312?B?1tDOxA==?="), "中文");
    }

    #[test]
    fn test_rfc2047_unterminated_word() {
        assert_eq!(decode_rfc2047("=?UTF-8?B?SGVsbG8="), "=?UTF-8?B?SGVsbG8=");
    }

    proptest! {
        #[test]
        fn prop_unlabeled_plain_text_untouched(body in "[a-zA-Z0-9 ,.!?']{0,80}") {
            prop_assume!(!looks_like_base64(&body));
            prop_assert_eq!(decode_unlabeled_base64(&body), None);
        }

        #[test]
        fn prop_quoted_printable_plain_ascii_untouched(text in "[a-zA-Z0-9 ,.!?]{0,80}") {
            prop_assert_eq!(decode_quoted_printable(text.as_bytes()), text.as_bytes().to_vec());
        }
    }
}
