//! Charset conversion to UTF-8.

use encoding_rs::{Encoding, UTF_8};

/// Charset assumed when a message declares none.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Looks up a charset label, ignoring an RFC 2231 `*language` suffix.
fn lookup(label: &str) -> Option<&'static Encoding> {
    let label = label.split('*').next().unwrap_or(label).trim();
    if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
        return Some(UTF_8);
    }
    Encoding::for_label(label.as_bytes())
}

/// Decodes bytes in the given charset, failing on any malformed sequence.
///
/// UTF-8 and unknown labels require valid UTF-8.
#[must_use]
pub fn decode_strict(bytes: &[u8], label: &str) -> Option<String> {
    match lookup(label) {
        Some(encoding) if encoding != UTF_8 => {
            let (text, malformed) = encoding.decode_without_bom_handling(bytes);
            (!malformed).then(|| text.into_owned())
        }
        _ => String::from_utf8(bytes.to_vec()).ok(),
    }
}

/// Decodes bytes in the given charset, replacing malformed sequences.
///
/// Unknown labels are treated as UTF-8.
#[must_use]
pub fn decode_lossy(bytes: &[u8], label: &str) -> String {
    let encoding = lookup(label).unwrap_or(UTF_8);
    let (text, _malformed) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_strict() {
        assert_eq!(decode_strict("héllo".as_bytes(), "UTF-8").unwrap(), "héllo");
        assert!(decode_strict(&[0xff, 0xfe], "utf-8").is_none());
    }

    #[test]
    fn test_unknown_label_requires_utf8() {
        assert_eq!(decode_strict(b"plain", "x-unknown").unwrap(), "plain");
        assert!(decode_strict(&[0xe9], "x-unknown").is_none());
    }

    #[test]
    fn test_latin1() {
        assert_eq!(decode_lossy(&[0x63, 0x61, 0x66, 0xe9], "iso-8859-1"), "café");
        assert_eq!(decode_strict(&[0xe9], "ISO-8859-1").unwrap(), "é");
    }

    #[test]
    fn test_gbk() {
        assert_eq!(decode_lossy(&[0xd6, 0xd0, 0xce, 0xc4], "gb2312"), "中文");
    }

    #[test]
    fn test_language_suffix() {
        assert_eq!(decode_strict(&[0xe9], "iso-8859-1*fr").unwrap(), "é");
    }

    #[test]
    fn test_lossy_replaces_invalid_utf8() {
        assert_eq!(decode_lossy(&[b'a', 0xff], "utf-8"), "a\u{fffd}");
    }
}
