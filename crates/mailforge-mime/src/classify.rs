//! Message classification: auto-replies and signatures.

use crate::header::Headers;

/// Subject keywords marking an automatic reply, matched case-insensitively.
pub const AUTO_REPLY_KEYWORDS: &[&str] = &[
    "automatic reply",
    "auto reply",
    "auto-reply",
    "autoreply",
    "out of office",
    "out-of-office",
    "vacation",
    "vacation message",
    "holiday",
    "absent",
    "unavailable",
    "自动回复",
    "外出",
    "休假",
    "不在",
    "离开",
    "无法接收",
];

/// Body phrases marking an automatic reply, matched case-insensitively.
pub const AUTO_REPLY_BODY_KEYWORDS: &[&str] = &[
    "this is an automated",
    "automatic response",
    "out of office",
    "vacation message",
    "i am currently away",
    "i will be away",
    "这是一封自动回复",
    "自动回复邮件",
    "外出通知",
    "我现在不在",
];

/// Reports whether a message is an automatic reply.
///
/// The decoded subject is checked against [`AUTO_REPLY_KEYWORDS`], then the
/// `Auto-Submitted`, `X-Auto-Response-Suppress` and `Precedence` headers,
/// then the text body against [`AUTO_REPLY_BODY_KEYWORDS`].
#[must_use]
pub fn is_auto_reply(subject: &str, headers: &Headers, body: &str) -> bool {
    let subject = subject.to_lowercase();
    if AUTO_REPLY_KEYWORDS.iter().any(|kw| subject.contains(kw)) {
        return true;
    }

    if headers
        .get("auto-submitted")
        .is_some_and(|v| !v.trim().eq_ignore_ascii_case("no"))
    {
        return true;
    }

    if headers.contains("x-auto-response-suppress") {
        return true;
    }

    if headers.get("precedence").is_some_and(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("bulk") || v.eq_ignore_ascii_case("auto_reply")
    }) {
        return true;
    }

    let body = body.to_lowercase();
    AUTO_REPLY_BODY_KEYWORDS.iter().any(|kw| body.contains(kw))
}

/// Returns the text after the signature delimiter line, trimmed.
///
/// The delimiter is a line reading `-- ` or `--`. The first delimiter wins.
/// Returns an empty string when there is none.
#[must_use]
pub fn extract_signature(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    lines
        .iter()
        .position(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            line == "--" || line == "-- "
        })
        .map(|idx| lines[idx + 1..].join("\n").trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_reply_subject() {
        let headers = Headers::new();
        assert!(is_auto_reply("Out Of Office: back Monday", &headers, ""));
        assert!(is_auto_reply("自动回复: 休假中", &headers, ""));
        assert!(is_auto_reply("Re: vacation plans", &headers, ""));
        assert!(!is_auto_reply("Quarterly report", &headers, ""));
    }

    #[test]
    fn test_auto_reply_headers() {
        let mut headers = Headers::new();
        headers.add("Auto-Submitted", "auto-replied");
        assert!(is_auto_reply("Hello", &headers, ""));

        let mut headers = Headers::new();
        headers.add("Auto-Submitted", "no");
        assert!(!is_auto_reply("Hello", &headers, ""));

        let mut headers = Headers::new();
        headers.add("Precedence", "Bulk");
        assert!(is_auto_reply("Hello", &headers, ""));

        let mut headers = Headers::new();
        headers.add("Precedence", "list");
        assert!(!is_auto_reply("Hello", &headers, ""));

        let mut headers = Headers::new();
        headers.add("X-Auto-Response-Suppress", "All");
        assert!(is_auto_reply("Hello", &headers, ""));
    }

    #[test]
    fn test_auto_reply_body() {
        let headers = Headers::new();
        assert!(is_auto_reply(
            "Re: invoice",
            &headers,
            "Hello,\nThis is an AUTOMATED message. I will reply later."
        ));
        assert!(is_auto_reply("Re: 发票", &headers, "您好，这是一封自动回复。"));
        assert!(!is_auto_reply("Re: invoice", &headers, "Attached is the invoice."));
    }

    #[test]
    fn test_signature() {
        let body = "Hi there\n\n-- \nAlice\nACME Corp\n";
        assert_eq!(extract_signature(body), "Alice\nACME Corp");
    }

    #[test]
    fn test_signature_bare_dashes() {
        assert_eq!(extract_signature("text\r\n--\r\nBob"), "Bob");
    }

    #[test]
    fn test_dashes_with_other_trailing_whitespace_are_text() {
        assert_eq!(extract_signature("text\n--\t\nnot a signature"), "");
        assert_eq!(extract_signature("text\n--   \nnot a signature"), "");
        assert_eq!(extract_signature("text\n--  \n-- \nDan"), "Dan");
    }

    #[test]
    fn test_no_signature() {
        assert_eq!(extract_signature("just text\n---\nmore"), "");
    }
}
