//! Extraction of images and links referenced by a message.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Key for `<img src>` targets.
pub const IMAGES: &str = "images";
/// Key for link targets from HTML anchors and plain-text URLs.
pub const LINKS: &str = "links";
/// Key for `cid:` references to inline image attachments.
pub const INLINE_IMAGES: &str = "inline_images";

// Literal patterns.
#[allow(clippy::expect_used)]
static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("img pattern")
});

#[allow(clippy::expect_used)]
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href\s*=\s*["']([^"']+)["']"#).expect("anchor pattern")
});

#[allow(clippy::expect_used)]
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("url pattern")
});

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern")
});

/// Collects embedded content, deduplicated in first-seen order.
#[derive(Debug, Default)]
pub struct EmbeddedContent {
    entries: Vec<(&'static str, Vec<String>)>,
}

impl EmbeddedContent {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one item under `kind`, ignoring duplicates.
    pub fn push(&mut self, kind: &'static str, item: impl Into<String>) {
        let item = item.into();
        if item.is_empty() {
            return;
        }

        let list = match self.entries.iter().position(|(k, _)| *k == kind) {
            Some(idx) => &mut self.entries[idx].1,
            None => {
                self.entries.push((kind, Vec::new()));
                let last = self.entries.len() - 1;
                &mut self.entries[last].1
            }
        };
        if !list.contains(&item) {
            list.push(item);
        }
    }

    /// Scans HTML for image sources and anchor targets.
    pub fn scan_html(&mut self, html: &str) {
        for caps in IMG_SRC.captures_iter(html) {
            self.push(IMAGES, caps[1].trim());
        }
        for caps in ANCHOR_HREF.captures_iter(html) {
            self.push(LINKS, caps[1].trim());
        }
    }

    /// Scans plain text for URLs and email addresses.
    ///
    /// Addresses are recorded as `mailto:` links.
    pub fn scan_text(&mut self, text: &str) {
        for url in URL.find_iter(text) {
            self.push(LINKS, url.as_str());
        }
        for address in EMAIL.find_iter(text) {
            self.push(LINKS, format!("mailto:{}", address.as_str()));
        }
    }

    /// Records an inline image attachment by content id.
    pub fn push_inline_image(&mut self, content_id: &str) {
        self.push(INLINE_IMAGES, format!("cid:{content_id}"));
    }

    /// Returns the collected lists keyed by kind. Empty kinds are absent.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, Vec<String>> {
        self.entries
            .into_iter()
            .map(|(kind, list)| (kind.to_string(), list))
            .collect()
    }
}
