//! Plain-text extraction from HTML error pages.
//!
//! Providers return branded HTML pages for credential and rate-limit
//! problems instead of JSON. The page body is flattened to text so the
//! failure detail stays readable in a terminal.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on extracted text carried inside an error message.
const MAX_PAGE_TEXT: usize = 500;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap()
});
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip scripts, styles, and markup; collapse whitespace; truncate.
pub fn page_text(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text = WS_RE.replace_all(&text, " ");
    let text = text.trim();

    if text.len() <= MAX_PAGE_TEXT {
        return text.to_string();
    }
    let mut cut = MAX_PAGE_TEXT;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
