//! Newsletter body cleaning.
//!
//! Newsletters carry a lot of text that only adds noise to a prompt: tracking
//! links, subscription footers, sponsor blocks, phone numbers, citation
//! markers and emoji. These are stripped before a document is handed on.

use std::sync::LazyLock;

use regex::Regex;

static URLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Promotional and subscription lines, removed from the keyword to end of line.
static PROMOTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(SIGN UP|ADVERTISE|VIEW ONLINE|GET STARTED HERE|APPLY HERE|TRACK YOUR REFERRALS|SHARE YOUR REFERRAL LINK|MANAGE YOUR SUBSCRIPTIONS|UNSUBSCRIBE)\b.*",
    )
    .unwrap()
});

static SPONSORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(TOGETHER WITH|SPONSORED BY|SPONSOR)\b.*").unwrap());

static PHONE_NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap());

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

static CITATIONS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").unwrap());

static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        r"\x{1F600}-\x{1F64F}", // emoticons
        r"\x{1F300}-\x{1F5FF}", // symbols & pictographs
        r"\x{1F680}-\x{1F6FF}", // transport & map
        r"\x{1F700}-\x{1F77F}",
        r"\x{1F780}-\x{1F7FF}",
        r"\x{1F800}-\x{1F8FF}",
        r"\x{1F900}-\x{1F9FF}",
        r"\x{1FA00}-\x{1FA6F}",
        r"\x{1FA70}-\x{1FAFF}",
        r"\x{2702}-\x{27B0}", // dingbats
        r"\x{FE0F}",          // variation selector left behind by emoji
        "]+",
    ))
    .unwrap()
});

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static STYLE_BLOCKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(style|script)[^>]*>.*?</(style|script)>").unwrap());

pub fn remove_emojis(text: &str) -> String {
    EMOJI.replace_all(text, "").into_owned()
}

/// Remove markup tags, keeping the text between them. Style and script
/// blocks are dropped entirely.
pub fn strip_markup(text: &str) -> String {
    let text = STYLE_BLOCKS.replace_all(text, "");
    TAGS.replace_all(&text, " ").into_owned()
}

/// Clean a raw newsletter body for use in a prompt.
pub fn clean_newsletter_body(text: &str) -> String {
    let text = remove_emojis(text);
    let text = URLS.replace_all(&text, "");
    let text = PROMOTIONS.replace_all(&text, "");
    let text = SPONSORS.replace_all(&text, "");
    let text = PHONE_NUMBERS.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n");
    let text = CITATIONS.replace_all(&text, "");
    text.trim().to_string()
}
