use once_cell::sync::Lazy;
use regex::Regex;

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex is hardcoded and valid"));

static WHITESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is hardcoded and valid"));

/// 去除 HTML 標籤、解碼實體並壓縮空白
pub fn clean_html_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let stripped = TAG_PATTERN.replace_all(text, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    WHITESPACE_PATTERN
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

/// Keeps letters and digits only; OCR punctuation and spacing is never trusted.
pub fn letters_and_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}
