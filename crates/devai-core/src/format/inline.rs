//! Inline runs: bold spans and links.

use super::segment::Inline;
use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex is valid"));

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Sumber:?\s*)?(https?://\S+)").expect("link regex is valid"));

/// Whether `text` holds at least one closed `**...**` span.
pub(crate) fn has_bold(text: &str) -> bool {
    BOLD.is_match(text)
}

/// Splits `text` into alternating plain and bold runs, with links lifted out
/// of the plain runs. An unclosed `**` stays literal.
pub(crate) fn parse_inline(text: &str) -> Vec<Inline> {
    let mut runs = Vec::new();
    let mut cursor = 0;
    for caps in BOLD.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_plain(&mut runs, &text[cursor..whole.start()]);
        runs.push(Inline::bold(inner.as_str()));
        cursor = whole.end();
    }
    push_plain(&mut runs, &text[cursor..]);
    runs
}

fn push_plain(runs: &mut Vec<Inline>, text: &str) {
    let mut cursor = 0;
    for caps in LINK.captures_iter(text) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if whole.start() > cursor {
            runs.push(Inline::text(&text[cursor..whole.start()]));
        }
        runs.push(Inline::Link {
            prefix: caps.get(1).map(|p| p.as_str().to_string()),
            url: url.as_str().to_string(),
        });
        cursor = whole.end();
    }
    if cursor < text.len() {
        runs.push(Inline::text(&text[cursor..]));
    }
}
