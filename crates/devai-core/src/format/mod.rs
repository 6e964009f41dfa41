//! Message formatter.
//!
//! Turns raw answer text into an ordered sequence of [`DisplaySegment`]s
//! without a full markdown parser. Paragraphs are separated by blank lines
//! and classified independently:
//!
//! - a paragraph whose first line starts with `<int>. ` is a numbered list;
//!   items shaped like `<label>: **<title>**` become product records
//! - a paragraph holding a closed `**...**` span becomes bold/plain/link runs
//! - anything else is emitted verbatim
//!
//! [`format`] is pure and never fails; unrecognized input degrades to plain
//! paragraphs.

mod inline;
mod list;
mod segment;

pub use segment::{DisplaySegment, Inline, ProductRecord};

use once_cell::sync::Lazy;
use regex::Regex;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph break regex is valid"));

/// Parses answer text into display segments, preserving paragraph order.
pub fn format(text: &str) -> Vec<DisplaySegment> {
    let normalized = text.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for paragraph in PARAGRAPH_BREAK.split(&normalized) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if list::is_list(paragraph) {
            segments.extend(list::parse_list(paragraph));
        } else if inline::has_bold(paragraph) {
            segments.push(DisplaySegment::Rich {
                runs: inline::parse_inline(paragraph),
            });
        } else {
            segments.push(DisplaySegment::Paragraph {
                text: paragraph.to_string(),
            });
        }
    }

    segments
}
