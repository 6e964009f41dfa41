//! Terminal rendering of formatted answers.

use colored::Colorize;
use devai_core::format::{DisplaySegment, Inline, ProductRecord, format};

/// Formats an answer and renders it for the terminal.
pub fn render_answer(text: &str) -> String {
    render_segments(&format(text))
}

/// Renders segments in order, one block per segment. Consecutive list items
/// stay together; other blocks are separated by a blank line.
pub fn render_segments(segments: &[DisplaySegment]) -> String {
    let mut out = String::new();
    let mut previous_was_item = false;

    for segment in segments {
        let is_item = matches!(
            segment,
            DisplaySegment::ListItem { .. } | DisplaySegment::Product { .. }
        );
        if !out.is_empty() {
            out.push_str(if is_item && previous_was_item { "\n" } else { "\n\n" });
        }
        out.push_str(&render_segment(segment));
        previous_was_item = is_item;
    }
    out
}

fn render_segment(segment: &DisplaySegment) -> String {
    match segment {
        DisplaySegment::Paragraph { text } => text.bright_blue().to_string(),
        DisplaySegment::Rich { runs } => render_runs(runs),
        DisplaySegment::ListItem { number: Some(n), runs } => {
            format!("{} {}", format!("{}.", n).bright_black(), render_runs(runs))
        }
        DisplaySegment::ListItem { number: None, runs } => render_runs(runs),
        DisplaySegment::Product { number, record } => render_product(*number, record),
    }
}

fn render_runs(runs: &[Inline]) -> String {
    runs.iter()
        .map(|run| match run {
            Inline::Text { text } => text.bright_blue().to_string(),
            Inline::Bold { text } => text.bright_blue().bold().to_string(),
            Inline::Link { prefix, url } => format!(
                "{}{}",
                prefix.as_deref().unwrap_or_default().bright_black(),
                url.cyan().underline()
            ),
        })
        .collect()
}

fn render_product(number: u64, record: &ProductRecord) -> String {
    let mut lines = vec![format!(
        "{} {}",
        format!("{}.", number).bright_black(),
        record.title.bright_blue().bold()
    )];
    if let Some(spec) = &record.spec {
        lines.push(format!("   {} {}", "Spesifikasi:".bright_black(), spec));
    }

    let mut badges = Vec::new();
    if let Some(quantity) = &record.quantity {
        let unit = if quantity.chars().all(|c| c.is_ascii_digit()) {
            " unit"
        } else {
            ""
        };
        badges.push(format!("Stok: {}{}", quantity, unit).green().to_string());
    }
    if let Some(location) = &record.location {
        badges.push(format!("Lokasi: {}", location).yellow().to_string());
    }
    if !badges.is_empty() {
        lines.push(format!("   {}", badges.join("  ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> String {
        colored::control::set_override(false);
        render_answer(text)
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        assert_eq!(plain("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_list_items_stay_together() {
        assert_eq!(plain("1. Foo\n2. Bar"), "1. Foo\n2. Bar");
    }

    #[test]
    fn test_product_card() {
        let rendered =
            plain("1. Widget: **Super Widget**\nSpecifications: 5kg\nStok: 3\nLokasi: Gudang A");
        assert_eq!(
            rendered,
            "1. Super Widget\n   Spesifikasi: 5kg\n   Stok: 3 unit  Lokasi: Gudang A"
        );
    }

    #[test]
    fn test_link_keeps_prefix() {
        let rendered = plain("See **this** Sumber: https://example.com/a");
        assert!(rendered.contains("Sumber: https://example.com/a"));
        assert!(rendered.starts_with("See this"));
    }
}
