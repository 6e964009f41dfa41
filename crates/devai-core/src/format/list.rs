//! Numbered-list paragraphs and product records.

use super::inline::parse_inline;
use super::segment::{DisplaySegment, Inline, ProductRecord};
use once_cell::sync::Lazy;
use regex::Regex;

static LIST_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s").expect("list start regex is valid"));

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.\s+(.+)$").expect("numbered line regex is valid"));

static PRODUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?):\s*\*\*(.+?)\*\*(.*)$").expect("product regex is valid")
});

// Longer labels first so "Available Quantity" wins over "Quantity".
static FIELD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(specifications?|spesifikasi|available quantity|quantity|stok|jumlah|location|lokasi)\s*:",
    )
    .expect("field label regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Spec,
    Quantity,
    Location,
}

impl Field {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "specification" | "specifications" | "spesifikasi" => Self::Spec,
            "location" | "lokasi" => Self::Location,
            _ => Self::Quantity,
        }
    }
}

/// A paragraph is a list when its first line carries `<int>. ` numbering.
pub(crate) fn is_list(paragraph: &str) -> bool {
    LIST_START.is_match(paragraph)
}

/// Parses a list paragraph line by line.
///
/// Field lines (`Stok: 3`) directly after a product item are folded into that
/// record; any other line without well-formed numbering becomes an unnumbered
/// item holding the raw line.
pub(crate) fn parse_list(paragraph: &str) -> Vec<DisplaySegment> {
    let mut segments: Vec<DisplaySegment> = Vec::new();

    for line in paragraph.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let numbered = NUMBERED_LINE
            .captures(line)
            .and_then(|caps| Some((caps[1].parse::<u64>().ok()?, caps.get(2)?.as_str())));
        if let Some((number, content)) = numbered {
            let segment = match parse_product(content) {
                Some(record) => DisplaySegment::Product { number, record },
                None => DisplaySegment::ListItem {
                    number: Some(number),
                    runs: parse_inline(content),
                },
            };
            segments.push(segment);
            continue;
        }

        if starts_with_field(line) {
            if let Some(DisplaySegment::Product { record, .. }) = segments.last_mut() {
                apply_fields(record, line);
                continue;
            }
        }

        segments.push(DisplaySegment::ListItem {
            number: None,
            runs: vec![Inline::text(line)],
        });
    }

    segments
}

fn parse_product(content: &str) -> Option<ProductRecord> {
    let caps = PRODUCT.captures(content)?;
    let mut record = ProductRecord {
        label: caps[1].trim().to_string(),
        title: caps[2].trim().to_string(),
        ..ProductRecord::default()
    };
    apply_fields(&mut record, &caps[3]);
    Some(record)
}

fn starts_with_field(line: &str) -> bool {
    FIELD_LABEL.find(line).is_some_and(|m| m.start() == 0)
}

/// Reads every `Label: value` pair in `text`. A value runs until the next
/// label; the first occurrence of a field wins.
fn apply_fields(record: &mut ProductRecord, text: &str) {
    let labels: Vec<_> = FIELD_LABEL.captures_iter(text).collect();
    for (i, caps) in labels.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = labels
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let value = text[whole.end()..end]
            .trim()
            .trim_end_matches([',', ';'])
            .trim();
        if value.is_empty() {
            continue;
        }
        let slot = match Field::from_label(label.as_str()) {
            Field::Spec => &mut record.spec,
            Field::Quantity => &mut record.quantity,
            Field::Location => &mut record.location,
        };
        slot.get_or_insert_with(|| value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_on_the_item_line() {
        let segments =
            parse_list("1. Item: **Drill** Spesifikasi: 18V, Available Quantity: 12, Lokasi: Rak 4");
        let DisplaySegment::Product { number, record } = &segments[0] else {
            panic!("expected product, got {segments:?}");
        };
        assert_eq!(*number, 1);
        assert_eq!(record.label, "Item");
        assert_eq!(record.spec.as_deref(), Some("18V"));
        assert_eq!(record.quantity.as_deref(), Some("12"));
        assert_eq!(record.location.as_deref(), Some("Rak 4"));
    }

    #[test]
    fn test_field_line_without_product_is_raw_item() {
        let segments = parse_list("1. Plain item\nStok: 3");
        assert_eq!(
            segments[1],
            DisplaySegment::ListItem {
                number: None,
                runs: vec![Inline::text("Stok: 3")],
            }
        );
    }

    #[test]
    fn test_bold_inside_plain_item() {
        let segments = parse_list("1. use the **blue** cable");
        assert_eq!(
            segments[0],
            DisplaySegment::ListItem {
                number: Some(1),
                runs: vec![
                    Inline::text("use the "),
                    Inline::bold("blue"),
                    Inline::text(" cable"),
                ],
            }
        );
    }

    #[test]
    fn test_huge_number_degrades_to_unnumbered() {
        let segments = parse_list("99999999999999999999999. overflow");
        assert_eq!(
            segments[0],
            DisplaySegment::ListItem {
                number: None,
                runs: vec![Inline::text("99999999999999999999999. overflow")],
            }
        );
    }
}
