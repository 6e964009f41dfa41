//! Display segment types produced by the formatter.

use serde::{Deserialize, Serialize};

/// A run of inline content inside a paragraph or list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Bold { text: String },
    /// A clickable URL, optionally introduced by a `Sumber:` prefix.
    Link { prefix: Option<String>, url: String },
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::Bold { text: text.into() }
    }

    /// The visible characters of this run.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Text { text } | Self::Bold { text } => text.clone(),
            Self::Link { prefix, url } => {
                format!("{}{}", prefix.as_deref().unwrap_or_default(), url)
            }
        }
    }
}

/// Catalog-style answer item: `<label>: **<title>**` plus optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductRecord {
    pub label: String,
    pub title: String,
    pub spec: Option<String>,
    pub quantity: Option<String>,
    pub location: Option<String>,
}

/// One renderable unit of an answer, in original order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplaySegment {
    /// A paragraph emitted verbatim.
    Paragraph { text: String },
    /// A paragraph with bold spans and links.
    Rich { runs: Vec<Inline> },
    /// A numbered list line. `number` is `None` when the line did not carry
    /// well-formed numbering; `runs` then holds the raw line.
    ListItem { number: Option<u64>, runs: Vec<Inline> },
    Product { number: u64, record: ProductRecord },
}

impl DisplaySegment {
    /// Concatenated visible text, ignoring styling.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Paragraph { text } => text.clone(),
            Self::Rich { runs } | Self::ListItem { runs, .. } => {
                runs.iter().map(Inline::plain_text).collect()
            }
            Self::Product { record, .. } => record.title.clone(),
        }
    }
}
