pub mod aspects;
pub mod fields;
pub mod segments;

use serde::Serialize;
use tracing::{debug, info, warn};

pub use fields::FieldError;

/// One fully parsed report item. Every text field is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub title: String,
    pub date: String,
    pub country: String,
    pub summary: String,
    pub key_aspects: Vec<String>,
    pub link: String,
    pub availability: String,
}

/// A segment that failed the field grammar.
#[derive(Debug, Clone)]
pub struct Rejected {
    /// 1-based position among the document's segments.
    pub segment: usize,
    pub error: FieldError,
}

pub struct Extraction {
    pub entries: Vec<Entry>,
    pub rejected: Vec<Rejected>,
}

/// Two-pass pipeline: flattened text → segments → entries.
///
/// Malformed segments are dropped with a warning; the rest keep source order.
pub fn extract_entries(text: &str) -> Extraction {
    let segments = segments::split_segments(text);
    info!("Found {} candidate entries ({} chars of text)", segments.len(), text.len());

    let mut entries = Vec::with_capacity(segments.len());
    let mut rejected = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        match fields::parse_segment(segment) {
            Ok(entry) => {
                debug!("Entry #{} parsed: {}", i + 1, preview(&entry.title, 50));
                entries.push(entry);
            }
            Err(error) => {
                warn!("Entry #{} skipped: {}", i + 1, error);
                warn!("  Text: {}", preview(segment, 100));
                rejected.push(Rejected {
                    segment: i + 1,
                    error,
                });
            }
        }
    }

    info!("Parsed {} entries, {} skipped", entries.len(), rejected.len());
    Extraction { entries, rejected }
}

fn preview(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

// ── Tests ──
