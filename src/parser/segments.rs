use tracing::debug;

use super::fields::TITLE;

/// Split flattened document text into entry segments.
///
/// Each segment starts at a literal `Title:`; text before the first one is
/// preamble and gets dropped. Blank segments are skipped.
pub fn split_segments(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = text.match_indices(TITLE).map(|(i, _)| i).collect();

    let Some(&first) = starts.first() else {
        if !text.trim().is_empty() {
            debug!("No '{}' anchor found, {} chars of preamble ignored", TITLE, text.len());
        }
        return Vec::new();
    };

    let preamble = text[..first].trim();
    if !preamble.is_empty() {
        debug!("Discarding {} chars of preamble", preamble.len());
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            text[start..end].trim()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_anchor() {
        assert!(split_segments("").is_empty());
        assert!(split_segments("Just some notes about nothing").is_empty());
    }

    #[test]
    fn preamble_dropped() {
        let segs = split_segments("Weekly digest Title: A Date: x Title: B Date: y");
        assert_eq!(segs, vec!["Title: A Date: x", "Title: B Date: y"]);
    }

    #[test]
    fn anchor_at_start() {
        let segs = split_segments("Title: Only one");
        assert_eq!(segs, vec!["Title: Only one"]);
    }

    #[test]
    fn anchor_inside_word_still_splits() {
        // Literal match, no word boundary check
        let segs = split_segments("Title: A Subtitle: B");
        assert_eq!(segs, vec!["Title: A Sub", "Title: B"]);
    }
}
