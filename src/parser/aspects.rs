/// Separator between bullets once the block is flattened onto one line.
const BULLET_SEPARATOR: &str = " - ";

/// Split a raw "Key Aspects" block into its bullet texts.
///
/// Accepts nothing at all, one line of concatenated bullets (`- a - b`) or one
/// bullet per line (`- a\n- b`). An aspect whose own text contains `" - "`
/// comes back as two aspects; the source format gives no way to tell them apart.
pub fn tokenize(block: &str) -> Vec<String> {
    let joined = block.lines().collect::<Vec<_>>().join(" ");

    joined
        .split(BULLET_SEPARATOR)
        .map(|token| token.trim_start_matches(['-', ' ']).trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n  ").is_empty());
    }

    #[test]
    fn single_line() {
        assert_eq!(tokenize("- Point 1 - Point 2"), vec!["Point 1", "Point 2"]);
    }

    #[test]
    fn multiline() {
        assert_eq!(
            tokenize("- Point 1\n- Point 2\n- Point 3"),
            vec!["Point 1", "Point 2", "Point 3"]
        );
    }

    #[test]
    fn crlf_and_ragged_whitespace() {
        assert_eq!(
            tokenize("-  First item  \r\n-   Second\r\n"),
            vec!["First item", "Second"]
        );
    }

    #[test]
    fn stray_hyphens_dropped() {
        assert_eq!(tokenize("- - Only one"), vec!["Only one"]);
        assert!(tokenize("-").is_empty());
    }

    #[test]
    fn hyphenated_words_survive() {
        assert_eq!(
            tokenize("- Cross-border rules - Anti-money laundering"),
            vec!["Cross-border rules", "Anti-money laundering"]
        );
    }

    #[test]
    fn separator_inside_aspect_splits_it() {
        assert_eq!(
            tokenize("- Phase 1 - 2025 rollout"),
            vec!["Phase 1", "2025 rollout"]
        );
    }

    #[test]
    fn rejoined_tokens_are_stable() {
        let first = tokenize("- Alpha\n- Beta\n- Gamma");
        let rejoined = format!("- {}", first.join(" - "));
        assert_eq!(tokenize(&rejoined), first);
    }
}
