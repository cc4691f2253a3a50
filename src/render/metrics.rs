/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

/// Helvetica-Bold runs slightly wider; close enough for line breaking.
const BOLD_FACTOR: f32 = 1.08;

fn advance(c: char) -> u16 {
    match c as u32 {
        0x20..=0x7E => HELVETICA[(c as u32 - 0x20) as usize],
        0x2022 => 350,
        _ => 556,
    }
}

/// Width of `text` in points.
pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| advance(c) as u32).sum();
    let width = units as f32 * size / 1000.0;
    if bold {
        width * BOLD_FACTOR
    } else {
        width
    }
}

/// Greedy word wrap. `'\n'` forces a break; words wider than the line are
/// split by character.
pub fn wrap(text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for hard_line in text.split('\n') {
        let mut line = String::new();
        for word in hard_line.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if text_width(&candidate, size, bold) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if text_width(word, size, bold) <= max_width {
                line = word.to_string();
            } else {
                let mut pieces = split_long_word(word, size, bold, max_width);
                line = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        lines.push(line);
    }
    lines
}

fn split_long_word(word: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if piece.chars().count() > 1 && text_width(&piece, size, bold) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        }
    }
    pieces.push(piece);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_widths() {
        // "Hello" = 722 + 556 + 222 + 222 + 556
        assert!((text_width("Hello", 10.0, false) - 22.78).abs() < 1e-3);
        assert_eq!(text_width("", 10.0, false), 0.0);
        assert!(text_width("Title", 10.0, true) > text_width("Title", 10.0, false));
    }

    #[test]
    fn short_text_one_line() {
        assert_eq!(wrap("Public", 10.0, false, 100.0), vec!["Public"]);
    }

    #[test]
    fn wraps_on_words() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10.0, false, 80.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 10.0, false) <= 80.0));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn hard_breaks_kept() {
        assert_eq!(wrap("first half\nsecond half", 10.0, false, 500.0), vec!["first half", "second half"]);
        assert_eq!(wrap("\nonly", 10.0, false, 500.0), vec!["", "only"]);
    }

    #[test]
    fn long_url_split() {
        let url = "https://www.example.com/a/very/long/path/that/does/not/fit/anywhere";
        let lines = wrap(url, 10.0, false, 60.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), url);
        assert!(lines.iter().all(|l| text_width(l, 10.0, false) <= 60.0));
    }

    #[test]
    fn empty_text() {
        assert_eq!(wrap("", 10.0, false, 50.0), vec![""]);
    }
}
