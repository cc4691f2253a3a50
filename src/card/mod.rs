pub mod flags;

use std::path::PathBuf;

use crate::parser::Entry;
use crate::style::StyleConfig;
use flags::{FlagResolver, FlagShape};

pub const COLUMNS: usize = 6;
pub const ROWS: usize = 4;

/// Titles longer than this (in characters) are broken onto two lines.
pub const TITLE_WRAP_CHARS: usize = 40;
pub const KEY_ASPECTS_LABEL: &str = "Key Aspects:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Field name: bold, centred, accent background.
    Label,
    Value,
    /// Country value: a flag when one is available, else the name.
    ImageOrText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Accent,
    Tint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Plain text; `'\n'` is a hard line break.
    Text(String),
    Spacer,
    /// Bold heading inside a value cell.
    SubLabel(String),
    Bullets(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagImage {
    pub path: PathBuf,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Blocks(Vec<Block>),
    /// Renderers fall back to `fallback` text if the image cannot be loaded.
    Image { flag: FlagImage, fallback: String },
}

impl Content {
    fn text(text: impl Into<String>) -> Self {
        Content::Blocks(vec![Block::Text(text.into())])
    }

    /// Visible text, one line per text line or bullet. Empty for images.
    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        let Content::Blocks(blocks) = self else {
            return String::new();
        };
        let mut lines = Vec::new();
        for block in blocks {
            match block {
                Block::Text(t) => lines.push(t.clone()),
                Block::Spacer => lines.push(String::new()),
                Block::SubLabel(t) => lines.push(t.clone()),
                Block::Bullets(items) => lines.extend(items.iter().cloned()),
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub col_span: usize,
    pub role: Role,
    pub tone: Tone,
    /// Horizontal alignment of text lines; images are always centred.
    pub align: Align,
    /// Line pitch in points.
    pub leading: f32,
    pub content: Content,
}

impl Cell {
    pub fn is_bold(&self) -> bool {
        self.role == Role::Label
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowHeight {
    /// Fixed height; grows only if the content cannot fit.
    AtLeast(f32),
    /// Sized to the content.
    Intrinsic,
}

/// Backend-agnostic layout of one entry: a 6 × 4 grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub cells: Vec<Cell>,
    pub column_widths: [f32; COLUMNS],
    pub row_heights: [RowHeight; ROWS],
}

impl Card {
    /// Cells of one row, left to right.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(move |c| c.row == row)
    }

    /// The cell covering grid position (`row`, `col`), merges included.
    #[cfg(test)]
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        self.row(row)
            .find(|c| (c.col..c.col + c.col_span).contains(&col))
    }

    /// Left edge of `col` relative to the table, in points.
    pub fn column_offset(&self, col: usize) -> f32 {
        self.column_widths[..col].iter().sum()
    }

    /// Width of a cell spanning `span` columns from `col`.
    pub fn span_width(&self, col: usize, span: usize) -> f32 {
        self.column_widths[col..col + span].iter().sum()
    }
}

/// Break a long title onto two lines at the middle word.
///
/// A single-word title over the limit comes back with an empty first line.
pub fn wrap_title(title: &str) -> String {
    if title.chars().count() <= TITLE_WRAP_CHARS {
        return title.to_string();
    }
    let words: Vec<&str> = title.split_whitespace().collect();
    let mid = words.len() / 2;
    format!("{}\n{}", words[..mid].join(" "), words[mid..].join(" "))
}

/// Lay out one entry.
pub fn build_card(entry: &Entry, flags: &dyn FlagResolver, style: &StyleConfig) -> Card {
    let label = |row, col, text: &str| Cell {
        row,
        col,
        col_span: 1,
        role: Role::Label,
        tone: Tone::Accent,
        align: Align::Center,
        leading: style.leading,
        content: Content::text(text),
    };
    let value = |row, col, col_span, content| Cell {
        row,
        col,
        col_span,
        role: Role::Value,
        tone: Tone::Tint,
        align: Align::Left,
        leading: style.leading,
        content,
    };

    let country = Cell {
        role: Role::ImageOrText,
        align: Align::Center,
        ..value(0, 5, 1, country_content(entry, flags, style))
    };

    let mut summary = vec![Block::Text(entry.summary.clone())];
    if !entry.key_aspects.is_empty() {
        summary.push(Block::Spacer);
        summary.push(Block::SubLabel(KEY_ASPECTS_LABEL.to_string()));
        summary.push(Block::Bullets(entry.key_aspects.clone()));
    }

    let cells = vec![
        label(0, 0, "Title"),
        value(0, 1, 1, Content::text(wrap_title(&entry.title))),
        label(0, 2, "Date"),
        Cell {
            align: Align::Center,
            ..value(0, 3, 1, Content::text(entry.date.as_str()))
        },
        label(0, 4, "Country"),
        country,
        label(1, 0, "Summary"),
        Cell {
            leading: style.summary_leading,
            ..value(1, 1, 5, Content::Blocks(summary))
        },
        label(2, 0, "Link"),
        value(2, 1, 5, Content::text(entry.link.as_str())),
        label(3, 0, "Availability"),
        value(3, 1, 5, Content::text(entry.availability.as_str())),
    ];

    let fixed = RowHeight::AtLeast(style.row_height);
    Card {
        cells,
        column_widths: style.column_widths,
        row_heights: [fixed, RowHeight::Intrinsic, fixed, fixed],
    }
}

fn country_content(entry: &Entry, flags: &dyn FlagResolver, style: &StyleConfig) -> Content {
    match flags.resolve(&entry.country) {
        Some(asset) => {
            let height = match asset.shape {
                FlagShape::Square => style.flag_width,
                FlagShape::Wide => style.flag_wide_height,
            };
            Content::Image {
                flag: FlagImage {
                    path: asset.path,
                    width: style.flag_width,
                    height,
                },
                fallback: entry.country.clone(),
            }
        }
        None => Content::text(entry.country.as_str()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::flags::{FlagAsset, NoFlags};
    use super::*;

    pub(crate) fn sample_entry() -> Entry {
        Entry {
            title: "Test Entry".to_string(),
            date: "2024-01-01".to_string(),
            country: "Testland".to_string(),
            summary: "This is a summary.".to_string(),
            key_aspects: vec!["Aspect 1".to_string(), "Aspect 2".to_string()],
            link: "http://example.com".to_string(),
            availability: "Public".to_string(),
        }
    }

    /// Resolves every country to the same path without touching the disk.
    pub(crate) struct FixedFlag(pub PathBuf, pub FlagShape);

    impl FlagResolver for FixedFlag {
        fn resolve(&self, _country: &str) -> Option<FlagAsset> {
            Some(FlagAsset {
                path: self.0.clone(),
                shape: self.1,
            })
        }
    }

    #[test]
    fn short_title_single_line() {
        let t = "Exactly forty characters long, no wrap!!";
        assert_eq!(t.chars().count(), 40);
        assert_eq!(wrap_title(t), t);
    }

    #[test]
    fn long_title_two_lines() {
        let t = "European Commission adopts delegated act on sustainability";
        let wrapped = wrap_title(t);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(lines, vec!["European Commission adopts", "delegated act on sustainability"]);
    }

    #[test]
    fn odd_word_count_puts_extra_word_second() {
        let t = "one two three four five six seven eight nine";
        assert!(t.len() > 40);
        assert_eq!(wrap_title(t), "one two three four\nfive six seven eight nine");
    }

    #[test]
    fn long_single_word_title() {
        let t = "x".repeat(45);
        assert_eq!(wrap_title(&t), format!("\n{}", t));
    }

    #[test]
    fn grid_shape() {
        let card = build_card(&sample_entry(), &NoFlags, &StyleConfig::default());
        assert_eq!(card.cells.len(), 12);
        assert_eq!(card.row(0).count(), 6);
        for row in 1..ROWS {
            let cells: Vec<&Cell> = card.row(row).collect();
            assert_eq!(cells.len(), 2);
            assert_eq!((cells[0].col, cells[0].role), (0, Role::Label));
            assert_eq!((cells[1].col, cells[1].col_span), (1, 5));
        }
        for row in 0..ROWS {
            let covered: usize = card.row(row).map(|c| c.col_span).sum();
            assert_eq!(covered, COLUMNS);
        }
    }

    #[test]
    fn merged_value_is_shared() {
        let card = build_card(&sample_entry(), &NoFlags, &StyleConfig::default());
        for row in 1..ROWS {
            let first = card.cell_at(row, 1).unwrap();
            for col in 2..COLUMNS {
                assert_eq!(card.cell_at(row, col).unwrap(), first);
            }
        }
    }

    #[test]
    fn labels_bold_with_accent() {
        let card = build_card(&sample_entry(), &NoFlags, &StyleConfig::default());
        let labels: Vec<String> = card
            .cells
            .iter()
            .filter(|c| c.role == Role::Label)
            .map(|c| {
                assert!(c.is_bold());
                assert_eq!(c.tone, Tone::Accent);
                c.content.plain_text()
            })
            .collect();
        assert_eq!(labels, vec!["Title", "Date", "Country", "Summary", "Link", "Availability"]);
        assert!(card
            .cells
            .iter()
            .filter(|c| c.role != Role::Label)
            .all(|c| c.tone == Tone::Tint && !c.is_bold()));
    }

    #[test]
    fn summary_with_key_aspects() {
        let card = build_card(&sample_entry(), &NoFlags, &StyleConfig::default());
        let summary = card.cell_at(1, 1).unwrap();
        assert_eq!(
            summary.content,
            Content::Blocks(vec![
                Block::Text("This is a summary.".to_string()),
                Block::Spacer,
                Block::SubLabel("Key Aspects:".to_string()),
                Block::Bullets(vec!["Aspect 1".to_string(), "Aspect 2".to_string()]),
            ])
        );
        assert_eq!(summary.leading, StyleConfig::default().summary_leading);
    }

    #[test]
    fn summary_without_key_aspects() {
        let entry = Entry {
            key_aspects: Vec::new(),
            ..sample_entry()
        };
        let card = build_card(&entry, &NoFlags, &StyleConfig::default());
        let summary = card.cell_at(1, 3).unwrap();
        assert_eq!(summary.content, Content::text("This is a summary."));
        assert!(!summary.content.plain_text().contains(KEY_ASPECTS_LABEL));
    }

    #[test]
    fn country_text_without_flag() {
        let card = build_card(&sample_entry(), &NoFlags, &StyleConfig::default());
        let country = card.cell_at(0, 5).unwrap();
        assert_eq!(country.role, Role::ImageOrText);
        assert_eq!(country.content.plain_text(), "Testland");
    }

    #[test]
    fn flag_box_by_shape() {
        let style = StyleConfig::default();
        let wide = build_card(&sample_entry(), &FixedFlag("f.png".into(), FlagShape::Wide), &style);
        let Content::Image { flag, fallback } = &wide.cell_at(0, 5).unwrap().content else {
            panic!("expected an image cell");
        };
        assert_eq!((flag.width, flag.height), (36.0, 21.6));
        assert_eq!(fallback, "Testland");

        let square = build_card(&sample_entry(), &FixedFlag("f.png".into(), FlagShape::Square), &style);
        let Content::Image { flag, .. } = &square.cell_at(0, 5).unwrap().content else {
            panic!("expected an image cell");
        };
        assert_eq!(flag.width, flag.height);
    }

    #[test]
    fn date_and_country_centred() {
        let card = build_card(&sample_entry(), &NoFlags, &StyleConfig::default());
        let align = |row, col| card.cell_at(row, col).unwrap().align;
        assert_eq!(align(0, 3), Align::Center);
        assert_eq!(align(0, 5), Align::Center);
        assert_eq!(align(0, 0), Align::Center);
        for (row, col) in [(0, 1), (1, 1), (2, 1), (3, 1)] {
            assert_eq!(align(row, col), Align::Left, "({}, {})", row, col);
        }
    }

    #[test]
    fn row_sizing() {
        let style = StyleConfig::default();
        let card = build_card(&sample_entry(), &NoFlags, &style);
        assert_eq!(card.row_heights[1], RowHeight::Intrinsic);
        for r in [0, 2, 3] {
            assert_eq!(card.row_heights[r], RowHeight::AtLeast(42.0));
        }
        assert_eq!(card.column_offset(2), 252.0);
        assert_eq!(card.span_width(1, 5), card.column_widths[1..].iter().sum::<f32>());
    }

    #[test]
    fn long_title_in_cell() {
        let entry = Entry {
            title: "Financial Conduct Authority publishes final rules on consumer duty".to_string(),
            ..sample_entry()
        };
        let card = build_card(&entry, &NoFlags, &StyleConfig::default());
        assert_eq!(card.cell_at(0, 1).unwrap().content.plain_text().lines().count(), 2);
    }
}
