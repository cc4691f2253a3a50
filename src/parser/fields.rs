use thiserror::Error;

use super::aspects;
use super::Entry;

pub const TITLE: &str = "Title:";
pub const DATE: &str = "Date:";
pub const COUNTRY: &str = "Country:";
pub const SUMMARY: &str = "Summary:";
pub const KEY_ASPECTS: &str = "Key Aspects:";
pub const LINK: &str = "Link:";
pub const AVAILABILITY: &str = "Availability:";

/// Why a segment could not be turned into an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("segment does not start with '{0}'")]
    MissingAnchor(&'static str),

    #[error("expected '{expected}' after '{after}'")]
    MissingLabel {
        after: &'static str,
        expected: &'static str,
    },

    #[error("'{0}' has no value")]
    EmptyField(&'static str),

    #[error("'Key Aspects:' block is not a bullet list")]
    MalformedKeyAspects,
}

/// Ordered-label scanner over one segment.
///
/// Values are captured lazily: a value runs up to the first later occurrence
/// of an expected label that has whitespace directly in front of it.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Consume `label` at the cursor.
    fn expect(&mut self, label: &'static str) -> Result<(), FieldError> {
        if self.rest().starts_with(label) {
            self.pos += label.len();
            Ok(())
        } else {
            Err(FieldError::MissingAnchor(label))
        }
    }

    /// Capture text up to the nearest of `labels`, then consume that label.
    /// Returns the raw value and which label ended it.
    fn take_until(
        &mut self,
        current: &'static str,
        labels: &[&'static str],
    ) -> Result<(&'a str, &'static str), FieldError> {
        let found = labels
            .iter()
            .filter_map(|&label| self.find_label(label).map(|at| (at, label)))
            .min_by_key(|(at, _)| *at);

        match found {
            Some((at, label)) => {
                let value = &self.text[self.pos..at];
                self.pos = at + label.len();
                Ok((value, label))
            }
            None => Err(FieldError::MissingLabel {
                after: current,
                expected: labels[labels.len() - 1],
            }),
        }
    }

    /// Absolute offset of the first `label` after the cursor preceded by whitespace.
    fn find_label(&self, label: &str) -> Option<usize> {
        self.rest()
            .match_indices(label)
            .map(|(i, _)| self.pos + i)
            .find(|&at| {
                self.text[..at]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_whitespace)
                    && at > self.pos
            })
    }

    /// Everything after the cursor.
    fn take_rest(&mut self) -> &'a str {
        let value = self.rest();
        self.pos = self.text.len();
        value
    }
}

fn required(label: &'static str, raw: &str) -> Result<String, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(FieldError::EmptyField(label))
    } else {
        Ok(value.to_string())
    }
}

/// Parse one `Title:`-anchored segment into an entry.
///
/// Field order is fixed: Title, Date, Country, Summary, optional Key Aspects,
/// Link, Availability. Availability runs to the end of the segment.
pub fn parse_segment(segment: &str) -> Result<Entry, FieldError> {
    let mut sc = Scanner::new(segment);
    sc.expect(TITLE)?;

    let (title, _) = sc.take_until(TITLE, &[DATE])?;
    let title = required(TITLE, title)?;

    let (date, _) = sc.take_until(DATE, &[COUNTRY])?;
    let date = required(DATE, date)?;

    let (country, _) = sc.take_until(COUNTRY, &[SUMMARY])?;
    let country = required(COUNTRY, country)?;

    let (summary, next) = sc.take_until(SUMMARY, &[KEY_ASPECTS, LINK])?;
    let summary = required(SUMMARY, summary)?;

    let key_aspects = if next == KEY_ASPECTS {
        let (block, _) = sc.take_until(KEY_ASPECTS, &[LINK])?;
        let block = block.trim();
        if !block.is_empty() && !block.starts_with('-') {
            return Err(FieldError::MalformedKeyAspects);
        }
        aspects::tokenize(block)
    } else {
        Vec::new()
    };

    let (link, _) = sc.take_until(LINK, &[AVAILABILITY])?;
    let link = required(LINK, link)?;

    let availability = required(AVAILABILITY, sc.take_rest())?;

    Ok(Entry {
        title,
        date,
        country,
        summary,
        key_aspects,
        link,
        availability,
    })
}
