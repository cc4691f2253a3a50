use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 8-bit RGB colour, written as `"RRGGBB"` in style files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xFF, 0xFF, 0xFF);

    /// Mix toward `other`; `amount` 0.0 keeps `self`, 1.0 gives `other`.
    pub fn blend(self, other: Rgb, amount: f32) -> Rgb {
        let t = amount.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    /// Components scaled to 0.0..=1.0.
    pub fn unit(self) -> [f32; 3] {
        [self.0 as f32 / 255.0, self.1 as f32 / 255.0, self.2 as f32 / 255.0]
    }

    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{}', expected RRGGBB", s));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> String {
        c.hex()
    }
}

pub const FONT_FAMILY: &str = "Helvetica";

/// Visual settings shared by the card builder and every renderer.
///
/// Lengths are in points. Built once per run and only ever borrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Label background and border colour.
    pub accent: Rgb,
    /// How far value backgrounds move from the accent toward white.
    pub tint_amount: f32,
    pub border_width: f32,
    /// Border alpha where the format supports it; otherwise mixed into a solid tint.
    pub border_opacity: f32,
    /// Only Helvetica: the PDF backend draws with the base-14 Helvetica
    /// faces and wraps text using their metrics.
    pub font_family: String,
    pub font_size: f32,
    pub leading: f32,
    pub summary_leading: f32,
    pub cell_padding_x: f32,
    pub cell_padding_y: f32,
    pub column_widths: [f32; 6],
    /// Minimum height of the Title, Link and Availability rows.
    pub row_height: f32,
    pub flag_width: f32,
    /// Height of non-square flags (about 5:3 with the default width).
    pub flag_wide_height: f32,
    pub page_width: f32,
    pub page_height: f32,
    pub page_margin: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            accent: Rgb(0xAD, 0xD8, 0xE6),
            tint_amount: 0.6,
            border_width: 0.5,
            border_opacity: 0.5,
            font_family: FONT_FAMILY.to_string(),
            font_size: 10.0,
            leading: 12.0,
            summary_leading: 16.0,
            cell_padding_x: 6.0,
            cell_padding_y: 3.0,
            column_widths: [72.0, 180.0, 57.6, 72.0, 57.6, 72.0],
            row_height: 42.0,
            flag_width: 36.0,
            flag_wide_height: 21.6,
            // A4
            page_width: 595.28,
            page_height: 841.89,
            page_margin: 36.0,
        }
    }
}

impl StyleConfig {
    /// Defaults, overridden by a JSON style file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read style file {}", path.display()))?;
        let style: StyleConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid style file {}", path.display()))?;
        style.validate()?;
        info!("Loaded style from {}", path.display());
        Ok(style)
    }

    fn validate(&self) -> Result<()> {
        if !self.font_family.eq_ignore_ascii_case(FONT_FAMILY) {
            bail!(
                "font_family {:?} is not supported; both formats use {}",
                self.font_family,
                FONT_FAMILY
            );
        }
        if self.column_widths.iter().any(|w| *w <= 0.0) {
            bail!("column widths must be positive");
        }
        if self.font_size <= 0.0 || self.leading <= 0.0 || self.summary_leading <= 0.0 {
            bail!("font size and leading must be positive");
        }
        if !(0.0..=1.0).contains(&self.border_opacity) || !(0.0..=1.0).contains(&self.tint_amount) {
            bail!("border_opacity and tint_amount must be within 0..1");
        }
        let table_width: f32 = self.column_widths.iter().sum();
        if table_width > self.page_width - 2.0 * self.page_margin {
            bail!(
                "table width {:.1}pt does not fit the page ({:.1}pt between margins)",
                table_width,
                self.page_width - 2.0 * self.page_margin
            );
        }
        Ok(())
    }

    /// Value and image cell background.
    pub fn tint(&self) -> Rgb {
        self.accent.blend(Rgb::WHITE, self.tint_amount)
    }

    /// Solid stand-in for the translucent border on an opaque format.
    pub fn border_solid(&self) -> Rgb {
        self.accent.blend(Rgb::WHITE, 1.0 - self.border_opacity)
    }

    pub fn table_width(&self) -> f32 {
        self.column_widths.iter().sum()
    }
}
