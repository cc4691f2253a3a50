pub mod docx;
pub mod metrics;
pub mod pdf;

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;
use tracing::{info, warn};

use crate::card::{Card, FlagImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Docx,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }
}

pub trait WriteSeek: Write + Seek {}

impl<T: Write + Seek> WriteSeek for T {}

/// An output backend. Every backend draws the same cards the same way;
/// only the file format differs.
pub trait Renderer {
    fn format(&self) -> OutputFormat;

    /// Write all cards, in order, one per page.
    fn render(&self, cards: &[Card], out: &mut dyn WriteSeek) -> Result<()>;
}

/// Force the extension to match the output format.
pub fn normalize_output_path(path: &Path, format: OutputFormat) -> PathBuf {
    let ext = format.extension();
    let matches = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));
    if matches {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}

/// Render into a temporary file next to `path`, then move it into place.
///
/// The destination is only replaced once rendering has fully succeeded.
pub fn write_artifact(path: &Path, renderer: &dyn Renderer, cards: &[Card]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create a file in {}", dir.display()))?;

    renderer.render(cards, tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        "Saved {} card(s) as {} to {}",
        cards.len(),
        renderer.format().extension(),
        path.display()
    );
    Ok(())
}

/// Decode a flag image, or `None` (logged) so the caller can fall back to text.
pub fn load_flag(flag: &FlagImage) -> Option<DynamicImage> {
    match image::open(&flag.path) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Error loading flag image {}: {}", flag.path.display(), e);
            None
        }
    }
}
