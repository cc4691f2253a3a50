mod card;
mod parser;
mod render;
mod source;
mod style;

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use card::flags::FlagTable;
use card::Card;
use render::docx::DocxRenderer;
use render::pdf::PdfRenderer;
use render::{OutputFormat, Renderer};
use style::StyleConfig;

#[derive(Parser)]
#[command(
    name = "report_cards",
    about = "Render regulatory digest entries as report-card tables (PDF or Word)"
)]
struct Cli {
    /// Source document (.docx, or plain text)
    input: PathBuf,

    /// Output file; the extension follows the selected format
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Write an editable Word document instead of a PDF
    #[arg(short, long)]
    word: bool,

    /// Directory containing flags/<country>.png
    #[arg(long, env = "REPORT_FLAGS_DIR", default_value = ".")]
    flags_dir: PathBuf,

    /// JSON file overriding the default table style
    #[arg(long)]
    style: Option<PathBuf>,

    /// Print parsed entries as JSON and exit
    #[arg(long)]
    dump_entries: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let paragraphs = source::read_paragraphs(&cli.input)?;
    let text = source::flatten(&paragraphs);
    let extraction = parser::extract_entries(&text);

    if cli.dump_entries {
        println!("{}", entries_json(&extraction.entries)?);
        return Ok(());
    }

    let style = StyleConfig::load(cli.style.as_deref())?;
    let flags = FlagTable::new(&cli.flags_dir);
    info!(
        "Using {} {}pt, flags from {}",
        style.font_family,
        style.font_size,
        flags.root().display()
    );

    let cards = build_cards(&extraction.entries, &flags, &style)?;

    let renderer: Box<dyn Renderer> = if cli.word {
        Box::new(DocxRenderer::new(style))
    } else {
        Box::new(PdfRenderer::new(style))
    };
    let format: OutputFormat = renderer.format();
    let output = render::normalize_output_path(&cli.output, format);
    if output != cli.output {
        info!("Writing {} instead of {}", output.display(), cli.output.display());
    }
    render::write_artifact(&output, renderer.as_ref(), &cards)?;

    println!(
        "Rendered {} entries ({} skipped) to {}",
        cards.len(),
        extraction.rejected.len(),
        output.display()
    );
    for line in skipped_lines(&extraction.rejected) {
        println!("{}", line);
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn entries_json(entries: &[parser::Entry]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// One line per dropped segment, with the reason it failed to parse.
fn skipped_lines(rejected: &[parser::Rejected]) -> Vec<String> {
    rejected
        .iter()
        .map(|r| format!("  skipped entry #{}: {}", r.segment, r.error))
        .collect()
}

fn build_cards(
    entries: &[parser::Entry],
    flags: &FlagTable,
    style: &StyleConfig,
) -> anyhow::Result<Vec<Card>> {
    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cards")?
            .progress_chars("#>-"),
    );

    let cards: Vec<Card> = entries
        .par_iter()
        .map(|entry| {
            let card = card::build_card(entry, flags, style);
            pb.inc(1);
            card
        })
        .collect();

    pb.finish_and_clear();
    Ok(cards)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
