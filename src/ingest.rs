//! Document ingestion: extract → segment → summarize/map → index → persist.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use mindforge_core::models::{Document, SourceKind};
use mindforge_core::segment::SegmentStrategy;

use crate::config::Config;
use crate::extract::load_document;
use crate::session::{Services, Session};
use crate::transcript::load_transcript;
use crate::units::{Analysis, UnitStore};

async fn analyze_into(
    config: &Config,
    store: &UnitStore,
    unit: &str,
    document: Document,
) -> Result<()> {
    let services = Services::from_config(config)?;
    let mut session = Session::open(store, unit)?;
    let analysis = session.analyze(&document, &services).await?;
    print_analysis(&analysis);
    Ok(())
}

/// Copy a file into the unit and analyze it with the boundary-aware splitter.
pub async fn run_ingest(config: &Config, unit: &str, file: &Path) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    let stored = store.add_resource(unit, file)?;
    let document = load_document(&stored)?;
    analyze_into(config, &store, unit, document).await
}

/// Analyze a video transcript with the plain window.
pub async fn run_ingest_video(
    config: &Config,
    unit: &str,
    url: &str,
    transcript: &Path,
) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    store.get(unit)?;
    let document = load_transcript(url, transcript)?;
    analyze_into(config, &store, unit, document).await
}

/// Analyze text read from stdin.
pub async fn run_ingest_text(config: &Config, unit: &str, name: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    store.get(unit)?;
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    if text.trim().is_empty() {
        bail!("No text on stdin");
    }
    let document = Document::new(name, SourceKind::Text, text);
    analyze_into(config, &store, unit, document).await
}

pub fn print_analysis(analysis: &Analysis) {
    println!("analyze {}", analysis.document);
    println!("  source: {}", analysis.source);
    println!(
        "  chunks: {} ({})",
        analysis.chunk_count,
        match analysis.strategy {
            SegmentStrategy::Fixed => "fixed",
            SegmentStrategy::Boundary => "boundary",
        }
    );
    if analysis.indexed {
        println!("  index: built");
    } else {
        println!("  index: not built (chat unavailable for this unit)");
    }
    println!();
    println!("--- Summary ---");
    println!("{}", analysis.summary);
    println!();
    println!("--- Concept Map ---");
    if analysis.concept_map.is_empty() {
        println!("(empty)");
    } else {
        print!("{}", analysis.concept_map);
    }
}
