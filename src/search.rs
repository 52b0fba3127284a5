//! `mindforge search`: raw retrieval against a unit's index.

use anyhow::Result;
use mindforge_core::index::SearchHit;

use crate::config::Config;
use crate::session::{Services, Session};
use crate::units::UnitStore;

const EXCERPT_CHARS: usize = 160;

pub fn print_hits(hits: &[SearchHit<'_>]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        let excerpt: String = hit
            .chunk
            .text
            .replace('\n', " ")
            .trim()
            .chars()
            .take(EXCERPT_CHARS)
            .collect();
        println!(
            "{}. [{:.3}] chunk {} @ {}",
            i + 1,
            hit.score,
            hit.chunk.index,
            hit.chunk.offset
        );
        println!("    excerpt: \"{}\"", excerpt);
        println!();
    }
}

pub async fn run_search(
    config: &Config,
    unit: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    let services = Services::from_config(config)?;
    let store = UnitStore::open(&config.data.dir)?;
    let session = Session::open(&store, unit)?;
    let hits = session
        .retrieve(query, limit.unwrap_or(services.top_k), &services)
        .await?;
    print_hits(&hits);
    Ok(())
}
