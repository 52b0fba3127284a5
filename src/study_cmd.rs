//! `mindforge summary`, `map`, and `quiz`.

use anyhow::Result;

use crate::config::Config;
use crate::session::{Services, Session};
use crate::units::UnitStore;

pub fn run_summary(config: &Config, unit: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    match store.load_analysis(unit)? {
        Some(analysis) => {
            println!("--- Summary: {} ---", analysis.document);
            println!("{}", analysis.summary);
        }
        None => println!("No analysis yet. Run `mindforge ingest {} <file>` first.", unit),
    }
    Ok(())
}

pub fn run_map(config: &Config, unit: &str, json: bool) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    let Some(analysis) = store.load_analysis(unit)? else {
        println!("No analysis yet. Run `mindforge ingest {} <file>` first.", unit);
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.concept_map)?);
    } else if analysis.concept_map.is_empty() {
        println!("(empty concept map)");
    } else {
        print!("{}", analysis.concept_map);
    }
    Ok(())
}

pub async fn run_quiz(config: &Config, unit: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    let store = UnitStore::open(&config.data.dir)?;
    let session = Session::open(&store, unit)?;
    let quiz = session.generate_quiz(&services).await?;
    if quiz.is_empty() {
        println!("The model did not return a usable quiz. Try again.");
    } else {
        print!("{}", quiz);
    }
    Ok(())
}
