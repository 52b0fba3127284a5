//! `mindforge unit`, `notes`, and `history` commands.

use anyhow::Result;
use mindforge_core::models::ChatRole;

use crate::config::Config;
use crate::units::UnitStore;

pub fn run_unit_create(config: &Config, name: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    let unit = store.create(name)?;
    println!(
        "Created unit '{}' at {}",
        unit.name,
        store.root().join(&unit.info.folder).display()
    );
    Ok(())
}

pub fn run_unit_list(config: &Config) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    let units = store.list()?;
    if units.is_empty() {
        println!("No units.");
        return Ok(());
    }

    println!("{:<30} {:<12} {:>9}", "UNIT", "CREATED", "RESOURCES");
    for unit in units {
        let created = chrono::DateTime::parse_from_rfc3339(&unit.info.created_at)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or(unit.info.created_at);
        println!(
            "{:<30} {:<12} {:>9}",
            unit.name,
            created,
            unit.info.resources.len()
        );
    }
    Ok(())
}

pub async fn run_unit_delete(config: &Config, name: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    store.delete(name).await?;
    println!("Deleted unit '{}'", name);
    Ok(())
}

pub fn run_notes_show(config: &Config, unit: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    let notes = store.load_notes(unit)?;
    if notes.is_empty() {
        println!("(no notes)");
    } else {
        println!("{}", notes);
    }
    Ok(())
}

pub fn run_notes_save(config: &Config, unit: &str, text: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    store.save_notes(unit, text)?;
    println!("Notes saved for '{}'", unit);
    Ok(())
}

pub fn run_history(config: &Config, unit: &str) -> Result<()> {
    let store = UnitStore::open(&config.data.dir)?;
    let chat = store.load_chat(unit)?;
    if chat.is_empty() {
        println!("No chat history.");
        return Ok(());
    }
    for message in chat {
        let who = match message.role {
            ChatRole::User => "you",
            ChatRole::Assistant => "tutor",
        };
        println!("[{}] {}", who, message.content);
        println!();
    }
    Ok(())
}
