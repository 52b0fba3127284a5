//! Question answering: one-shot `ask` and the interactive `chat` loop.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::search::print_hits;
use crate::session::{Services, Workspace};
use crate::units::UnitStore;

/// Answer one question and append the exchange to the unit's chat.
pub async fn run_ask(config: &Config, unit: &str, question: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    let mut workspace = Workspace::new(UnitStore::open(&config.data.dir)?);
    let session = workspace.open(unit)?;
    let answer = session.ask(question, &services).await;
    println!("{}", answer);
    Ok(())
}

const HELP: &str = "\
Commands:
  /open <unit>     switch to another unit
  /search <query>  show the chunks a question would retrieve
  /notes           show this unit's notes
  /clear           clear the chat history
  /help            show this help
  /quit            leave the chat
Anything else is sent as a question.";

enum Step {
    Continue,
    Quit,
}

async fn handle_line(line: &str, workspace: &mut Workspace, services: &Services) -> Result<Step> {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return Ok(Step::Quit),
        "/help" => println!("{}", HELP),
        "/open" if !arg.is_empty() => {
            let session = workspace.open(arg)?;
            println!(
                "Opened '{}' ({} messages, {})",
                session.unit(),
                session.chat().len(),
                if session.index().is_some() { "indexed" } else { "no index" }
            );
        }
        "/search" if !arg.is_empty() => {
            if let Some(session) = workspace.current() {
                let hits = session.retrieve(arg, services.top_k, services).await?;
                print_hits(&hits);
            }
        }
        "/notes" => {
            if let Some(session) = workspace.current() {
                let notes = session.notes();
                println!("{}", if notes.is_empty() { "(no notes)" } else { notes });
            }
        }
        "/clear" => {
            if let Some(session) = workspace.current_mut() {
                session.clear_chat()?;
                println!("Chat cleared.");
            }
        }
        _ if command.starts_with('/') => println!("Unknown command. Type /help."),
        _ => {
            if let Some(session) = workspace.current_mut() {
                let answer = session.ask(line, services).await;
                println!("{}", answer);
            }
        }
    }
    Ok(Step::Continue)
}

/// Interactive chat against a unit until `/quit` or end of input.
///
/// Errors from individual commands are printed and the loop continues.
pub async fn run_chat(config: &Config, unit: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    let mut workspace = Workspace::new(UnitStore::open(&config.data.dir)?);
    let session = workspace.open(unit)?;
    println!(
        "Chatting with '{}'. Type /help for commands, /quit to leave.",
        session.unit()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let prompt = format!("{}> ", workspace.current().map(|s| s.unit()).unwrap_or(""));
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_line(line, &mut workspace, &services).await {
            Ok(Step::Quit) => break,
            Ok(Step::Continue) => {}
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    workspace.close();
    Ok(())
}
