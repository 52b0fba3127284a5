//! End-to-end tests of the `mindforge` binary with providers disabled.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use mindforge_core::rag::NOT_READY;
use tempfile::TempDir;

fn mindforge_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("mindforge");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("cells.txt"),
        "Cells are the basic unit of life.\n\nThe nucleus stores genetic material.\n\nMitochondria produce ATP.",
    )
    .unwrap();
    fs::write(
        files_dir.join("lecture.vtt"),
        "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nWelcome to <b>genetics</b>.\n\n00:00:02.000 --> 00:00:04.000\nWelcome to <b>genetics</b>.\n\n00:00:04.000 --> 00:00:06.000\nDNA has two strands.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[data]
dir = "{}/data"

[chunking]
chunk_size = 2000
overlap = 200

[embedding]
provider = "disabled"

[completion]
provider = "disabled"
"#,
        root.display()
    );
    let config_path = root.join("mindforge.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_mindforge(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = mindforge_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run mindforge binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_with_stdin(config_path: &Path, args: &[&str], input: &str) -> (String, String, bool) {
    let mut child = Command::new(mindforge_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_unit_create_and_list() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_mindforge(&config, &["unit", "list"]);
    assert!(ok);
    assert!(stdout.contains("No units."));

    let (stdout, stderr, ok) = run_mindforge(&config, &["unit", "create", "Cell Biology"]);
    assert!(ok, "create failed: {}", stderr);
    assert!(stdout.contains("Created unit 'Cell Biology'"));
    assert!(stdout.contains("Cell_Biology"));

    let (stdout, _, ok) = run_mindforge(&config, &["unit", "list"]);
    assert!(ok);
    assert!(stdout.contains("UNIT"));
    assert!(stdout.contains("Cell Biology"));
}

#[test]
fn test_duplicate_unit_fails() {
    let (_tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Physics"]);
    let (_, stderr, ok) = run_mindforge(&config, &["unit", "create", "Physics"]);
    assert!(!ok);
    assert!(stderr.contains("already exists"), "stderr: {}", stderr);
}

#[test]
fn test_notes_save_and_show() {
    let (_tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "History"]);

    let (stdout, _, ok) = run_mindforge(&config, &["notes", "show", "History"]);
    assert!(ok);
    assert!(stdout.contains("(no notes)"));

    let (_, stderr, ok) = run_mindforge(
        &config,
        &["notes", "save", "History", "Westphalia was signed in 1648."],
    );
    assert!(ok, "save failed: {}", stderr);

    let (stdout, _, ok) = run_mindforge(&config, &["notes", "show", "History"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "Westphalia was signed in 1648.");
}

#[test]
fn test_ingest_without_providers() {
    let (tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Biology"]);
    let file = tmp.path().join("files").join("cells.txt");

    let (stdout, stderr, ok) = run_mindforge(&config, &["ingest", "Biology", file.to_str().unwrap()]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("analyze cells.txt"));
    assert!(stdout.contains("chunks: 1 (boundary)"));
    assert!(stdout.contains("index: not built"));
    assert!(stdout.contains("Error during summarization"));

    let (stdout, _, ok) = run_mindforge(&config, &["summary", "Biology"]);
    assert!(ok);
    assert!(stdout.contains("--- Summary: cells.txt ---"));

    let (stdout, _, ok) = run_mindforge(&config, &["map", "Biology", "--json"]);
    assert!(ok);
    let map: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(map["nodes"].as_array().unwrap().len(), 0);

    let (stdout, _, ok) = run_mindforge(&config, &["unit", "list"]);
    assert!(ok);
    let row = stdout.lines().find(|l| l.starts_with("Biology")).unwrap();
    assert!(row.trim_end().ends_with('1'));
}

#[test]
fn test_ingest_video_transcript() {
    let (tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Genetics"]);
    let vtt = tmp.path().join("files").join("lecture.vtt");

    let (stdout, stderr, ok) = run_mindforge(
        &config,
        &[
            "ingest-video",
            "Genetics",
            "--url",
            "https://youtu.be/dQw4w9WgXcQ",
            "--transcript",
            vtt.to_str().unwrap(),
        ],
    );
    assert!(ok, "ingest-video failed: {}", stderr);
    assert!(stdout.contains("analyze Video_dQw4w9WgXcQ"));
    assert!(stdout.contains("source: video"));
    assert!(stdout.contains("(fixed)"));

    let (_, stderr, ok) = run_mindforge(
        &config,
        &[
            "ingest-video",
            "Genetics",
            "--url",
            "https://example.com/watch?v=abc",
            "--transcript",
            vtt.to_str().unwrap(),
        ],
    );
    assert!(!ok);
    assert!(!stderr.is_empty());
}

#[test]
fn test_ingest_text_from_stdin() {
    let (_tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Chemistry"]);

    let (stdout, stderr, ok) = run_with_stdin(
        &config,
        &["ingest-text", "Chemistry", "--name", "Acids"],
        "Acids donate protons.",
    );
    assert!(ok, "ingest-text failed: {}", stderr);
    assert!(stdout.contains("analyze Acids"));
    assert!(stdout.contains("source: text"));

    let (_, _, ok) = run_with_stdin(&config, &["ingest-text", "Chemistry"], "   \n");
    assert!(!ok);
}

#[test]
fn test_ask_without_index_and_history() {
    let (_tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Algebra"]);

    let (stdout, _, ok) = run_mindforge(&config, &["history", "Algebra"]);
    assert!(ok);
    assert!(stdout.contains("No chat history."));

    let (stdout, stderr, ok) = run_mindforge(&config, &["ask", "Algebra", "What is a ring?"]);
    assert!(ok, "ask failed: {}", stderr);
    assert_eq!(stdout.trim(), NOT_READY);

    let (stdout, _, ok) = run_mindforge(&config, &["history", "Algebra"]);
    assert!(ok);
    assert!(stdout.contains("[you] What is a ring?"));
    assert!(stdout.contains(&format!("[tutor] {}", NOT_READY)));
}

#[test]
fn test_search_without_index_fails() {
    let (_tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Optics"]);
    let (_, stderr, ok) = run_mindforge(&config, &["search", "Optics", "lens"]);
    assert!(!ok);
    assert!(stderr.contains("has no index"), "stderr: {}", stderr);
}

#[test]
fn test_chat_repl_commands() {
    let (_tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Algebra"]);
    run_mindforge(&config, &["unit", "create", "Geometry"]);
    run_mindforge(&config, &["notes", "save", "Geometry", "Triangles have three sides."]);

    let (stdout, stderr, ok) = run_with_stdin(
        &config,
        &["chat", "Algebra"],
        "/help\nWhat is a group?\n/open Geometry\n/notes\n/bogus\n/quit\n",
    );
    assert!(ok, "chat failed: {}", stderr);
    assert!(stdout.contains("Chatting with 'Algebra'"));
    assert!(stdout.contains("/search <query>"));
    assert!(stdout.contains(NOT_READY));
    assert!(stdout.contains("Opened 'Geometry'"));
    assert!(stdout.contains("Triangles have three sides."));
    assert!(stdout.contains("Unknown command"));
}

#[test]
fn test_unit_delete() {
    let (tmp, config) = setup_test_env();
    run_mindforge(&config, &["unit", "create", "Scratch"]);
    run_mindforge(&config, &["notes", "save", "Scratch", "temp"]);
    assert!(tmp.path().join("data").join("Scratch").exists());

    let (stdout, _, ok) = run_mindforge(&config, &["unit", "delete", "Scratch"]);
    assert!(ok);
    assert!(stdout.contains("Deleted unit 'Scratch'"));
    assert!(!tmp.path().join("data").join("Scratch").exists());

    let (_, _, ok) = run_mindforge(&config, &["notes", "show", "Scratch"]);
    assert!(!ok);
}

#[test]
fn test_missing_credentials_block_provider_commands() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("mindforge.toml");
    fs::write(
        &config_path,
        format!(
            r#"[data]
dir = "{}/data"

[embedding]
provider = "openai"
api_key_env = "MINDFORGE_CLI_TEST_UNSET_KEY"

[completion]
provider = "disabled"
"#,
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, _, ok) = run_mindforge(&config_path, &["unit", "create", "Locked"]);
    assert!(ok, "unit commands need no credentials");

    let (stdout, stderr, ok) = run_mindforge(&config_path, &["ask", "Locked", "hello"]);
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Missing API credentials"), "stderr: {}", stderr);
    assert!(stderr.contains("MINDFORGE_CLI_TEST_UNSET_KEY"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 0\n").unwrap();
    let (_, _, ok) = run_mindforge(&config_path, &["unit", "list"]);
    assert!(!ok);
}

#[test]
fn test_completions() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_mindforge(&config, &["completions", "bash"]);
    assert!(ok);
    assert!(stdout.contains("mindforge"));
}
