//! Video transcripts.
//!
//! Transcripts are supplied as caption files (WebVTT, SRT, or plain text)
//! alongside the video URL; the URL only identifies the video and names
//! the resulting document `Video_<id>`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use mindforge_core::models::{Document, SourceKind};
use reqwest::Url;

/// Extract the video id from a YouTube URL.
///
/// Accepts `youtu.be/<id>`, `youtube.com/watch?v=<id>`,
/// `youtube.com/embed/<id>` and `youtube.com/v/<id>`.
pub fn video_id(url: &str) -> Option<String> {
    let url = Url::parse(url.trim()).ok()?;
    let host = url.host_str()?;
    let mut segments = url.path_segments()?;

    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "www.youtube.com" | "m.youtube.com" => match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            "embed" | "v" => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    (!id.is_empty()).then_some(id)
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_cue_header(line: &str) -> bool {
    line.starts_with("WEBVTT")
        || line.starts_with("NOTE")
        || line.starts_with("Kind:")
        || line.starts_with("Language:")
        || line.contains("-->")
        || line.chars().all(|c| c.is_ascii_digit())
}

/// Flatten a caption file into running text.
///
/// Drops headers, cue numbers, timestamps and inline markup, collapses
/// consecutive repeated lines (common in auto-generated captions), and
/// joins what remains with single spaces.
pub fn parse_transcript(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || is_cue_header(line) {
            continue;
        }
        let text = strip_tags(line);
        let text = text.trim();
        if text.is_empty() || lines.last().map(String::as_str) == Some(text) {
            continue;
        }
        lines.push(text.to_string());
    }
    lines.join(" ")
}

/// Build a `Video_<id>` document from a caption file.
pub fn load_transcript(url: &str, transcript: &Path) -> Result<Document> {
    let id = video_id(url).with_context(|| format!("Not a recognized YouTube URL: {}", url))?;
    let raw = std::fs::read_to_string(transcript)
        .with_context(|| format!("Failed to read transcript {}", transcript.display()))?;
    let text = parse_transcript(&raw);
    if text.is_empty() {
        bail!("Transcript {} contains no text", transcript.display());
    }
    Ok(Document::new(format!("Video_{}", id), SourceKind::Video, text))
}
