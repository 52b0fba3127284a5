//! Summary, concept map, and quiz generation.
//!
//! Each output is one completion call over the start of a document. The
//! model's free-form reply is parsed strictly and any parse failure falls
//! back to a typed empty value, so a bad reply never fails an analysis.

use std::collections::HashSet;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::rag::{CompletionError, CompletionProvider};

/// Characters of source text sent for a summary.
pub const SUMMARY_INPUT_CHARS: usize = 4000;
/// Characters of source text sent for a concept map.
pub const CONCEPT_MAP_INPUT_CHARS: usize = 3000;
/// Characters of source text sent for a quiz.
pub const QUIZ_INPUT_CHARS: usize = 3000;

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "You are an expert academic tutor. Summarize the following text clearly.\n\
         Use these sections:\n\
         1. Core Concept\n\
         2. Key Details (Bullet points)\n\
         3. Practical Implication\n\n\
         TEXT: {}",
        truncate_chars(text, SUMMARY_INPUT_CHARS)
    )
}

pub fn concept_map_prompt(text: &str) -> String {
    format!(
        "Analyze the text and identify core concepts and relationships.\n\
         Output ONLY valid JSON with 'nodes' (id, group) and 'edges' (from, to, label).\n\
         Do not use markdown blocks.\n\n\
         TEXT: {}",
        truncate_chars(text, CONCEPT_MAP_INPUT_CHARS)
    )
}

pub fn quiz_prompt(text: &str) -> String {
    format!(
        "Create a mini-quiz with 3 multiple-choice questions based on this text.\n\
         Format the output EXACTLY like this:\n\n\
         Q1: [Question]\n\
         A) [Option]\n\
         B) [Option]\n\
         C) [Option]\n\
         D) [Option]\n\
         Answer: [Correct Letter]\n\n\
         (Repeat for Q2 and Q3)\n\n\
         TEXT: {}",
        truncate_chars(text, QUIZ_INPUT_CHARS)
    )
}

/// Generate a sectioned summary. Failures come back as readable text.
pub async fn summarize(completer: &dyn CompletionProvider, text: &str) -> String {
    match completer.complete(&summary_prompt(text)).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "summary failed");
            format!("Error during summarization: {}", e)
        }
    }
}

/// Generate a concept map, or an empty one on any failure.
pub async fn concept_map(completer: &dyn CompletionProvider, text: &str) -> ConceptMap {
    match completer.complete(&concept_map_prompt(text)).await {
        Ok(raw) => parse_concept_map(&raw),
        Err(e) => {
            warn!(error = %e, "concept map failed");
            ConceptMap::default()
        }
    }
}

/// Generate a quiz. An unparseable reply yields an empty quiz; only the
/// provider call itself can fail.
pub async fn quiz(completer: &dyn CompletionProvider, text: &str) -> Result<Quiz, CompletionError> {
    let raw = completer.complete(&quiz_prompt(text)).await?;
    Ok(parse_quiz(&raw))
}

// ============ Concept map ============

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string id, got {}", other))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEdge {
    #[serde(deserialize_with = "id_string")]
    pub from: String,
    #[serde(deserialize_with = "id_string")]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Concepts and their relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptMap {
    #[serde(default)]
    pub nodes: Vec<ConceptNode>,
    #[serde(default)]
    pub edges: Vec<ConceptEdge>,
}

impl ConceptMap {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop duplicate and blank node ids (first wins) and edges whose
    /// endpoints are not both known nodes.
    pub fn normalize(mut self) -> Self {
        let mut seen = HashSet::new();
        self.nodes
            .retain(|n| !n.id.trim().is_empty() && seen.insert(n.id.clone()));
        self.edges
            .retain(|e| seen.contains(&e.from) && seen.contains(&e.to));
        self
    }
}

impl fmt::Display for ConceptMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        writeln!(f, "Concepts: {}", ids.join(", "))?;
        for e in &self.edges {
            match e.label.as_deref() {
                Some(label) if !label.is_empty() => {
                    writeln!(f, "  {} --[{}]--> {}", e.from, label, e.to)?
                }
                _ => writeln!(f, "  {} --> {}", e.from, e.to)?,
            }
        }
        Ok(())
    }
}

fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn outer_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// Parse a model reply into a normalized [`ConceptMap`].
///
/// Strips code fences, then decodes the whole reply or, failing that, the
/// outermost `{...}` span. Anything else yields an empty map.
pub fn parse_concept_map(raw: &str) -> ConceptMap {
    let cleaned = strip_fences(raw);
    let parsed = serde_json::from_str::<ConceptMap>(&cleaned).or_else(|first| {
        outer_object(&cleaned)
            .ok_or(first)
            .and_then(|inner| serde_json::from_str::<ConceptMap>(inner))
    });
    match parsed {
        Ok(map) => map.normalize(),
        Err(e) => {
            warn!(error = %e, "concept map reply was not valid JSON");
            ConceptMap::default()
        }
    }
}

// ============ Quiz ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub letter: char,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<QuizOption>,
    /// Letter of the correct option, when the reply named one.
    pub answer: Option<char>,
}

/// Multiple-choice questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, q) in self.questions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "Q{}: {}", i + 1, q.prompt)?;
            for o in &q.options {
                writeln!(f, "{}) {}", o.letter, o.text)?;
            }
            if let Some(answer) = q.answer {
                writeln!(f, "Answer: {}", answer)?;
            }
        }
        Ok(())
    }
}

/// `Q3: text` or `Q3. text` with optional markdown emphasis.
fn question_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('Q')?;
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = rest[digits..].trim_start_matches('*');
    let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix('.'))?;
    Some(rest.trim_matches(|c: char| c == '*' || c.is_whitespace()))
}

/// `A) text`, `A. text` or `A: text`.
fn option_line(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !('A'..='D').contains(&letter) {
        return None;
    }
    let rest = chars.as_str();
    let rest = rest
        .strip_prefix(')')
        .or_else(|| rest.strip_prefix('.'))
        .or_else(|| rest.strip_prefix(':'))?;
    Some((letter, rest.trim()))
}

fn answer_line(line: &str) -> Option<Option<char>> {
    let lower = line.to_ascii_lowercase();
    let rest = lower.strip_prefix("answer")?;
    let rest = rest.trim_start_matches(['*', ' ']).strip_prefix(':')?;
    Some(
        rest.chars()
            .map(|c| c.to_ascii_uppercase())
            .find(|c| ('A'..='D').contains(c)),
    )
}

/// Parse the `Q1:` / `A)` / `Answer:` layout.
///
/// Questions with fewer than two options are dropped. Text that does not
/// follow the layout at all yields an empty quiz.
pub fn parse_quiz(raw: &str) -> Quiz {
    let mut questions: Vec<QuizQuestion> = Vec::new();

    for line in raw.lines() {
        let line = line.trim().trim_start_matches(['*', '#', ' ']);
        if line.is_empty() {
            continue;
        }
        if let Some(prompt) = question_line(line) {
            questions.push(QuizQuestion {
                prompt: prompt.to_string(),
                options: Vec::new(),
                answer: None,
            });
            continue;
        }
        let Some(current) = questions.last_mut() else {
            continue;
        };
        if let Some(answer) = answer_line(line) {
            current.answer = answer;
        } else if let Some((letter, text)) = option_line(line) {
            current.options.push(QuizOption {
                letter,
                text: text.to_string(),
            });
        } else if current.options.is_empty() {
            // question text wrapped onto a second line
            current.prompt.push(' ');
            current.prompt.push_str(line);
        }
    }

    questions.retain(|q| q.options.len() >= 2);
    if questions.is_empty() && !raw.trim().is_empty() {
        warn!("quiz reply did not follow the expected layout");
    }
    Quiz { questions }
}
