//! Core data models shared by the segmenter, the index, and the app crate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a [`Document`]'s text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An uploaded file (PDF, DOCX, plain text).
    File,
    /// A video transcript.
    Video,
    /// Raw pasted text.
    Text,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::File => write!(f, "file"),
            SourceKind::Video => write!(f, "video"),
            SourceKind::Text => write!(f, "text"),
        }
    }
}

/// Extracted text plus its source metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Filename, or `Video_<id>` for transcripts.
    pub name: String,
    pub source: SourceKind,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, source: SourceKind, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            text: text.into(),
        }
    }
}

/// A bounded segment of a document's text.
///
/// `offset` and all lengths are counted in characters (Unicode scalar
/// values), not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position in the segment sequence.
    pub index: usize,
    /// Character offset of the first character within the source text.
    pub offset: usize,
    pub text: String,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

impl Chunk {
    pub fn new(index: usize, offset: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = content_hash(&text);
        Self {
            index,
            offset,
            text,
            hash,
        }
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// SHA-256 hex digest of a string.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of a unit's chat transcript.
///
/// Serializes as `{"role": "user"|"assistant", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_sha256_of_text() {
        let chunk = Chunk::new(0, 0, "hello");
        assert_eq!(
            chunk.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn chat_message_wire_shape() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let back: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"q"}"#).unwrap();
        assert_eq!(back, ChatMessage::user("q"));
    }

    #[test]
    fn char_len_counts_scalars() {
        assert_eq!(Chunk::new(0, 0, "héllo").char_len(), 5);
    }
}
