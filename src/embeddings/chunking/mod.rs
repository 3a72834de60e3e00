#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use tracing::debug;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const PARAGRAPH_SEPARATOR_CHARS: usize = 2;
const NAME_HASH_LEN: usize = 8;
const CONTENT_HASH_LEN: usize = 16;

/// Stable identity of an ingested document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an ID from the raw document bytes and the document name.
    ///
    /// Identical content uploaded again under the same name maps to the same ID,
    /// while the same content under a different name maps to a different one.
    #[inline]
    pub fn derive(content: &[u8], name: &str) -> Self {
        let name_hash = sha256_hex(name.as_bytes());
        let content_hash = sha256_hex(content);
        Self(format!(
            "{}-{}",
            name_hash.chars().take(NAME_HASH_LEN).collect::<String>(),
            content_hash.chars().take(CONTENT_HASH_LEN).collect::<String>()
        ))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DocumentId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A bounded segment of a document's text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text, trimmed of surrounding whitespace
    pub text: String,
    /// Position of this chunk within its document, starting at 0
    pub position_index: usize,
    /// The document this chunk was cut from
    pub document_id: DocumentId,
}

/// Configuration for paragraph chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk body size in characters
    pub chunk_size: usize,
    /// Trailing characters of the previous chunk repeated at the start of the next one
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 0,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                chunk_size: self.chunk_size,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Document ID cannot be empty")]
    EmptyDocumentId,
    #[error("Document {0} contains no text to index")]
    EmptyDocument(DocumentId),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}

/// Split extracted document text into chunks.
///
/// Paragraphs (separated by a blank line) are accumulated greedily until adding
/// the next one would push the chunk past `chunk_size` characters. A paragraph
/// that is longer than `chunk_size` on its own is emitted whole rather than cut.
#[inline]
pub fn split_document(
    full_text: &str,
    document_id: &DocumentId,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, ChunkingError> {
    if document_id.is_blank() {
        return Err(ChunkingError::EmptyDocumentId);
    }
    config.validate()?;

    let bodies = accumulate_paragraphs(full_text, config.chunk_size);
    let texts = if config.chunk_overlap > 0 {
        apply_overlap(&bodies, config.chunk_overlap)
    } else {
        bodies
    };

    let chunks: Vec<Chunk> = texts
        .into_iter()
        .enumerate()
        .map(|(position_index, text)| Chunk {
            text,
            position_index,
            document_id: document_id.clone(),
        })
        .collect();

    debug!(
        "Split document {} into {} chunks (avg {} chars)",
        document_id,
        chunks.len(),
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

fn accumulate_paragraphs(text: &str, chunk_size: usize) -> Vec<String> {
    let mut bodies = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        if paragraph.trim().is_empty() {
            continue;
        }

        let paragraph_chars = paragraph.chars().count();
        let candidate_chars = if current.is_empty() {
            paragraph_chars
        } else {
            current_chars + PARAGRAPH_SEPARATOR_CHARS + paragraph_chars
        };

        if candidate_chars > chunk_size && !current.is_empty() {
            push_trimmed(&mut bodies, &current);
            current.clear();
            current_chars = 0;
        }

        if !current.is_empty() {
            current.push_str(PARAGRAPH_SEPARATOR);
            current_chars += PARAGRAPH_SEPARATOR_CHARS;
        }
        current.push_str(paragraph);
        current_chars += paragraph_chars;
    }

    push_trimmed(&mut bodies, &current);
    bodies
}

fn push_trimmed(bodies: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        bodies.push(trimmed.to_string());
    }
}

/// Prefix every chunk after the first with the tail of the previous chunk body
fn apply_overlap(bodies: &[String], overlap: usize) -> Vec<String> {
    let mut texts = Vec::with_capacity(bodies.len());
    let mut previous: Option<&str> = None;

    for body in bodies {
        let tail = previous
            .map(|prev| trailing_chars(prev, overlap).trim_start())
            .unwrap_or_default();

        if tail.is_empty() {
            texts.push(body.clone());
        } else {
            texts.push(format!("{}{}{}", tail, PARAGRAPH_SEPARATOR, body));
        }
        previous = Some(body);
    }

    texts
}

fn trailing_chars(text: &str, count: usize) -> &str {
    let skip = text.chars().count().saturating_sub(count);
    text.char_indices()
        .nth(skip)
        .and_then(|(byte_index, _)| text.get(byte_index..))
        .unwrap_or_default()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
