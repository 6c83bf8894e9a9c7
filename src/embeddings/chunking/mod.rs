
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inserted between the extracted text of two documents. A blank line is a hard
/// sentence boundary, so no passage spans two documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Characters that may trail sentence punctuation and still belong to the sentence
const CLOSING_CHARS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

/// Abbreviations whose trailing period does not end a sentence, lowercased and
/// without the final period
const ABBREVIATIONS: &[&str] = &[
    "dr", "mr", "mrs", "ms", "prof", "sr", "jr", "st", "vs", "e.g", "i.e", "approx", "dept",
    "govt", "asst", "assoc", "fig",
];

/// A retrievable passage of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The passage text, whitespace-normalized
    pub text: String,
    /// Position in extraction order
    pub source_order: usize,
}

/// Configuration for sentence chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Fragments whose trimmed length is at or below this many characters are dropped
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_chunk_chars: 20,
        }
    }
}

/// Split flattened text into sentence-level chunks
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = split_sentences(text)
        .into_iter()
        .filter(|sentence| sentence.chars().count() > config.min_chunk_chars)
        .enumerate()
        .map(|(source_order, text)| Chunk { text, source_order })
        .collect();

    debug!(
        "Chunked {} characters into {} passages",
        text.len(),
        chunks.len()
    );

    chunks
}

/// Chunk several documents, keeping their order and separating them explicitly
#[inline]
pub fn chunk_documents<'a, I>(texts: I, config: &ChunkingConfig) -> Vec<Chunk>
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = texts
        .into_iter()
        .filter(|text| !text.trim().is_empty())
        .join(DOCUMENT_SEPARATOR);

    chunk_text(&joined, config)
}

/// Split text into trimmed sentences.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
/// followed by whitespace or the end of the text. Blank lines also end a
/// sentence. Whitespace inside a sentence is collapsed to single spaces.
#[inline]
pub fn split_sentences(text: &str) -> Vec<String> {
    paragraphs(text)
        .iter()
        .flat_map(|paragraph| split_paragraph(paragraph))
        .collect()
}

/// Group lines into paragraphs separated by blank lines, collapsing whitespace
fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.drain(..).flat_map(str::split_whitespace).join(" "));
            }
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.into_iter().flat_map(str::split_whitespace).join(" "));
    }

    paragraphs
}

fn split_paragraph(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = paragraph.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if !matches!(c, '.' | '!' | '?') {
            continue;
        }

        while let Some(&next) = chars.peek() {
            if CLOSING_CHARS.contains(&next) {
                current.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if chars.peek().is_none_or(|next| next.is_whitespace()) && !ends_with_abbreviation(&current)
        {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Whether `text` ends in a title or common abbreviation such as `Dr.`
fn ends_with_abbreviation(text: &str) -> bool {
    let Some(word) = text.split_whitespace().next_back() else {
        return false;
    };
    let Some(stem) = word
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .strip_suffix('.')
    else {
        return false;
    };

    ABBREVIATIONS.contains(&stem.to_lowercase().as_str())
}
