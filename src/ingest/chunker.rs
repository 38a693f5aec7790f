use crate::config::ChunkingConfig;
use crate::error::{ChatragError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::metadata::DocumentMetadata;

/// Boundaries tried in order: paragraph, line, sentence, word, then a hard
/// character cut (the empty separator).
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Per-chunk metadata: document provenance plus position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// Character (not byte) index of the chunk's first character in the source text
    pub start_offset: usize,
}

/// A chunk of text with metadata, not yet embedded
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl TextChunk {
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn start_offset(&self) -> usize {
        self.metadata.start_offset
    }
}

/// Byte range into the text being split
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Splits text into overlapping chunks of at most `chunk_size` characters.
///
/// Text is cut at the coarsest boundary that occurs in it; any piece still
/// too large is re-split at the next finer boundary. Adjacent pieces are then
/// merged up to `chunk_size`, and each new chunk starts with up to
/// `chunk_overlap` characters carried over from the end of the previous one.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChatragError::InvalidInput(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChatragError::InvalidInput(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into ordered chunks carrying `metadata` and their start offsets.
    ///
    /// Surrounding whitespace is dropped first; offsets count characters from
    /// the first non-whitespace character.
    pub fn split(&self, text: &str, metadata: &DocumentMetadata) -> Vec<TextChunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        if text.chars().count() <= self.chunk_size {
            return vec![TextChunk::new(text, metadata.at_offset(0))];
        }

        let mut spans = Vec::new();
        self.split_span(
            text,
            Span {
                start: 0,
                end: text.len(),
            },
            SEPARATORS,
            &mut spans,
        );

        // Spans arrive in non-decreasing start order, so char offsets can be
        // counted incrementally.
        let mut chunks = Vec::with_capacity(spans.len());
        let mut cursor_byte = 0;
        let mut cursor_char = 0;
        for span in spans {
            let raw = &text[span.start..span.end];
            let content = raw.trim();
            if content.is_empty() {
                continue;
            }
            let start_byte = span.start + (raw.len() - raw.trim_start().len());
            if start_byte >= cursor_byte {
                cursor_char += text[cursor_byte..start_byte].chars().count();
            } else {
                cursor_char = text[..start_byte].chars().count();
            }
            cursor_byte = start_byte;
            chunks.push(TextChunk::new(content, metadata.at_offset(cursor_char)));
        }
        chunks
    }

    fn split_span(&self, text: &str, span: Span, separators: &[&str], out: &mut Vec<Span>) {
        let segment = &text[span.start..span.end];

        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || segment.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut fitting = Vec::new();
        for piece in split_keeping_separator(segment, separator, span.start) {
            if char_len(text, piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge(text, &fitting, out);
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece);
            } else {
                self.split_span(text, piece, finer, out);
            }
        }
        if !fitting.is_empty() {
            self.merge(text, &fitting, out);
        }
    }

    /// Merge contiguous pieces into windows of at most `chunk_size` characters.
    fn merge(&self, text: &str, pieces: &[Span], out: &mut Vec<Span>) {
        let mut window: VecDeque<(Span, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(text, piece);
            if total + len > self.chunk_size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    out.push(Span {
                        start: first.0.start,
                        end: last.0.end,
                    });
                }
                // Keep at most `chunk_overlap` trailing characters as the next prefix
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            out.push(Span {
                start: first.0.start,
                end: last.0.end,
            });
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

fn char_len(text: &str, span: Span) -> usize {
    text[span.start..span.end].chars().count()
}

/// Split `segment` on `separator`, attaching each separator to the piece
/// that follows it so the pieces tile the segment exactly.
fn split_keeping_separator(segment: &str, separator: &str, base: usize) -> Vec<Span> {
    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(i, c)| Span {
                start: base + i,
                end: base + i + c.len_utf8(),
            })
            .collect();
    }

    let mut bounds: Vec<usize> = std::iter::once(0)
        .chain(segment.match_indices(separator).map(|(i, _)| i))
        .chain(std::iter::once(segment.len()))
        .collect();
    bounds.dedup();

    bounds
        .windows(2)
        .filter(|w| w[0] < w[1])
        .map(|w| Span {
            start: base + w[0],
            end: base + w[1],
        })
        .collect()
}
