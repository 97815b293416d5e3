use crate::error::ConfigError;
use crate::models::{Chunk, ChunkingStrategy, PageUnit};
use std::collections::VecDeque;

/// Split points tried in order. The empty separator splits between characters.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

impl ChunkingStrategy {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidChunkingStrategy(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ConfigError::InvalidChunkingStrategy(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Smaller chunks with more overlap as documents grow.
    pub fn for_page_count(page_count: usize) -> Self {
        match page_count {
            0..=9 => Self {
                chunk_size: 1_000,
                overlap: 100,
            },
            10..=49 => Self {
                chunk_size: 600,
                overlap: 100,
            },
            _ => Self {
                chunk_size: 300,
                overlap: 150,
            },
        }
    }
}

pub fn select_strategy(page_count: usize) -> ChunkingStrategy {
    ChunkingStrategy::for_page_count(page_count)
}

/// One-line preview of a chunk: whitespace runs become single spaces and
/// anything past `max_chars` characters is replaced by `...`.
pub fn chunk_preview(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flattened.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flattened[..cut]),
        None => flattened,
    }
}

/// Splits every page on its own, so overlap never spans two pages.
pub fn chunk_pages(pages: &[PageUnit], strategy: ChunkingStrategy) -> Vec<Chunk> {
    let splitter = RecursiveSplitter::from(strategy);

    pages
        .iter()
        .flat_map(|page| {
            splitter
                .split(&page.text)
                .into_iter()
                .map(move |text| Chunk {
                    text,
                    source_page: Some(page.page_index),
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl From<ChunkingStrategy> for RecursiveSplitter {
    fn from(value: ChunkingStrategy) -> Self {
        Self {
            chunk_size: value.chunk_size,
            overlap: value.overlap,
        }
    }
}

impl RecursiveSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(text) = join_trimmed(&window) {
                    merged.push(text);
                }

                while total > self.overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(text) = join_trimmed(&window) {
            merged.push(text);
        }

        merged
    }
}

fn pick_separator<'s>(
    text: &str,
    separators: &'s [&'static str],
) -> (&'static str, &'s [&'static str]) {
    for (position, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (*separator, &separators[position + 1..]);
        }
    }
    ("", &[])
}

/// Each separator stays attached to the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(index, ch)| &text[index..index + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn join_trimmed(window: &VecDeque<&str>) -> Option<String> {
    let joined = window.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
