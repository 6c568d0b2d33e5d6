//! Field-aware sliding-window chunker.
//!
//! A field is tokenised into units (whitespace-separated words or Unicode
//! scalar values) and cut into windows of `chunk_size` units that advance by
//! `chunk_size - overlap`. The trailing partial window is kept.

use crate::config::{ChunkPolicy, ChunkUnit, ChunkingSettings};
use crate::error::Result;
use crate::types::{Chunk, SpeciesDocument};

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Self { Self { settings } }

    pub fn settings(&self) -> &ChunkingSettings { &self.settings }

    /// Chunk `text` using the policy registered for `field`.
    pub fn chunk(&self, text: &str, field: &str) -> Result<Vec<Chunk>> {
        chunk_text(text, field, self.settings.unit, self.settings.policy_for(field))
    }

    /// Chunk every field of a species record, in field order.
    pub fn chunk_document(&self, doc: &SpeciesDocument) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for (field, text) in &doc.fields {
            chunks.extend(self.chunk(text, field)?);
        }
        Ok(chunks)
    }
}

pub fn chunk_text(text: &str, field: &str, unit: ChunkUnit, policy: ChunkPolicy) -> Result<Vec<Chunk>> {
    policy.validate()?;
    let windows = match unit {
        ChunkUnit::Words => {
            let words: Vec<&str> = text.split_whitespace().collect();
            windows(words.len(), policy).map(|(s, e)| words[s..e].join(" ")).collect::<Vec<_>>()
        }
        ChunkUnit::Chars => {
            let chars: Vec<char> = text.chars().collect();
            windows(chars.len(), policy).map(|(s, e)| chars[s..e].iter().collect::<String>()).collect::<Vec<_>>()
        }
    };
    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(position, text)| Chunk { text, source_field: field.to_string(), position })
        .collect())
}

/// Window bounds `[start, end)` over `n` units. Requires a validated policy.
fn windows(n: usize, policy: ChunkPolicy) -> impl Iterator<Item = (usize, usize)> {
    let step = policy.step();
    let mut start = 0usize;
    let mut done = n == 0;
    std::iter::from_fn(move || {
        if done { return None; }
        let end = (start + policy.chunk_size).min(n);
        let window = (start, end);
        if end >= n { done = true; } else { start += step; }
        Some(window)
    })
}

/// Expected window count for `n` units; the closed form of [`chunk_text`].
pub fn expected_chunk_count(n: usize, policy: ChunkPolicy) -> usize {
    if n == 0 { return 0; }
    if n <= policy.chunk_size { return 1; }
    (n - policy.overlap).div_ceil(policy.step())
}
