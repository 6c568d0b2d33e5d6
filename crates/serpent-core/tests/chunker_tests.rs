use std::collections::BTreeMap;

use serpent_core::chunker::{chunk_text, expected_chunk_count, Chunker};
use serpent_core::config::{ChunkPolicy, ChunkUnit, ChunkingSettings};
use serpent_core::error::ErrorKind;
use serpent_core::types::SpeciesDocument;

fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
}

#[test]
fn habitat_field_uses_its_own_policy() {
    let chunker = Chunker::new(ChunkingSettings::default());
    let text = words(500);
    let chunks = chunker.chunk(&text, "Habitat").expect("chunk");

    assert_eq!(chunks.len(), expected_chunk_count(500, ChunkPolicy::new(150, 40)));
    for c in &chunks {
        assert!(c.text.split_whitespace().count() <= 150);
        assert_eq!(c.source_field, "Habitat");
    }
    for pair in chunks.windows(2) {
        let prev: Vec<&str> = pair[0].text.split_whitespace().collect();
        let next: Vec<&str> = pair[1].text.split_whitespace().collect();
        assert_eq!(&prev[prev.len() - 40..], &next[..40], "consecutive chunks share 40 words");
    }
}

#[test]
fn unknown_field_falls_back_to_default_policy() {
    let chunker = Chunker::new(ChunkingSettings::default());
    let chunks = chunker.chunk(&words(450), "Folklore").expect("chunk");
    // default 200/50: windows start at 0, 150, 300
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].text.split_whitespace().count(), 200);
    assert!(chunks[2].text.starts_with("w300 "));
}

#[test]
fn windows_cover_every_unit_without_gaps() {
    for (n, size, overlap) in [(1, 5, 2), (7, 5, 2), (23, 5, 4), (100, 10, 0), (101, 10, 3), (10, 10, 9)] {
        let policy = ChunkPolicy::new(size, overlap);
        let chunks = chunk_text(&words(n), "f", ChunkUnit::Words, policy).expect("chunk");
        assert_eq!(chunks.len(), expected_chunk_count(n, policy), "count for n={n} size={size} overlap={overlap}");

        let mut covered = Vec::new();
        for (i, c) in chunks.iter().enumerate() {
            let units: Vec<&str> = c.text.split_whitespace().collect();
            if i + 1 < chunks.len() {
                assert_eq!(units.len(), size, "only the last chunk may be short");
            }
            let fresh = if i == 0 { &units[..] } else { &units[overlap.min(units.len())..] };
            covered.extend(fresh.iter().map(|s| s.to_string()));
            assert_eq!(c.position, i);
        }
        let expected: Vec<String> = (0..n).map(|i| format!("w{}", i)).collect();
        assert_eq!(covered, expected, "unique spans reconstruct the text for n={n}");
    }
}

#[test]
fn char_mode_counts_unicode_scalars() {
    let policy = ChunkPolicy::new(4, 1);
    let chunks = chunk_text("rắn hổ mang", "f", ChunkUnit::Chars, policy).expect("chunk");
    let n = "rắn hổ mang".chars().count();
    assert_eq!(chunks.len(), expected_chunk_count(n, policy));
    assert_eq!(chunks[0].text, "rắn ");
    assert_eq!(chunks[1].text, " hổ ");
}

#[test]
fn overlap_not_smaller_than_size_fails_fast() {
    for policy in [ChunkPolicy::new(10, 10), ChunkPolicy::new(10, 12), ChunkPolicy::new(0, 0)] {
        let err = chunk_text("a b c", "f", ChunkUnit::Words, policy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

#[test]
fn empty_text_yields_no_chunks() {
    let chunks = chunk_text("   \n ", "f", ChunkUnit::Words, ChunkPolicy::new(5, 1)).expect("chunk");
    assert!(chunks.is_empty());
}

#[test]
fn chunking_is_deterministic_per_document() {
    let mut fields = BTreeMap::new();
    fields.insert("Toxicity".to_string(), words(260));
    fields.insert("Habitat".to_string(), words(90));
    let doc = SpeciesDocument { name: "Naja naja".into(), fields };
    let chunker = Chunker::new(ChunkingSettings::default());

    let a = chunker.chunk_document(&doc).expect("chunk");
    let b = chunker.chunk_document(&doc).expect("chunk");
    assert_eq!(a, b);
    // Habitat sorts before Toxicity; Toxicity 120/30 over 260 words -> 3 windows
    assert_eq!(a.iter().filter(|c| c.source_field == "Habitat").count(), 1);
    assert_eq!(a.iter().filter(|c| c.source_field == "Toxicity").count(), 3);
    assert_eq!(a[0].source_field, "Habitat");
    assert_eq!(a[0].contextualized("Naja naja"), format!("Naja naja - Habitat: {}", words(90)));
}
