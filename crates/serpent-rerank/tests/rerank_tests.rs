use serpent_core::error::ErrorKind;
use serpent_core::traits::CrossEncoder;
use serpent_core::types::SearchHit;
use serpent_rerank::{fuse, LexicalScorer, Reranker};

fn hit(text: &str, score: f32) -> SearchHit {
    SearchHit { text: text.to_string(), score }
}

/// Scores passages by a number embedded in them: "p:0.9" scores 0.9.
struct TaggedScores;

impl CrossEncoder for TaggedScores {
    fn model_id(&self) -> &str { "tagged" }
    fn score_pairs(&self, _query: &str, passages: &[String]) -> serpent_core::Result<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| p.split("p:").nth(1).and_then(|s| s.parse().ok()).unwrap_or(0.0))
            .collect())
    }
}

struct Broken;

impl CrossEncoder for Broken {
    fn model_id(&self) -> &str { "broken" }
    fn score_pairs(&self, _query: &str, _passages: &[String]) -> serpent_core::Result<Vec<f32>> {
        Ok(vec![0.5])
    }
}

fn pool() -> Vec<SearchHit> {
    vec![hit("a p:0.1", 0.9), hit("b p:0.8", 0.7), hit("c p:0.5", 0.5), hit("d p:0.9", 0.3)]
}

fn texts(hits: &[serpent_core::types::RerankedHit]) -> Vec<&str> {
    hits.iter().map(|h| &h.text[..1]).collect()
}

#[test]
fn alpha_zero_keeps_retrieval_order() {
    let out = Reranker::new(Box::new(TaggedScores)).rerank("q", &pool(), 0.0, 10).unwrap();
    assert_eq!(texts(&out), ["a", "b", "c", "d"]);
}

#[test]
fn alpha_one_is_pure_cross_encoder_order() {
    let out = Reranker::new(Box::new(TaggedScores)).rerank("q", &pool(), 1.0, 10).unwrap();
    assert_eq!(texts(&out), ["d", "b", "c", "a"]);
}

#[test]
fn fused_score_is_weighted_sum_and_truncated() {
    let out = Reranker::new(Box::new(TaggedScores)).rerank("q", &pool(), 0.7, 2).unwrap();
    assert_eq!(out.len(), 2);
    for h in &out {
        let expected = 0.7 * h.cross_encoder_score + 0.3 * h.original_score;
        assert!((h.combined_score - expected).abs() < 1e-6);
    }
    assert!(out[0].combined_score >= out[1].combined_score);
    assert_eq!(texts(&out), ["b", "d"]);
}

#[test]
fn combined_score_is_monotonic_in_cross_encoder_score() {
    let candidates = vec![hit("x", 0.4); 5];
    let ce = [0.0, 0.2, 0.4, 0.6, 1.0];
    for alpha in [0.1f32, 0.5, 0.9] {
        let out = fuse(&candidates, &ce, alpha, 5).unwrap();
        let mut by_ce = out.clone();
        by_ce.sort_by(|a, b| a.cross_encoder_score.total_cmp(&b.cross_encoder_score));
        for w in by_ce.windows(2) { assert!(w[0].combined_score <= w[1].combined_score); }
    }
}

#[test]
fn ties_keep_original_order() {
    let candidates = vec![hit("first", 0.5), hit("second", 0.5), hit("third", 0.5)];
    let out = fuse(&candidates, &[0.3, 0.3, 0.3], 0.7, 3).unwrap();
    let order: Vec<&str> = out.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(order, ["first", "second", "third"]);
}

#[test]
fn alpha_outside_unit_interval_is_invalid_input() {
    let reranker = Reranker::new(Box::new(TaggedScores));
    for alpha in [-0.1f32, 1.5, f32::NAN] {
        assert_eq!(reranker.rerank("q", &pool(), alpha, 3).unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}

#[test]
fn empty_pool_yields_empty_result() {
    assert!(Reranker::new(Box::new(TaggedScores)).rerank("q", &[], 0.7, 5).unwrap().is_empty());
}

#[test]
fn short_score_vector_is_model_failure() {
    let err = Reranker::new(Box::new(Broken)).rerank("q", &pool(), 0.7, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}

#[test]
fn relevant_chunk_wins_regardless_of_similarity_rank() {
    let mut candidates: Vec<SearchHit> = (0..9)
        .map(|i| hit(&format!("Python species {i} prefer humid rainforest canopies"), 0.6 - i as f32 * 0.01))
        .collect();
    candidates.push(hit("Cobra - Toxicity: the cobra is highly venomous, its neurotoxin is deadly", 0.40));

    let out = Reranker::new(Box::new(LexicalScorer)).rerank("Is cobra venomous?", &candidates, 0.7, 5).unwrap();
    assert!(out[0].text.starts_with("Cobra - Toxicity"), "got {:?}", out[0].text);
    assert_eq!(out.len(), 5);
}
