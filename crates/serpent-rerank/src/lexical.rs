use std::collections::HashSet;

use serpent_core::traits::CrossEncoder;
use serpent_core::Result;

/// Token-overlap scorer standing in for the cross-encoder in tests and
/// offline runs. Score is the share of distinct query terms found in the
/// passage, so it stays in `[0,1]`.
pub struct LexicalScorer;

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

impl CrossEncoder for LexicalScorer {
    fn model_id(&self) -> &str { "lexical-overlap" }

    fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let query_terms = terms(query);
        if query_terms.is_empty() { return Ok(vec![0.0; passages.len()]); }
        Ok(passages
            .iter()
            .map(|p| {
                let passage_terms = terms(p);
                query_terms.intersection(&passage_terms).count() as f32 / query_terms.len() as f32
            })
            .collect())
    }
}
