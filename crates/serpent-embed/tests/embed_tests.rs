use serpent_core::config::EmbeddingSettings;
use serpent_core::error::ErrorKind;
use serpent_core::traits::Embedder;
use serpent_embed::{get_default_embedder, resolve_model_dir, BatchingEmbedder, FakeEmbedder};

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("King cobra habitat note {i}")).collect()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(&EmbeddingSettings::default()).expect("embedder");
    let input = vec!["Naja naja lives in rice paddies".to_string(), "Naja naja lives in rice paddies".to_string()];
    let embs = embedder.embed_batch(&input).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 384, "embedding dim follows settings");

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in embs[0].iter().zip(embs[1].iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batching_does_not_change_vectors() {
    let whole = BatchingEmbedder::new(Box::new(FakeEmbedder::new(64)), 100);
    let split = BatchingEmbedder::new(Box::new(FakeEmbedder::new(64)), 3);
    let input = texts(10);
    let a = whole.embed_many(&input).expect("whole");
    let b = split.embed_many(&input).expect("split");
    assert_eq!(a, b);
    assert_eq!(split.embed_one(&input[7]).expect("one"), a[7]);
}

#[test]
fn empty_input_yields_no_vectors() {
    let embedder = BatchingEmbedder::new(Box::new(FakeEmbedder::new(16)), 4);
    assert!(embedder.embed_many(&[]).expect("empty").is_empty());
}

struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn model_id(&self) -> &str { "short" }
    fn dim(&self) -> usize { 8 }
    fn embed_batch(&self, texts: &[String]) -> serpent_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
    }
}

#[test]
fn wrong_dimension_from_model_is_reported() {
    let embedder = BatchingEmbedder::new(Box::new(ShortEmbedder), 2);
    let err = embedder.embed_many(&texts(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}

#[test]
fn missing_configured_model_dir_is_model_unavailable() {
    let err = resolve_model_dir(Some("/definitely/not/here"), "intfloat/multilingual-e5-small").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}
