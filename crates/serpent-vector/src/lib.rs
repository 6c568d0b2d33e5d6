use std::path::Path;
use std::sync::Arc;
use tracing::info;

use serpent_core::config::{resolve_with_base, VectorBackend, VectorStoreSettings};
use serpent_core::traits::VectorIndex;
use serpent_core::{Error, Result};

pub mod lance;
pub mod qdrant;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use lance::LanceIndex;
pub use qdrant::QdrantIndex;

/// Parallel arrays of equal length whose vectors all have `dim` entries.
pub(crate) fn check_batch(vectors: &[Vec<f32>], texts: &[String], dim: usize) -> Result<()> {
    if vectors.len() != texts.len() {
        return Err(Error::InvalidInput(format!("{} vectors for {} texts", vectors.len(), texts.len())));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(Error::InvalidInput(format!("vector {i} has {} dims, index has {dim}", v.len())));
    }
    Ok(())
}

/// Open the configured backend. Relative LanceDB paths resolve against `base`.
pub async fn open_index(settings: &VectorStoreSettings, base: &Path, dim: usize) -> Result<Arc<dyn VectorIndex>> {
    match settings.backend {
        VectorBackend::Lance => {
            let dir = resolve_with_base(base, &settings.lance_dir);
            info!(dir = %dir.display(), table = %settings.collection, "opening lance index");
            Ok(Arc::new(LanceIndex::open(&dir, &settings.collection, dim).await?))
        }
        VectorBackend::Qdrant => {
            let url = settings
                .qdrant_url
                .as_deref()
                .ok_or_else(|| Error::InvalidConfig("vector_store.qdrant_url is required for the qdrant backend".into()))?;
            info!(url, collection = %settings.collection, "connecting to qdrant");
            Ok(Arc::new(QdrantIndex::connect(url, settings.qdrant_api_key.as_deref(), &settings.collection, dim)?))
        }
    }
}
