use async_trait::async_trait;
use qdrant_client::prelude::{QdrantClient, QdrantClientConfig};
use qdrant_client::qdrant::{
    self, value::Kind, vectors_config::Config, CountPoints, CreateCollection, Distance, PointStruct, SearchPoints,
    VectorParams, VectorsConfig,
};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use serpent_core::traits::VectorIndex;
use serpent_core::types::{IndexStats, SearchHit};
use serpent_core::{Error, Result};

use crate::check_batch;

const TEXT_KEY: &str = "text";

fn remote_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Persistence(format!("qdrant: {e}"))
}

/// Point id derived from the passage text.
fn point_id(text: &str) -> u64 {
    let hash = blake3::hash(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Managed remote index on a Qdrant collection (cosine distance).
/// The service owns durability, so `persist` has nothing to do.
pub struct QdrantIndex {
    client: QdrantClient,
    collection_name: String,
    dim: usize,
    created: OnceCell<()>,
}

impl QdrantIndex {
    pub fn connect(url: &str, api_key: Option<&str>, collection_name: &str, dim: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig("index dimension must be positive".into())); }
        let mut config = QdrantClientConfig::from_url(url);
        if let Some(key) = api_key { config.set_api_key(key); }
        let client = QdrantClient::new(Some(config)).map_err(remote_err)?;
        Ok(Self { client, collection_name: collection_name.to_string(), dim, created: OnceCell::new() })
    }

    async fn collection_exists(&self) -> Result<bool> {
        let response = self.client.list_collections().await.map_err(remote_err)?;
        Ok(response.collections.iter().any(|c| c.name == self.collection_name))
    }

    #[instrument(name = "qdrant.ensure_collection", skip(self), fields(collection = %self.collection_name))]
    async fn ensure_collection(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| async {
                if self.collection_exists().await? { return Ok(()); }
                self.client
                    .create_collection(&CreateCollection {
                        collection_name: self.collection_name.clone(),
                        vectors_config: Some(VectorsConfig {
                            config: Some(Config::Params(VectorParams {
                                size: self.dim as u64,
                                distance: Distance::Cosine as i32,
                                ..Default::default()
                            })),
                        }),
                        ..Default::default()
                    })
                    .await
                    .map_err(remote_err)?;
                info!("created qdrant collection");
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Vector size the existing collection was created with, if it is a single unnamed vector.
    async fn collection_dim(&self) -> Result<Option<usize>> {
        let response = self.client.collection_info(&self.collection_name).await.map_err(remote_err)?;
        let config = response
            .result
            .and_then(|info| info.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        Ok(match config {
            Some(Config::Params(params)) => Some(params.size as usize),
            _ => None,
        })
    }

    async fn point_count(&self) -> Result<usize> {
        if !self.collection_exists().await? { return Ok(0); }
        let response = self
            .client
            .count(&CountPoints { collection_name: self.collection_name.clone(), filter: None, exact: Some(true) })
            .await
            .map_err(remote_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    #[instrument(name = "qdrant.add", skip_all, fields(collection = %self.collection_name, count = texts.len()))]
    async fn add(&self, vectors: &[Vec<f32>], texts: &[String]) -> Result<()> {
        check_batch(vectors, texts, self.dim)?;
        if texts.is_empty() { return Ok(()); }
        self.ensure_collection().await?;
        let points: Vec<PointStruct> = texts
            .iter()
            .zip(vectors)
            .map(|(text, vector)| PointStruct {
                id: Some(point_id(text).into()),
                vectors: Some(vector.clone().into()),
                payload: HashMap::from([(TEXT_KEY.to_string(), qdrant::Value::from(text.clone()))]),
            })
            .collect();
        self.client
            .upsert_points_blocking(&self.collection_name, points, None)
            .await
            .map_err(remote_err)?;
        info!("saved points to qdrant");
        Ok(())
    }

    #[instrument(name = "qdrant.search", skip_all, fields(collection = %self.collection_name, k = k))]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!("query vector has {} dims, index has {}", query.len(), self.dim)));
        }
        if k == 0 || !self.collection_exists().await? { return Ok(Vec::new()); }
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection_name.clone(),
                vector: query.to_vec(),
                limit: k as u64,
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(remote_err)?;
        let hits: Vec<SearchHit> = response
            .result
            .into_iter()
            .filter_map(|point| match point.payload.get(TEXT_KEY).and_then(|v| v.kind.clone()) {
                Some(Kind::StringValue(text)) => Some(SearchHit { text, score: point.score }),
                _ => None,
            })
            .collect();
        debug!(hits = hits.len(), "qdrant search done");
        Ok(hits)
    }

    async fn persist(&self) -> Result<()> { Ok(()) }

    async fn load(&self) -> Result<bool> {
        if !self.collection_exists().await? {
            info!(collection = %self.collection_name, "no existing qdrant collection");
            return Ok(false);
        }
        match self.collection_dim().await? {
            Some(d) if d == self.dim => {}
            found => {
                return Err(Error::InvalidConfig(format!(
                    "collection {} stores {:?}-d vectors, embedder produces {}", self.collection_name, found, self.dim
                )))
            }
        }
        let count = self.point_count().await?;
        info!(collection = %self.collection_name, count, "checked qdrant collection");
        Ok(count > 0)
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            vector_count: self.point_count().await?,
            dimension: self.dim,
            backend: "qdrant".to_string(),
            collection: self.collection_name.clone(),
        })
    }
}
