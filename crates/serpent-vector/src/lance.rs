use async_trait::async_trait;
use lancedb::table::OptimizeAction;
use lancedb::Connection;
use std::path::Path;
use tracing::{debug, info, instrument};

use serpent_core::traits::VectorIndex;
use serpent_core::types::{IndexStats, SearchHit};
use serpent_core::{Error, Result};

use crate::schema::vector_dim;
use crate::search::vector_search;
use crate::table::{open_db, open_table, store_err};
use crate::writer::insert_passages;
use crate::check_batch;

/// In-process index on a LanceDB directory, upserting rows by passage id.
/// Rows are durable as soon as `add` returns; `persist` compacts the table.
pub struct LanceIndex {
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceIndex {
    pub async fn open(dir: &Path, table_name: &str, dim: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig("index dimension must be positive".into())); }
        let db = open_db(dir.to_string_lossy().as_ref()).await?;
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    async fn row_count(&self) -> Result<usize> {
        match open_table(&self.db, &self.table_name).await? {
            Some(table) => table.count_rows(None).await.map_err(store_err),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    #[instrument(name = "lance.add", skip_all, fields(table = %self.table_name, count = texts.len()))]
    async fn add(&self, vectors: &[Vec<f32>], texts: &[String]) -> Result<()> {
        check_batch(vectors, texts, self.dim)?;
        if texts.is_empty() { return Ok(()); }
        insert_passages(&self.db, &self.table_name, texts, vectors, self.dim).await
    }

    #[instrument(name = "lance.search", skip_all, fields(table = %self.table_name, k = k))]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!("query vector has {} dims, index has {}", query.len(), self.dim)));
        }
        if k == 0 { return Ok(Vec::new()); }
        let Some(table) = open_table(&self.db, &self.table_name).await? else { return Ok(Vec::new()) };
        if table.count_rows(None).await.map_err(store_err)? == 0 { return Ok(Vec::new()); }
        let hits = vector_search(&table, query, k).await?;
        debug!(hits = hits.len(), "lance search done");
        Ok(hits)
    }

    async fn persist(&self) -> Result<()> {
        if let Some(table) = open_table(&self.db, &self.table_name).await? {
            table.optimize(OptimizeAction::All).await.map_err(store_err)?;
            info!(table = %self.table_name, "lance table compacted");
        }
        Ok(())
    }

    async fn load(&self) -> Result<bool> {
        let Some(table) = open_table(&self.db, &self.table_name).await? else {
            info!(table = %self.table_name, "no existing lance table");
            return Ok(false);
        };
        let schema = table.schema().await.map_err(store_err)?;
        match vector_dim(&schema) {
            Some(d) if d == self.dim => {}
            found => {
                return Err(Error::InvalidConfig(format!(
                    "table {} stores {:?}-d vectors, embedder produces {}", self.table_name, found, self.dim
                )))
            }
        }
        let rows = table.count_rows(None).await.map_err(store_err)?;
        info!(table = %self.table_name, rows, "loaded lance table");
        Ok(rows > 0)
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            vector_count: self.row_count().await?,
            dimension: self.dim,
            backend: "lancedb".to_string(),
            collection: self.table_name.clone(),
        })
    }
}
