use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use serpent_core::types::SearchHit;
use serpent_core::{Error, Result};
use crate::schema::TEXT_COLUMN;
use crate::table::store_err;

/// Cosine nearest neighbours; score is `1 - _distance`, highest first.
pub(crate) async fn vector_search(table: &Table, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
	let mut stream = table
		.vector_search(query.to_vec())
		.map_err(store_err)?
		.distance_type(DistanceType::Cosine)
		.limit(k)
		.execute()
		.await
		.map_err(store_err)?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await.map_err(store_err)? {
		decode_hits(&batch, &mut hits)?;
	}
	hits.sort_by(|a, b| b.score.total_cmp(&a.score));
	hits.truncate(k);
	Ok(hits)
}

fn decode_hits(batch: &RecordBatch, out: &mut Vec<SearchHit>) -> Result<()> {
	let texts = batch
		.column_by_name(TEXT_COLUMN)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::Persistence("text column missing from search results".into()))?;
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::Persistence("_distance column missing from search results".into()))?;
	for i in 0..batch.num_rows() {
		if texts.is_null(i) { continue; }
		out.push(SearchHit { text: texts.value(i).to_string(), score: 1.0 - distances.value(i) });
	}
	Ok(())
}
