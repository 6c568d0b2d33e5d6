use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use serpent_core::Result;
use crate::schema::{build_passage_schema, ID_COLUMN};
use crate::table::{open_table, store_err};

const INSERT_BATCH: usize = 1000;

/// Stable row id for a passage.
pub fn passage_id(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}

pub(crate) fn passages_to_record_batch(texts: &[String], vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	let ids: Vec<String> = texts.iter().map(|t| passage_id(t)).collect();
	let rows: Vec<Option<Vec<Option<f32>>>> = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect())).collect();
	RecordBatch::try_new(build_passage_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(texts.to_vec())),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(rows.into_iter(), dim as i32)),
	]).map_err(store_err)
}

/// Upsert passages keyed on `id`, creating the table on first write.
/// Repeated texts, within a call or across calls, map to one row.
pub(crate) async fn insert_passages(db: &Connection, table_name: &str, texts: &[String], vectors: &[Vec<f32>], dim: usize) -> Result<()> {
	let mut seen = HashSet::new();
	let (texts, vectors): (Vec<String>, Vec<Vec<f32>>) = texts
		.iter()
		.zip(vectors)
		.filter(|(t, _)| seen.insert(passage_id(t)))
		.map(|(t, v)| (t.clone(), v.clone()))
		.unzip();
	info!(table = table_name, count = texts.len(), "indexing passages into LanceDB");
	let pb = ProgressBar::new(texts.len() as u64);
	if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%)") {
		pb.set_style(style.progress_chars("#>-"));
	}
	for (text_batch, vector_batch) in texts.chunks(INSERT_BATCH).zip(vectors.chunks(INSERT_BATCH)) {
		let batch = passages_to_record_batch(text_batch, vector_batch, dim)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		match open_table(db, table_name).await? {
			Some(table) => {
				let mut mi = table.merge_insert(&[ID_COLUMN]);
				mi.when_matched_update_all(None).when_not_matched_insert_all();
				let _ = mi.execute(reader).await.map_err(store_err)?;
			}
			None => { db.create_table(table_name, reader).execute().await.map_err(store_err)?; }
		}
		pb.inc(text_batch.len() as u64);
		debug!(table = table_name, rows = text_batch.len(), "upserted batch");
	}
	pb.finish_and_clear();
	Ok(())
}
