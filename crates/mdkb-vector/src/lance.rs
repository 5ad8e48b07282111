//! LanceDB-backed `VectorStore`.
//!
//! One Lance table per collection under `db_path`. The connection opens
//! lazily on first use and is dropped by `close`.
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::Schema;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use tokio::sync::Mutex;
use tracing::{debug, info};

use mdkb_core::traits::VectorStore;
use mdkb_core::types::{
    ChunkId, CollectionStats, IndexRecord, Metric, StoreHit, FIELD_CHUNK_INDEX, FIELD_FILE_PATH, FIELD_SOURCE_FILE,
    FIELD_TEXT,
};
use mdkb_core::Error;

use crate::schema::{build_arrow_schema, schema_metric, vector_dimension, FIELD_ID};

pub struct LanceStore {
    uri: String,
    conn: Mutex<Option<Connection>>,
}

impl LanceStore {
    pub fn new(uri: impl Into<String>) -> Self { Self { uri: uri.into(), conn: Mutex::new(None) } }

    pub fn uri(&self) -> &str { &self.uri }

    async fn connection(&self) -> Result<Connection> {
        let mut guard = self.conn.lock().await;
        if let Some(c) = guard.as_ref() { return Ok(c.clone()); }
        debug!(uri = %self.uri, "opening LanceDB connection");
        let c = connect(&self.uri)
            .execute()
            .await
            .map_err(|e| Error::store("connect", e))?;
        *guard = Some(c.clone());
        Ok(c)
    }

    async fn open(&self, name: &str) -> Result<Option<Table>> {
        let conn = self.connection().await?;
        if !conn.table_names().execute().await?.iter().any(|n| n == name) { return Ok(None); }
        Ok(Some(conn.open_table(name).execute().await?))
    }
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::Cosine => DistanceType::Cosine,
        Metric::L2 => DistanceType::L2,
        Metric::Dot => DistanceType::Dot,
    }
}

fn records_to_batch(schema: Arc<Schema>, records: &[IndexRecord], dimension: usize) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(records.len());
    let mut texts = Vec::with_capacity(records.len());
    let mut source_files = Vec::with_capacity(records.len());
    let mut file_paths = Vec::with_capacity(records.len());
    let mut chunk_indices = Vec::with_capacity(records.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
    for r in records {
        if r.vector.len() != dimension {
            return Err(Error::DimensionMismatch { expected: dimension, actual: r.vector.len() }.into());
        }
        ids.push(r.id);
        texts.push(r.text.as_str());
        source_files.push(r.source_file.as_str());
        file_paths.push(r.file_path.as_str());
        let chunk_index = i32::try_from(r.chunk_index)
            .map_err(|_| Error::store("insert", format!("chunk_index {} does not fit in Int32", r.chunk_index)))?;
        chunk_indices.push(chunk_index);
        vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(schema, vec![
        Arc::new(Int64Array::from(ids)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
            vectors.into_iter(),
            dimension as i32,
        )),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(source_files)),
        Arc::new(StringArray::from(file_paths)),
        Arc::new(Int32Array::from(chunk_indices)),
    ])?;
    Ok(batch)
}

fn string_at(batch: &RecordBatch, name: &str, row: usize) -> Option<String> {
    let col = batch.column_by_name(name)?.as_any().downcast_ref::<StringArray>()?;
    (!col.is_null(row)).then(|| col.value(row).to_string())
}

fn hits_from_batch(batch: &RecordBatch, output_fields: &[&str], out: &mut Vec<StoreHit>) -> Result<()> {
    let ids = batch
        .column_by_name(FIELD_ID)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow!("search result has no id column"))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("search result has no _distance column"))?;
    let chunk_indices = batch.column_by_name(FIELD_CHUNK_INDEX).and_then(|c| c.as_any().downcast_ref::<Int32Array>());
    let wants = |f: &str| output_fields.contains(&f);
    for i in 0..batch.num_rows() {
        out.push(StoreHit {
            id: ids.value(i),
            distance: distances.value(i),
            text: if wants(FIELD_TEXT) { string_at(batch, FIELD_TEXT, i) } else { None },
            source_file: if wants(FIELD_SOURCE_FILE) { string_at(batch, FIELD_SOURCE_FILE, i) } else { None },
            file_path: if wants(FIELD_FILE_PATH) { string_at(batch, FIELD_FILE_PATH, i) } else { None },
            chunk_index: if wants(FIELD_CHUNK_INDEX) { chunk_indices.map(|c| c.value(i) as usize) } else { None },
        });
    }
    Ok(())
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn has_collection(&self, name: &str) -> Result<bool> {
        let conn = self.connection().await?;
        Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
    }

    async fn create_collection(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        if dimension == 0 { return Err(Error::InvalidConfig("collection dimension must be > 0".into()).into()); }
        let conn = self.connection().await?;
        let schema = build_arrow_schema(dimension, metric);
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        conn.create_table(name, Box::new(iter))
            .execute()
            .await
            .map_err(|e| Error::store("create collection", e))?;
        info!(collection = name, dimension, metric = metric.as_str(), "Created collection");
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let conn = self.connection().await?;
        conn.drop_table(name, &[]).await.map_err(|e| Error::store("drop collection", e))?;
        Ok(())
    }

    async fn insert(&self, name: &str, records: &[IndexRecord]) -> Result<Vec<ChunkId>> {
        if records.is_empty() { return Ok(Vec::new()); }
        let table = self.open(name).await?.ok_or_else(|| Error::NotFound(format!("collection {}", name)))?;
        let schema = table.schema().await?;
        let dimension = vector_dimension(&schema).context("collection schema has no vector column")?;
        let batch = records_to_batch(schema.clone(), records, dimension)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        table.add(reader).execute().await.map_err(|e| Error::store("insert", e))?;
        Ok(records.iter().map(|r| r.id).collect())
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize, output_fields: &[&str]) -> Result<Vec<StoreHit>> {
        let Some(table) = self.open(name).await? else { return Ok(Vec::new()) };
        if limit == 0 || table.count_rows(None).await? == 0 { return Ok(Vec::new()); }
        let schema = table.schema().await?;
        if let Some(dim) = vector_dimension(&schema) {
            if dim != query.len() { return Err(Error::DimensionMismatch { expected: dim, actual: query.len() }.into()); }
        }
        let mut stream = table
            .vector_search(query.to_vec())?
            .distance_type(distance_type(schema_metric(&schema)))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| Error::store("search", e))?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits_from_batch(&batch, output_fields, &mut hits)?;
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn stats(&self, name: &str) -> Result<CollectionStats> {
        let Some(table) = self.open(name).await? else { return Ok(CollectionStats::default()) };
        let row_count = table.count_rows(None).await?;
        let schema = table.schema().await?;
        Ok(CollectionStats { exists: true, row_count, dimension: vector_dimension(&schema) })
    }

    async fn close(&self) -> Result<()> {
        self.conn.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: ChunkId, chunk_index: usize) -> IndexRecord {
        IndexRecord {
            id,
            vector: vec![1.0, 0.0],
            text: "t".into(),
            source_file: "a.md".into(),
            file_path: "/a.md".into(),
            chunk_index,
        }
    }

    #[test]
    fn batch_carries_chunk_index() {
        let batch = records_to_batch(build_arrow_schema(2, Metric::Cosine), &[record(0, 7)], 2).expect("batch");
        let col = batch.column_by_name(FIELD_CHUNK_INDEX).unwrap().as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(col.value(0), 7);
    }

    #[test]
    fn oversized_chunk_index_is_rejected() {
        let too_big = i32::MAX as usize + 1;
        let err = records_to_batch(build_arrow_schema(2, Metric::Cosine), &[record(0, too_big)], 2).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Store { .. })), "{err:#}");
    }
}
