use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use mdkb_core::traits::VectorStore;
use mdkb_core::types::{
    ChunkId, CollectionStats, IndexRecord, Metric, StoreHit, FIELD_CHUNK_INDEX, FIELD_FILE_PATH, FIELD_SOURCE_FILE,
    FIELD_TEXT,
};
use mdkb_core::Error;

struct Collection {
    dimension: usize,
    metric: Metric,
    records: Vec<IndexRecord>,
}

/// Exact brute-force store kept in process memory. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Collection>>> {
        self.collections.lock().map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

/// Distance with the same conventions as LanceDB: cosine and dot are `1 - similarity`, l2 is squared.
pub fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        Metric::Cosine => {
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 { 1.0 } else { 1.0 - dot / (na * nb) }
        }
        Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        Metric::Dot => 1.0 - dot,
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn has_collection(&self, name: &str) -> Result<bool> { Ok(self.lock()?.contains_key(name)) }

    async fn create_collection(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        if dimension == 0 { return Err(Error::InvalidConfig("collection dimension must be > 0".into()).into()); }
        let mut cols = self.lock()?;
        if cols.contains_key(name) {
            return Err(Error::store("create collection", format!("collection {} already exists", name)).into());
        }
        cols.insert(name.to_string(), Collection { dimension, metric, records: Vec::new() });
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.lock()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("collection {}", name)).into())
    }

    async fn insert(&self, name: &str, records: &[IndexRecord]) -> Result<Vec<ChunkId>> {
        let mut cols = self.lock()?;
        let col = cols.get_mut(name).ok_or_else(|| Error::NotFound(format!("collection {}", name)))?;
        if let Some(bad) = records.iter().find(|r| r.vector.len() != col.dimension) {
            return Err(Error::DimensionMismatch { expected: col.dimension, actual: bad.vector.len() }.into());
        }
        col.records.extend_from_slice(records);
        Ok(records.iter().map(|r| r.id).collect())
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize, output_fields: &[&str]) -> Result<Vec<StoreHit>> {
        let cols = self.lock()?;
        let Some(col) = cols.get(name) else { return Ok(Vec::new()) };
        if col.records.is_empty() { return Ok(Vec::new()); }
        if query.len() != col.dimension {
            return Err(Error::DimensionMismatch { expected: col.dimension, actual: query.len() }.into());
        }
        let wants = |f: &str| output_fields.contains(&f);
        let mut hits: Vec<StoreHit> = col
            .records
            .iter()
            .map(|r| StoreHit {
                id: r.id,
                distance: distance(col.metric, query, &r.vector),
                text: wants(FIELD_TEXT).then(|| r.text.clone()),
                source_file: wants(FIELD_SOURCE_FILE).then(|| r.source_file.clone()),
                file_path: wants(FIELD_FILE_PATH).then(|| r.file_path.clone()),
                chunk_index: wants(FIELD_CHUNK_INDEX).then_some(r.chunk_index),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn stats(&self, name: &str) -> Result<CollectionStats> {
        Ok(match self.lock()?.get(name) {
            Some(col) => CollectionStats { exists: true, row_count: col.records.len(), dimension: Some(col.dimension) },
            None => CollectionStats::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_conventions() {
        assert!(distance(Metric::Cosine, &[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((distance(Metric::Cosine, &[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((distance(Metric::Cosine, &[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert!((distance(Metric::L2, &[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-6);
        assert!(distance(Metric::Dot, &[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    }
}
