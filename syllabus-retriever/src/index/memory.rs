//! In-process vector backend.
//!
//! Points live in a map guarded by a [`tokio::sync::RwLock`]; search is a
//! brute-force cosine similarity scan. Useful for tests and for applications
//! that embed the library without running a vector server. Nothing is
//! persisted.

use super::{IndexedPoint, Payload, PointFilter, PointId, ScoredPoint, StoredPoint, VectorBackend};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collection {
    dimension: Option<usize>,
    points: BTreeMap<PointId, (Vec<f32>, Payload)>,
}

/// Vector backend that keeps everything in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    collection: RwLock<Collection>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(Collection::default()),
        }
    }

    /// Dimension of the collection, if it has been created
    pub async fn dimension(&self) -> Option<usize> {
        self.collection.read().await.dimension
    }

    /// Number of stored points
    pub async fn len(&self) -> usize {
        self.collection.read().await.points.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    fn describe(&self) -> String {
        format!("memory/{}", self.name)
    }

    async fn ensure_collection(&self, dimension: usize) -> anyhow::Result<bool> {
        let mut collection = self.collection.write().await;
        match collection.dimension {
            Some(existing) if existing != dimension => anyhow::bail!(
                "collection {} has dimension {existing}, expected {dimension}",
                self.name
            ),
            Some(_) => Ok(false),
            None => {
                collection.dimension = Some(dimension);
                Ok(true)
            }
        }
    }

    async fn upsert(&self, points: Vec<IndexedPoint>) -> anyhow::Result<()> {
        let mut collection = self.collection.write().await;
        let Some(dimension) = collection.dimension else {
            anyhow::bail!("collection {} does not exist", self.name);
        };

        for point in &points {
            if point.vector.len() != dimension {
                anyhow::bail!(
                    "point {} has {} dimensions, collection has {dimension}",
                    point.id,
                    point.vector.len()
                );
            }
        }
        for point in points {
            collection
                .points
                .insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>> {
        let collection = self.collection.read().await;

        let mut hits: Vec<ScoredPoint> = collection
            .points
            .iter()
            .filter(|(_, (_, payload))| filter.matches(payload))
            .map(|(id, (stored, payload))| ScoredPoint {
                id: *id,
                score: cosine_similarity(vector, stored),
                payload: payload.clone(),
            })
            .collect();

        // Sort by similarity score (descending)
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn scroll(&self, filter: &PointFilter, limit: usize) -> anyhow::Result<Vec<StoredPoint>> {
        let collection = self.collection.read().await;

        Ok(collection
            .points
            .iter()
            .filter(|(_, (_, payload))| filter.matches(payload))
            .take(limit)
            .map(|(id, (_, payload))| StoredPoint {
                id: *id,
                payload: payload.clone(),
            })
            .collect())
    }

    async fn delete(&self, ids: &[PointId]) -> anyhow::Result<()> {
        let mut collection = self.collection.write().await;
        for id in ids {
            collection.points.remove(id);
        }
        Ok(())
    }

    async fn count(&self, filter: &PointFilter) -> anyhow::Result<usize> {
        let collection = self.collection.read().await;
        Ok(collection
            .points
            .values()
            .filter(|(_, payload)| filter.matches(payload))
            .count())
    }
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a.sqrt() * norm_b.sqrt())
}
