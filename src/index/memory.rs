/// In-memory `VectorIndex` for tests and local experiments.
///
/// Collections live in a `HashMap` behind `std::sync::RwLock`.
/// Search is brute force over every stored vector; ties keep insertion order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{ChunkPayload, Distance, IndexError, PointFilter, PointId, RawPoint, VectorIndex};

struct StoredPoint {
    id: PointId,
    vector: Vec<f32>,
    payload: ChunkPayload,
}

struct Collection {
    vector_size: usize,
    distance: Distance,
    points: Vec<StoredPoint>,
}

pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a point. Creates a cosine collection sized to the
    /// vector when the collection does not exist yet.
    pub fn upsert(
        &self,
        collection: &str,
        id: PointId,
        vector: Vec<f32>,
        payload: ChunkPayload,
    ) -> Result<(), IndexError> {
        let mut collections = self.write()?;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                vector_size: vector.len(),
                distance: Distance::Cosine,
                points: Vec::new(),
            });
        if vector.len() != coll.vector_size {
            return Err(IndexError::InvalidPoint(format!(
                "point {} has dimension {}, collection expects {}",
                id,
                vector.len(),
                coll.vector_size
            )));
        }
        match coll.points.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                existing.vector = vector;
                existing.payload = payload;
            }
            None => coll.points.push(StoredPoint { id, vector, payload }),
        }
        Ok(())
    }

    pub fn point_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(|coll| coll.points.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, IndexError> {
        self.collections
            .write()
            .map_err(|_| IndexError::Http("in-memory index lock poisoned".to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, IndexError> {
        self.collections
            .read()
            .map_err(|_| IndexError::Http("in-memory index lock poisoned".to_string()))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(collection: &str) -> IndexError {
    IndexError::Api {
        status: 404,
        message: format!("Collection `{}` doesn't exist", collection),
    }
}

fn similarity(distance: Distance, a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    match distance {
        Distance::Dot => dot as f64,
        Distance::Cosine => {
            let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
                0.0
            } else {
                (dot / (mag_a * mag_b)) as f64
            }
        }
        // negated so that larger is always better
        Distance::Euclid => {
            let d: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
            -(d as f64)
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PointFilter>,
    ) -> Result<Vec<RawPoint>, IndexError> {
        let collections = self.read()?;
        let coll = collections.get(collection).ok_or_else(|| not_found(collection))?;
        if vector.len() != coll.vector_size {
            return Err(IndexError::Api {
                status: 400,
                message: format!(
                    "Vector dimension error: expected dim: {}, got {}",
                    coll.vector_size,
                    vector.len()
                ),
            });
        }

        let mut scored: Vec<(f64, &StoredPoint)> = coll
            .points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| (similarity(coll.distance, vector, &p.vector), p))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, p)| RawPoint {
                id: p.id.clone(),
                score: Some(score),
                payload: Some(p.payload.clone()),
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<RawPoint>, IndexError> {
        let collections = self.read()?;
        let coll = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(coll
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .take(limit)
            .map(|p| RawPoint {
                id: p.id.clone(),
                score: None,
                payload: Some(p.payload.clone()),
            })
            .collect())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, IndexError> {
        Ok(self.read()?.contains_key(collection))
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<bool, IndexError> {
        let mut collections = self.write()?;
        if collections.contains_key(collection) {
            return Ok(false);
        }
        collections.insert(
            collection.to_string(),
            Collection {
                vector_size,
                distance,
                points: Vec::new(),
            },
        );
        Ok(true)
    }
}
