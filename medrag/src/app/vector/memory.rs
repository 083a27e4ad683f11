use crate::{
    core::{
        model::{IndexEntry, ScoredChunk, VectorCollection},
        vector::VectorDb,
    },
    err,
    error::MedragError,
};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

/// In-process vector store using exhaustive cosine search.
/// Contents are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryVectorDb {
    collections: Arc<RwLock<HashMap<String, MemoryCollection>>>,
}

#[derive(Debug)]
struct MemoryCollection {
    size: usize,
    entries: Vec<IndexEntry>,
}

impl MemoryVectorDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VectorDb for MemoryVectorDb {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn create_vector_collection(&self, name: &str, size: usize) -> Result<(), MedragError> {
        let mut collections = self.collections.write().await;

        if collections.contains_key(name) {
            return err!(AlreadyExists, "Vector collection '{name}'");
        }

        collections.insert(
            name.to_string(),
            MemoryCollection {
                size,
                entries: vec![],
            },
        );

        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<VectorCollection, MedragError> {
        match self.collections.read().await.get(name) {
            Some(collection) => Ok(VectorCollection::new(name, collection.size)),
            None => err!(DoesNotExist, "Vector collection '{name}'"),
        }
    }

    async fn delete_vector_collection(&self, name: &str) -> Result<(), MedragError> {
        match self.collections.write().await.remove(name) {
            Some(_) => Ok(()),
            None => err!(DoesNotExist, "Vector collection '{name}'"),
        }
    }

    async fn create_default_collection(&self, name: &str, size: usize) -> Result<(), MedragError> {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection {
                size,
                entries: vec![],
            });
        Ok(())
    }

    async fn query(
        &self,
        search: Vec<f32>,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, MedragError> {
        let collections = self.collections.read().await;

        let Some(collection) = collections.get(collection) else {
            return err!(DoesNotExist, "Vector collection '{collection}'");
        };

        if search.len() != collection.size {
            return err!(
                InvalidEmbeddingModel,
                "Query vector of size {} in collection of size {}",
                search.len(),
                collection.size
            );
        }

        let mut scored = collection
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&search, &entry.vector), entry))
            .collect::<Vec<_>>();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    async fn insert_embeddings(
        &self,
        collection: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<(), MedragError> {
        let mut collections = self.collections.write().await;

        let Some(target) = collections.get_mut(collection) else {
            return err!(DoesNotExist, "Vector collection '{collection}'");
        };

        if let Some(entry) = entries.iter().find(|e| e.vector.len() != target.size) {
            return err!(
                InvalidEmbeddingModel,
                "Vector of size {} in collection of size {}",
                entry.vector.len(),
                target.size
            );
        }

        debug!("Inserting {} vectors to {collection}", entries.len());

        target.entries.extend(entries);

        Ok(())
    }

    async fn delete_embeddings(&self, collection: &str, source: &str) -> Result<(), MedragError> {
        let mut collections = self.collections.write().await;

        let Some(target) = collections.get_mut(collection) else {
            return err!(DoesNotExist, "Vector collection '{collection}'");
        };

        target.entries.retain(|e| e.chunk.source != source);

        Ok(())
    }

    async fn count_vectors(
        &self,
        collection: &str,
        source: &str,
        hash: Option<&str>,
    ) -> Result<usize, MedragError> {
        let collections = self.collections.read().await;

        let Some(target) = collections.get(collection) else {
            return err!(DoesNotExist, "Vector collection '{collection}'");
        };

        Ok(target
            .entries
            .iter()
            .filter(|e| e.chunk.source == source && hash.map_or(true, |h| e.hash == h))
            .count())
    }
}

/// Cosine similarity of two vectors of equal length. 0 if either has no magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::model::Chunk, error::MedragErr};

    fn entry(source: &str, index: usize, vector: Vec<f32>, hash: &str) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                content: format!("{source} {index}"),
                source: source.to_string(),
                page: None,
                index,
            },
            vector,
            hash: hash.to_string(),
        }
    }

    #[test]
    fn cosine() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(0.0, cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]));
    }

    #[tokio::test]
    async fn ranks_by_similarity() {
        let db = MemoryVectorDb::new();
        db.create_default_collection("test", 2).await.unwrap();

        db.insert_embeddings(
            "test",
            vec![
                entry("a.pdf", 0, vec![0.0, 1.0], "h"),
                entry("a.pdf", 1, vec![1.0, 0.0], "h"),
                entry("b.pdf", 0, vec![1.0, 1.0], "h"),
            ],
        )
        .await
        .unwrap();

        let results = db.query(vec![1.0, 0.1], "test", 2).await.unwrap();

        assert_eq!(2, results.len());
        assert_eq!(("a.pdf", 1), (results[0].chunk.source.as_str(), results[0].chunk.index));
        assert_eq!("b.pdf", results[1].chunk.source);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn counts_and_deletes_by_source() {
        let db = MemoryVectorDb::new();
        db.create_default_collection("test", 2).await.unwrap();

        db.insert_embeddings(
            "test",
            vec![
                entry("a.pdf", 0, vec![0.0, 1.0], "old"),
                entry("a.pdf", 1, vec![1.0, 0.0], "old"),
                entry("b.pdf", 0, vec![1.0, 1.0], "new"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(2, db.count_vectors("test", "a.pdf", None).await.unwrap());
        assert_eq!(2, db.count_vectors("test", "a.pdf", Some("old")).await.unwrap());
        assert_eq!(0, db.count_vectors("test", "a.pdf", Some("new")).await.unwrap());

        db.delete_embeddings("test", "a.pdf").await.unwrap();

        assert_eq!(0, db.count_vectors("test", "a.pdf", None).await.unwrap());
        assert_eq!(1, db.count_vectors("test", "b.pdf", None).await.unwrap());
    }

    #[tokio::test]
    async fn default_collection_is_idempotent() {
        let db = MemoryVectorDb::new();

        db.create_default_collection("test", 3).await.unwrap();
        db.create_default_collection("test", 5).await.unwrap();

        assert_eq!(3, db.get_collection("test").await.unwrap().size);
        assert!(db.create_vector_collection("test", 3).await.is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions() {
        let db = MemoryVectorDb::new();
        db.create_default_collection("test", 3).await.unwrap();

        let insert = db
            .insert_embeddings("test", vec![entry("a.pdf", 0, vec![1.0], "h")])
            .await
            .unwrap_err();
        assert!(matches!(insert.error, MedragErr::InvalidEmbeddingModel(_)));

        let query = db.query(vec![1.0, 0.0], "test", 3).await.unwrap_err();
        assert!(matches!(query.error, MedragErr::InvalidEmbeddingModel(_)));
    }

    #[tokio::test]
    async fn missing_collection() {
        let db = MemoryVectorDb::new();

        let error = db.get_collection("nope").await.unwrap_err();
        assert!(matches!(error.error, MedragErr::DoesNotExist(_)));
        assert!(db.delete_vector_collection("nope").await.is_err());
    }
}
