use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{IndexingError, RetrievalError};
use crate::models::Chunk;
use crate::store::{IndexHandle, StoreHit};
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

struct StoredChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Process-local store ranking chunks by cosine similarity to the query.
pub struct InMemoryVectorStore<E> {
    embedder: E,
    collections: HashMap<Uuid, Vec<StoredChunk>>,
}

impl<E: Embedder> InMemoryVectorStore<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            collections: HashMap::new(),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }
}

#[async_trait]
impl<E: Embedder> VectorStore for InMemoryVectorStore<E> {
    async fn embed_and_store(&mut self, chunks: &[Chunk]) -> Result<IndexHandle, IndexingError> {
        if chunks.is_empty() {
            return Err(IndexingError::EmptyChunks);
        }

        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if chunks.len() != embeddings.len() {
            return Err(IndexingError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let stored = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk { chunk, embedding })
            .collect::<Vec<_>>();

        let handle = IndexHandle::new(stored.len());
        self.collections.insert(handle.id(), stored);
        Ok(handle)
    }

    async fn search(
        &self,
        index: &IndexHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        let entries = self
            .collections
            .get(&index.id())
            .ok_or_else(|| RetrievalError::UnknownIndex(index.id().to_string()))?;

        let query_vector = self.embedder.embed(query).await?;

        let mut hits = entries
            .iter()
            .map(|entry| StoreHit {
                text: entry.chunk.text.clone(),
                page: entry.chunk.source_page,
                score: cosine_similarity(&query_vector, &entry.embedding),
            })
            .collect::<Vec<_>>();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn release(&mut self, index: &IndexHandle) -> Result<(), IndexingError> {
        self.collections.remove(&index.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::EmbeddingError;

    fn chunk(text: &str, page: u32) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_page: Some(page),
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0, 0.0, 0.0, 0.0]])
        }
    }

    #[tokio::test]
    async fn search_ranks_the_closest_chunk_first() {
        let mut store = InMemoryVectorStore::new(CharacterNgramEmbedder::default());
        let handle = store
            .embed_and_store(&[
                chunk("The relief valve opens at 210 bar.", 0),
                chunk("Replace the hydraulic filter every 500 hours.", 1),
            ])
            .await
            .expect("indexing should succeed");

        let hits = store
            .search(&handle, "hydraulic filter replacement", 2)
            .await
            .expect("search should succeed");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page, Some(1));
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn search_is_capped_by_index_size() {
        let mut store = InMemoryVectorStore::new(CharacterNgramEmbedder::default());
        let handle = store
            .embed_and_store(&[chunk("alpha", 0), chunk("beta", 1)])
            .await
            .expect("indexing should succeed");

        let hits = store.search(&handle, "alpha", 10).await.expect("search");
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn released_index_is_unknown() {
        let mut store = InMemoryVectorStore::new(CharacterNgramEmbedder::default());
        let handle = store
            .embed_and_store(&[chunk("alpha", 0)])
            .await
            .expect("indexing should succeed");

        store.release(&handle).await.expect("release");

        assert_eq!(store.collection_count(), 0);
        let result = store.search(&handle, "alpha", 1).await;
        assert!(matches!(result, Err(RetrievalError::UnknownIndex(_))));
    }

    #[tokio::test]
    async fn empty_chunks_are_rejected() {
        let mut store = InMemoryVectorStore::new(CharacterNgramEmbedder::default());
        let result = store.embed_and_store(&[]).await;
        assert!(matches!(result, Err(IndexingError::EmptyChunks)));
    }

    #[tokio::test]
    async fn embedding_count_mismatch_is_an_error() {
        let mut store = InMemoryVectorStore::new(ShortEmbedder);
        let result = store
            .embed_and_store(&[chunk("alpha", 0), chunk("beta", 1)])
            .await;
        assert!(matches!(result, Err(IndexingError::Request(_))));
    }
}
