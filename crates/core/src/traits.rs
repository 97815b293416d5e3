use crate::error::{GenerationError, IndexingError, RetrievalError};
use crate::models::Chunk;
use crate::store::{IndexHandle, StoreHit};
use async_trait::async_trait;

/// Embedding plus vector storage, seen from the question answering pipeline.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn embed_and_store(&mut self, chunks: &[Chunk]) -> Result<IndexHandle, IndexingError>;

    /// At most `k` hits, best first. Fewer when the index holds fewer chunks.
    async fn search(
        &self,
        index: &IndexHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError>;

    async fn release(&mut self, index: &IndexHandle) -> Result<(), IndexingError>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for Box<T> {
    async fn embed_and_store(&mut self, chunks: &[Chunk]) -> Result<IndexHandle, IndexingError> {
        (**self).embed_and_store(chunks).await
    }

    async fn search(
        &self,
        index: &IndexHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        (**self).search(index, query, k).await
    }

    async fn release(&mut self, index: &IndexHandle) -> Result<(), IndexingError> {
        (**self).release(index).await
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}
