use crate::error::{IndexingError, RetrievalError};
use crate::models::{Chunk, RetrievedResult};
use crate::store::{IndexHandle, StoreHit};
use crate::traits::VectorStore;

pub async fn build_index<S>(store: &mut S, chunks: &[Chunk]) -> Result<IndexHandle, IndexingError>
where
    S: VectorStore + ?Sized,
{
    if chunks.is_empty() {
        return Err(IndexingError::EmptyChunks);
    }

    store.embed_and_store(chunks).await
}

/// Results keep the store's best-first order; scores are similarities.
pub async fn retrieve<S>(
    store: &S,
    index: &IndexHandle,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedResult>, RetrievalError>
where
    S: VectorStore + ?Sized,
{
    if query.trim().is_empty() {
        return Err(RetrievalError::EmptyQuery);
    }
    if k == 0 {
        return Err(RetrievalError::InvalidTopK);
    }

    let hits = store.search(index, query, k).await?;
    Ok(hits.into_iter().take(k).map(StoreHit::into_result).collect())
}
