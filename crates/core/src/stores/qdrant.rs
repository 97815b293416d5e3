use crate::embeddings::Embedder;
use crate::error::{IndexingError, RetrievalError};
use crate::models::Chunk;
use crate::store::{IndexHandle, StoreHit};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

const BACKEND: &str = "qdrant";

/// Qdrant over its REST API, one collection per index handle.
pub struct QdrantStore<E> {
    endpoint: String,
    collection_prefix: String,
    client: Client,
    embedder: E,
}

impl<E: Embedder> QdrantStore<E> {
    pub fn new(endpoint: impl Into<String>, collection_prefix: impl Into<String>, embedder: E) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection_prefix: collection_prefix.into(),
            client: Client::new(),
            embedder,
        }
    }

    pub fn collection_name(&self, index: &IndexHandle) -> String {
        format!("{}_{}", self.collection_prefix, index.id().simple())
    }

    async fn create_collection(&self, name: &str) -> Result<(), IndexingError> {
        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, name))
            .json(&json!({
                "vectors": {
                    "size": self.embedder.dimensions(),
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexingError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("create collection {name}: {}", response.status()),
            });
        }

        Ok(())
    }

    async fn upsert_points(&self, name: &str, points: &[Value]) -> Result<(), IndexingError> {
        debug!(collection = %name, points = points.len(), "upserting points");

        let response = self
            .client
            .put(format!("{}/collections/{}/points?wait=true", self.endpoint, name))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexingError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("upsert into {name}: {}", response.status()),
            });
        }

        Ok(())
    }

    /// A collection that is already gone counts as deleted.
    async fn delete_collection(&self, name: &str) -> Result<(), IndexingError> {
        let response = self
            .client
            .delete(format!("{}/collections/{}", self.endpoint, name))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(IndexingError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("delete collection {name}: {status}"),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl<E: Embedder> VectorStore for QdrantStore<E> {
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

        let vector_size = self.embedder.dimensions();
        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .enumerate()
            .map(|(position, (chunk, embedding))| {
                if embedding.len() != vector_size {
                    return Err(IndexingError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        vector_size
                    )));
                }

                Ok(json!({
                    "id": position,
                    "vector": embedding,
                    "payload": {
                        "text": chunk.text,
                        "page": chunk.source_page,
                    },
                }))
            })
            .collect::<Result<Vec<_>, IndexingError>>()?;

        let handle = IndexHandle::new(points.len());
        let collection = self.collection_name(&handle);
        self.create_collection(&collection).await?;

        // Nobody gets a handle to a half-filled collection, so drop it here.
        if let Err(error) = self.upsert_points(&collection, &points).await {
            if let Err(cleanup) = self.delete_collection(&collection).await {
                warn!(collection = %collection, error = %cleanup, "could not drop collection after failed upsert");
            }
            return Err(error);
        }

        Ok(handle)
    }

    async fn search(
        &self,
        index: &IndexHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        let query_vector = self.embedder.embed(query).await?;

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint,
                self.collection_name(index)
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RetrievalError::UnknownIndex(index.id().to_string()));
        }

        if !response.status().is_success() {
            return Err(RetrievalError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        hits_from_response(&parsed)
    }

    async fn release(&mut self, index: &IndexHandle) -> Result<(), IndexingError> {
        self.delete_collection(&self.collection_name(index)).await
    }
}

fn hits_from_response(parsed: &Value) -> Result<Vec<StoreHit>, RetrievalError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing result array"))?;

    hits.iter()
        .map(|hit| {
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
                .ok_or_else(|| malformed("hit without payload.text"))?;
            let score = hit
                .pointer("/score")
                .and_then(Value::as_f64)
                .ok_or_else(|| malformed("hit without score"))?;

            Ok(StoreHit {
                text: text.to_string(),
                page: hit
                    .pointer("/payload/page")
                    .and_then(Value::as_u64)
                    .and_then(|page| u32::try_from(page).ok()),
                score: score as f32,
            })
        })
        .collect()
}

fn malformed(details: &str) -> RetrievalError {
    RetrievalError::BackendResponse {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    }
}
