use crate::models::{Chunk, RetrievedResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque reference to a collection of embedded chunks held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexHandle {
    id: Uuid,
    len: usize,
}

impl IndexHandle {
    pub fn new(len: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            len,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of chunks stored behind this handle.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Raw search hit from a store. `score` is a similarity, higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub text: String,
    pub page: Option<u32>,
    pub score: f32,
}

impl StoreHit {
    pub fn into_result(self) -> RetrievedResult {
        RetrievedResult {
            chunk: Chunk {
                text: self.text,
                source_page: self.page,
            },
            score: self.score,
        }
    }
}
