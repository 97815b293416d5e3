pub mod chunking;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod retrieval;
pub mod session;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_pages, chunk_preview, select_strategy, SEPARATORS};
pub use context::{assemble, UNKNOWN_PAGE_LABEL};
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ConfigError, EmbeddingError, GenerationError, IndexingError, ParseError, QaError,
    RetrievalError, TemplateError,
};
pub use extractor::{extract_page_units, LopdfExtractor, PdfExtractor};
pub use models::{AssembledContext, Answer, Chunk, ChunkingStrategy, PageUnit, RetrievedResult};
pub use prompt::{answer, PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
pub use providers::{OpenAiChatModel, OpenAiConfig, OpenAiEmbedder};
pub use retrieval::{build_index, retrieve};
pub use session::{LoadedDocument, QaSession, DEFAULT_TOP_K};
pub use store::{IndexHandle, StoreHit};
pub use stores::{InMemoryVectorStore, QdrantStore};
pub use traits::{LanguageModel, VectorStore};
