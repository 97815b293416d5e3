use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf has no pages: {0}")]
    EmptyDocument(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid chunking strategy: {0}")]
    InvalidChunkingStrategy(String),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("no chunks to index")]
    EmptyChunks,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("indexing request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("top_k must be greater than zero")]
    InvalidTopK,

    #[error("no document has been indexed yet")]
    IndexNotReady,

    #[error("unknown index: {0}")]
    UnknownIndex(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("prompt template is missing the ${0} slot")]
    MissingSlot(&'static str),

    #[error("prompt template uses unknown slot ${0}")]
    UnknownSlot(String),

    #[error("invalid placeholder at byte {offset} of prompt template")]
    InvalidPlaceholder { offset: usize },

    #[error("regex error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("unable to read prompt template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid language model response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum QaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub type Result<T, E = QaError> = std::result::Result<T, E>;
