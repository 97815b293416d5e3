use crate::chunking::{chunk_pages, select_strategy};
use crate::context::assemble;
use crate::error::{QaError, RetrievalError};
use crate::extractor::PdfExtractor;
use crate::models::{Answer, ChunkingStrategy, PageUnit};
use crate::prompt::{answer, PromptTemplate};
use crate::retrieval::{build_index, retrieve};
use crate::store::IndexHandle;
use crate::traits::{LanguageModel, VectorStore};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub name: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub strategy: ChunkingStrategy,
    pub loaded_at: DateTime<Utc>,
    index: IndexHandle,
}

impl LoadedDocument {
    pub fn index(&self) -> &IndexHandle {
        &self.index
    }
}

/// Question answering over at most one document at a time.
///
/// Loading a new document releases the previous index before the new one
/// is built. Questions are answered against whichever document is loaded.
pub struct QaSession<S, L> {
    store: S,
    llm: L,
    template: PromptTemplate,
    top_k: usize,
    document: Option<LoadedDocument>,
}

impl<S, L> QaSession<S, L>
where
    S: VectorStore,
    L: LanguageModel,
{
    pub fn new(store: S, llm: L, template: PromptTemplate) -> Self {
        Self {
            store,
            llm,
            template,
            top_k: DEFAULT_TOP_K,
            document: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn load_pdf<P>(&mut self, extractor: &P, path: &Path) -> Result<&LoadedDocument, QaError>
    where
        P: PdfExtractor + ?Sized,
    {
        let pages = extractor.extract_pages(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.load_pages(name, &pages).await
    }

    pub async fn load_pages(
        &mut self,
        name: impl Into<String>,
        pages: &[PageUnit],
    ) -> Result<&LoadedDocument, QaError> {
        let name = name.into();

        // The previous document stays usable until its index is gone.
        if let Some(previous) = self.document.as_ref() {
            debug!(document = %previous.name, "releasing previous index");
            self.store.release(&previous.index).await?;
            self.document = None;
        }

        let strategy = select_strategy(pages.len());
        let chunks = chunk_pages(pages, strategy);
        info!(
            document = %name,
            pages = pages.len(),
            chunk_size = strategy.chunk_size,
            overlap = strategy.overlap,
            chunks = chunks.len(),
            "indexing document"
        );

        let index = build_index(&mut self.store, &chunks).await?;

        Ok(&*self.document.insert(LoadedDocument {
            name,
            page_count: pages.len(),
            chunk_count: chunks.len(),
            strategy,
            loaded_at: Utc::now(),
            index,
        }))
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, QaError> {
        let document = self.document.as_ref().ok_or(RetrievalError::IndexNotReady)?;
        self.template.validate()?;

        let sources = retrieve(&self.store, &document.index, question, self.top_k).await?;
        debug!(question = %question, retrieved = sources.len(), "retrieved context");

        let context = assemble(&sources);
        let text = answer(&self.llm, question, &context, &self.template).await?;

        Ok(Answer {
            question: question.to_string(),
            text,
            context,
            sources,
        })
    }
}
