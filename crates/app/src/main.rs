use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_qa_core::providers::openai::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_OPENAI_EMBEDDING_DIMENSIONS,
};
use pdf_qa_core::{
    chunk_pages, chunk_preview, extract_page_units, select_strategy, Answer,
    CharacterNgramEmbedder, Embedder, InMemoryVectorStore, LopdfExtractor, OpenAiChatModel,
    OpenAiConfig, OpenAiEmbedder, PromptTemplate, QaSession, QdrantStore, VectorStore,
    DEFAULT_TOP_K, UNKNOWN_PAGE_LABEL,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PREVIEW_CHARS: usize = 100;

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// API key for the hosted embedding and chat models
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model answering the questions
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Embedding model for chunks and questions
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Dimensions produced by the embedding model
    #[arg(long, default_value_t = DEFAULT_OPENAI_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Where embeddings come from
    #[arg(long, value_enum, default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// Where embedded chunks are kept
    #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
    vector_store: StoreKind,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Prefix for per-document Qdrant collections
    #[arg(long, default_value = "pdf_qa")]
    qdrant_collection_prefix: String,

    /// Prompt template with $question and $context slots
    #[arg(long, default_value = "prompt_template.txt")]
    prompt_template: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Hosted OpenAI-compatible embeddings.
    Openai,
    /// Offline character trigram hashing.
    Ngram,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Memory,
    Qdrant,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a PDF would be chunked.
    Chunks {
        #[arg(long)]
        pdf: PathBuf,
        /// Number of chunk previews to print.
        #[arg(long, default_value = "3")]
        samples: usize,
    },
    /// Answer a single question about a PDF.
    Ask {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long)]
        question: String,
        /// Number of chunks used as context.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Print the answer with its sources as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Load a PDF once and answer questions read from stdin.
    Chat {
        #[arg(long)]
        pdf: PathBuf,
        /// Number of chunks used as context.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

impl Cli {
    fn openai_config(&self) -> anyhow::Result<OpenAiConfig> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required (or pass --openai-api-key)"))?;

        let mut config = OpenAiConfig::new(api_key);
        config.base_url = self.openai_base_url.clone();
        config.chat_model = self.chat_model.clone();
        config.embedding_model = self.embedding_model.clone();
        config.embedding_dimensions = self.embedding_dimensions;
        Ok(config)
    }

    fn embedder(&self) -> anyhow::Result<Box<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Openai => Box::new(OpenAiEmbedder::new(self.openai_config()?)),
            EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder::default()),
        })
    }

    fn vector_store(&self) -> anyhow::Result<Box<dyn VectorStore>> {
        let embedder = self.embedder()?;
        Ok(match self.vector_store {
            StoreKind::Memory => Box::new(InMemoryVectorStore::new(embedder)),
            StoreKind::Qdrant => Box::new(QdrantStore::new(
                &self.qdrant_url,
                &self.qdrant_collection_prefix,
                embedder,
            )),
        })
    }

    fn session(&self, top_k: usize) -> anyhow::Result<QaSession<Box<dyn VectorStore>, OpenAiChatModel>> {
        let template = PromptTemplate::load(&self.prompt_template)?;
        template.validate()?;

        Ok(QaSession::new(
            self.vector_store()?,
            OpenAiChatModel::new(self.openai_config()?),
            template,
        )
        .with_top_k(top_k))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    match &cli.command {
        Command::Chunks { pdf, samples } => print_chunks(pdf, *samples)?,
        Command::Ask {
            pdf,
            question,
            top_k,
            json,
        } => {
            let mut session = cli.session(*top_k)?;
            load(&mut session, pdf).await?;

            let answer = session.ask(question).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::Chat { pdf, top_k } => {
            let mut session = cli.session(*top_k)?;
            load(&mut session, pdf).await?;
            chat(&session).await?;
        }
    }

    Ok(())
}

async fn load(
    session: &mut QaSession<Box<dyn VectorStore>, OpenAiChatModel>,
    pdf: &Path,
) -> anyhow::Result<()> {
    let document = session.load_pdf(&LopdfExtractor, pdf).await?;
    println!(
        "{}: {} pages, {} chunks (chunk_size={}, overlap={}) indexed at {}",
        document.name,
        document.page_count,
        document.chunk_count,
        document.strategy.chunk_size,
        document.strategy.overlap,
        document.loaded_at.to_rfc3339()
    );
    Ok(())
}

fn print_chunks(pdf: &Path, samples: usize) -> anyhow::Result<()> {
    let pages = extract_page_units(pdf)?;
    let strategy = select_strategy(pages.len());
    let chunks = chunk_pages(&pages, strategy);

    println!("pages: {}", pages.len());
    println!(
        "strategy: chunk_size={} overlap={}",
        strategy.chunk_size, strategy.overlap
    );
    println!("total chunks: {}", chunks.len());

    if chunks.is_empty() {
        warn!(pdf = %pdf.display(), "no extractable text");
        return Ok(());
    }

    let total_chars = chunks
        .iter()
        .map(|chunk| chunk.text.chars().count())
        .sum::<usize>();
    println!(
        "average chunk size: {:.1}",
        total_chars as f64 / chunks.len() as f64
    );

    for (index, chunk) in chunks.iter().take(samples).enumerate() {
        println!(
            "[chunk {} page {}] {}",
            index + 1,
            page_label(chunk.source_page),
            chunk_preview(&chunk.text, PREVIEW_CHARS)
        );
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim_end());
    for (index, source) in answer.sources.iter().enumerate() {
        println!(
            "  [{}] page={} score={:.4}",
            index + 1,
            page_label(source.chunk.source_page),
            source.score
        );
    }
}

fn page_label(page: Option<u32>) -> String {
    page.map(|page| page.to_string())
        .unwrap_or_else(|| UNKNOWN_PAGE_LABEL.to_string())
}

async fn chat(session: &QaSession<Box<dyn VectorStore>, OpenAiChatModel>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"question> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match session.ask(question).await {
            Ok(answer) => print_answer(&answer),
            Err(error) => {
                warn!(error = %error, "question failed");
                println!("error: {error}");
            }
        }
    }

    Ok(())
}
