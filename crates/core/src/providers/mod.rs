pub mod openai;

pub use openai::{OpenAiChatModel, OpenAiConfig, OpenAiEmbedder};
