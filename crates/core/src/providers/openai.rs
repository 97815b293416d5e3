use crate::embeddings::Embedder;
use crate::error::{ConfigError, EmbeddingError, GenerationError};
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_EMBEDDING_DIMENSIONS: usize = 1_536;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const EMBEDDING_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chat_model: String,
    pub temperature: f32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_OPENAI_EMBEDDING_DIMENSIONS,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
        }
    }

    /// Reads `OPENAI_API_KEY` and, when set, `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            non_empty_env("OPENAI_API_KEY").ok_or(ConfigError::MissingEnv("OPENAI_API_KEY"))?;
        let mut config = Self::new(api_key);
        if let Some(base_url) = non_empty_env("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = self.config.endpoint("embeddings");
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            debug!(url = %url, batch = batch.len(), "embedding request");

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&json!({
                    "model": self.config.embedding_model,
                    "input": batch,
                }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: Value = response.json().await?;
            vectors.extend(parse_embedding_response(&parsed, batch.len())?);
        }

        Ok(vectors)
    }
}

fn parse_embedding_response(
    parsed: &Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = parsed
        .pointer("/data")
        .and_then(Value::as_array)
        .ok_or_else(|| EmbeddingError::InvalidResponse("missing data array".to_string()))?;

    let mut indexed = data
        .iter()
        .enumerate()
        .map(|(position, item)| -> Result<(usize, Vec<f32>), EmbeddingError> {
            let index = item
                .pointer("/index")
                .and_then(Value::as_u64)
                .map(|index| index as usize)
                .unwrap_or(position);
            let vector = item
                .pointer("/embedding")
                .and_then(Value::as_array)
                .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding".to_string()))?
                .iter()
                .map(|value| value.as_f64().map(|value| value as f32))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    EmbeddingError::InvalidResponse("non-numeric embedding value".to_string())
                })?;
            Ok((index, vector))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if indexed.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            indexed.len()
        )));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

pub struct OpenAiChatModel {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.config.endpoint("chat/completions");
        debug!(url = %url, model = %self.config.chat_model, "chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.chat_model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": self.config.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Value = response.json().await?;
        parse_chat_response(&parsed)
    }
}

fn parse_chat_response(parsed: &Value) -> Result<String, GenerationError> {
    parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_ordered_by_index() {
        let response = json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]},
            ],
        });

        let vectors = parse_embedding_response(&response, 2).expect("valid response");

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_count_must_match_request() {
        let response = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        let result = parse_embedding_response(&response, 2);
        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
    }

    #[test]
    fn embedding_response_without_data_is_rejected() {
        let response = json!({"error": {"message": "invalid api key"}});
        let result = parse_embedding_response(&response, 1);
        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
    }

    #[test]
    fn chat_content_is_returned_verbatim() {
        let response = json!({
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  See page 3.\n"}}
            ]
        });

        let text = parse_chat_response(&response).expect("valid response");
        assert_eq!(text, "  See page 3.\n");
    }

    #[test]
    fn chat_response_without_content_is_rejected() {
        let result = parse_chat_response(&json!({"choices": []}));
        assert!(matches!(result, Err(GenerationError::InvalidResponse(_))));
    }

    // The only test touching these variables, so the steps run in one body.
    #[test]
    fn config_is_read_from_environment() {
        let saved_key = std::env::var("OPENAI_API_KEY").ok();
        let saved_url = std::env::var("OPENAI_BASE_URL").ok();

        std::env::set_var("OPENAI_API_KEY", "  ");
        std::env::remove_var("OPENAI_BASE_URL");
        assert!(matches!(
            OpenAiConfig::from_env(),
            Err(ConfigError::MissingEnv("OPENAI_API_KEY"))
        ));

        std::env::set_var("OPENAI_API_KEY", " sk-test ");
        let config = OpenAiConfig::from_env().expect("key is set");
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);

        std::env::set_var("OPENAI_BASE_URL", "http://localhost:11434/v1");
        let config = OpenAiConfig::from_env().expect("key is set");
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);

        for (name, value) in [("OPENAI_API_KEY", saved_key), ("OPENAI_BASE_URL", saved_url)] {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let mut config = OpenAiConfig::new("key");
        config.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(
            config.endpoint("chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }
}
