use crate::error::EmbeddingError;
use async_trait::async_trait;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts).await
    }
}

/// Offline embedder hashing character trigrams into a fixed number of buckets.
/// Case and whitespace layout are ignored, so a chunk and a question typed
/// on one line land close together. Texts shorter than a trigram count as
/// one gram.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    const GRAM: usize = 3;

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions()];
        let chars = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
            .chars()
            .collect::<Vec<_>>();

        if chars.is_empty() {
            return vector;
        }

        let gram = Self::GRAM.min(chars.len());
        let buckets = vector.len() as u64;
        for window in chars.windows(gram) {
            vector[(fnv1a(window) % buckets) as usize] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        vector.iter_mut().for_each(|value| *value /= magnitude);
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    let mut buffer = [0u8; 4];
    for ch in chars {
        for byte in ch.encode_utf8(&mut buffer).bytes() {
            hash = (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Zero when either vector has no magnitude or the lengths differ.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, CharacterNgramEmbedder, Embedder};

    #[test]
    fn layout_and_case_do_not_change_the_vector() {
        let embedder = CharacterNgramEmbedder::default();
        let from_page = embedder.embed_text("Relief\n  Valve   SETTING");
        let from_question = embedder.embed_text("relief valve setting");
        assert_eq!(from_page, from_question);
    }

    #[test]
    fn short_and_empty_texts() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };

        let short = embedder.embed_text("ok");
        assert_eq!(short.len(), 32);
        assert!((short.iter().map(|value| value * value).sum::<f32>() - 1.0).abs() < 1e-5);

        assert!(embedder.embed_text(" \n ").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn related_chunks_score_higher() {
        let embedder = CharacterNgramEmbedder::default();
        let question = embedder.embed_text("When should the hydraulic filter be replaced?");
        let filter = embedder.embed_text("Replace the hydraulic filter every 500 operating hours.");
        let safety = embedder.embed_text("Wear gloves near moving parts.");

        assert!(cosine_similarity(&question, &filter) > cosine_similarity(&question, &safety));
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["pump".to_string(), "valve".to_string()];

        let vectors = embedder.embed_batch(&texts).await.expect("offline embedding");

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed_text("pump"));
        assert_eq!(vectors[1], embedder.embed_text("valve"));
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed_text("relief valve setting");
        assert!((cosine_similarity(&vector, &vector) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
