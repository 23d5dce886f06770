//! Text embedders for the associative memory bank.
//!
//! Two implementations behind one enum:
//!
//! - [`Embedder::HashSeeded`] derives a deterministic pseudo-random
//!   vector from a SHA-256 of the text. Retrieval quality degrades to
//!   exact-duplicate matching, which is fine for development and makes
//!   the test suite fully deterministic.
//! - [`Embedder::Remote`] calls an OpenAI-compatible `/embeddings`
//!   endpoint.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::error::LlmError;

/// Default embedding dimension for the hash-seeded embedder.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// A pluggable `text -> vector` function.
pub enum Embedder {
    /// Deterministic hash-seeded pseudo-random embeddings.
    HashSeeded {
        /// Output vector dimension.
        dim: usize,
    },
    /// OpenAI-compatible HTTP embeddings.
    Remote(EmbeddingClient),
}

impl Embedder {
    /// A hash-seeded embedder with the default dimension.
    pub const fn hash_seeded() -> Self {
        Self::HashSeeded {
            dim: DEFAULT_EMBEDDING_DIM,
        }
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] only for the remote embedder; the
    /// hash-seeded embedder cannot fail.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        match self {
            Self::HashSeeded { dim } => Ok(hash_seeded_embedding(text, *dim)),
            Self::Remote(client) => client.embed(text).await,
        }
    }
}

/// Deterministic embedding: seed an RNG from the text's SHA-256.
fn hash_seeded_embedding(text: &str, dim: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(digest.get(..8).unwrap_or(&[0_u8; 8]));
    let seed = u64::from_le_bytes(seed_bytes);

    let mut rng = StdRng::seed_from_u64(seed);
    (0..dim).map(|_| rng.random::<f32>()).collect()
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    /// Create an embedding client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Backend {
                message: format!("embedding request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            return Err(LlmError::Backend {
                message: format!("embedding backend returned {status}: {error_body}"),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| LlmError::Backend {
            message: format!("embedding response parse failed: {e}"),
        })?;

        extract_embedding(&json)
    }
}

/// Extract `data[0].embedding` from an embeddings response.
fn extract_embedding(json: &serde_json::Value) -> Result<Vec<f32>, LlmError> {
    let values = json
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|e| e.get("embedding"))
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| LlmError::Backend {
            message: String::from("embedding response missing data[0].embedding"),
        })?;

    #[allow(clippy::cast_possible_truncation)]
    let embedding = values
        .iter()
        .filter_map(serde_json::Value::as_f64)
        .map(|v| v as f32)
        .collect();
    Ok(embedding)
}
