//! Similarity scoring between expected and spoken text.
//!
//! The tracker only depends on the [`SimilarityScorer`] capability. Two
//! backends are provided:
//!
//! - [`LexicalScorer`] -- normalized Levenshtein ratio over lowercased,
//!   punctuation-free text. Deterministic and offline.
//! - [`CosineScorer`] -- cosine similarity between embeddings produced by
//!   an [`Embedder`], e.g. the OpenAI-compatible [`HttpEmbedder`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AlignmentConfig, EmbeddingConfig, ScorerKind};
use crate::error::{Result, SyncError};

/// Scores how closely a spoken span matches an expected segment.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Scorer name used in logs and errors (e.g. "lexical").
    fn name(&self) -> &str;

    /// Similarity in `[0.0, 1.0]`. Backend failures map to
    /// [`SyncError::ScoringUnavailable`].
    async fn score(&self, expected: &str, spoken: &str) -> Result<f32>;
}

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize_for_matching(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-level edit-distance ratio on normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    /// Synchronous scoring; never fails.
    pub fn ratio(expected: &str, spoken: &str) -> f32 {
        let a = normalize_for_matching(expected);
        let b = normalize_for_matching(spoken);
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        strsim::normalized_levenshtein(&a, &b).clamp(0.0, 1.0) as f32
    }
}

#[async_trait]
impl SimilarityScorer for LexicalScorer {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, expected: &str, spoken: &str) -> Result<f32> {
        Ok(Self::ratio(expected, spoken))
    }
}

/// Produces embedding vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedder name (e.g. "http").
    fn name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Cosine similarity of two vectors, `None` on length mismatch or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Embedding-based scorer. Negative cosine values clamp to 0.
pub struct CosineScorer<E> {
    embedder: E,
}

impl<E: Embedder> CosineScorer<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl<E: Embedder> SimilarityScorer for CosineScorer<E> {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn score(&self, expected: &str, spoken: &str) -> Result<f32> {
        let vectors = self.embedder.embed(&[expected, spoken]).await?;
        let [a, b] = vectors.as_slice() else {
            return Err(SyncError::scoring(
                self.embedder.name(),
                format!("expected 2 embeddings, got {}", vectors.len()),
            ));
        };
        let cosine = cosine_similarity(a, b).ok_or_else(|| {
            SyncError::scoring(self.embedder.name(), "embeddings are empty or mismatched")
        })?;
        Ok(cosine.clamp(0.0, 1.0))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings client.
///
/// Sends `{"model", "input": [...]}` to the configured endpoint and reads
/// `{"data": [{"index", "embedding"}]}`. Works against local
/// sentence-transformer servers that expose the same route.
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send a bearer token with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build from config, reading the key from `api_key_env` if set.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let embedder = Self::new(&config.endpoint, &config.model);
        match config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
        {
            Some(key) => embedder.with_api_key(key),
            None => embedder,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        "http"
    }

    async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| SyncError::scoring(self.name(), format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::scoring(
                self.name(),
                format!("endpoint returned {status}: {body}"),
            ));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::scoring(self.name(), format!("response parse error: {e}")))?;

        if parsed.data.len() != inputs.len() {
            return Err(SyncError::scoring(
                self.name(),
                format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    parsed.data.len()
                ),
            ));
        }
        parsed.data.sort_by_key(|d| d.index);
        debug!(count = parsed.data.len(), model = %self.model, "embeddings received");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Build the scorer selected in the alignment config.
pub fn scorer_from_config(config: &AlignmentConfig) -> Arc<dyn SimilarityScorer> {
    match config.scorer {
        ScorerKind::Lexical => Arc::new(LexicalScorer),
        ScorerKind::Embedding => {
            Arc::new(CosineScorer::new(HttpEmbedder::from_config(&config.embedding)))
        }
    }
}
