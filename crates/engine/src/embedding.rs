//! Sentence embedding providers.
//!
//! The pipeline only depends on the [`EmbeddingModel`] trait: one operation
//! that turns a sentence into a fixed-dimension dense vector. The reference
//! deployment serves a multilingual MiniLM model over HTTP; a deterministic
//! hash-based fallback keeps the service usable without one.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use nlu_core::{EmbeddingSettings, Error, Result};

/// Trait for sentence embedding providers.
///
/// Implementations must be safe for concurrent calls and deterministic for a
/// given text.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The constant output dimension.
    fn dimension(&self) -> usize;

    /// The model name.
    fn model_name(&self) -> &str;
}

/// Remote embedding model behind an HTTP endpoint.
pub struct HttpEmbedding {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl HttpEmbedding {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            dimension,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingModel for HttpEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));
        let req = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("HTTP error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "embedding server error {status}: {body}"
            )));
        }

        let data: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| Error::embedding(format!("JSON decode error: {e}")))?;

        if data.embedding.len() != self.dimension {
            return Err(Error::embedding(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimension,
                data.embedding.len()
            )));
        }

        Ok(data.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic hash-based embedding (fallback when no server is configured).
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dim: usize,
}

impl HashEmbedding {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dim];
        for (i, byte) in text.bytes().enumerate() {
            let pos = i % self.dim;
            embedding[pos] = embedding[pos] * 31.0 + (byte as f32) * 0.1;
            embedding[pos] = (embedding[pos] % 10.0 - 5.0) / 5.0;
        }
        normalize(&mut embedding);
        embedding
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(nlu_core::config::defaults::EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

/// LRU-cached wrapper around any embedding model.
pub struct CachedEmbedding {
    inner: Arc<dyn EmbeddingModel>,
    cache: Mutex<LruCache<u64, Vec<f32>>>,
}

impl CachedEmbedding {
    pub fn new(inner: Arc<dyn EmbeddingModel>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size)
            .unwrap_or_else(|| NonZeroUsize::new(nlu_core::config::defaults::CACHE_SIZE).unwrap());
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn hash_text(text: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

#[async_trait]
impl EmbeddingModel for CachedEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::hash_text(text);
        {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let embedding = self.inner.embed(text).await?;

        {
            let mut cache = self.cache.lock().await;
            cache.put(key, embedding.clone());
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Create an embedding model from settings, wrapped in a bounded cache.
pub fn create_embedding_model(settings: &EmbeddingSettings) -> Arc<dyn EmbeddingModel> {
    let inner: Arc<dyn EmbeddingModel> = match &settings.endpoint {
        Some(endpoint) => Arc::new(
            HttpEmbedding::new(endpoint, &settings.model, settings.dimension)
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
        ),
        None => Arc::new(HashEmbedding::new(settings.dimension)),
    };

    if settings.cache_size > 0 {
        Arc::new(CachedEmbedding::new(inner, settings.cache_size))
    } else {
        inner
    }
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dot product. For unit vectors this is the cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Mean of unit-normalized vectors, renormalized: the label centroid.
pub fn centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.len();
    let mut mean = vec![0.0_f32; dim];
    for v in vectors {
        let mut unit = v.clone();
        normalize(&mut unit);
        for (m, x) in mean.iter_mut().zip(unit.iter()) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= vectors.len() as f32;
    }
    normalize(&mut mean);
    mean
}
