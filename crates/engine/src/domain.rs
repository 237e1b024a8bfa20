//! 领域划分
//!
//! 用句向量相似度把一句话归到一个粗粒度领域（车控、导航、音乐…）。
//! 每个领域由其示例句的质心向量代表；分类即对所有质心做余弦相似度 argmax。

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use nlu_core::{DomainPrediction, Result, Settings};

use crate::embedding::{centroid, dot, normalize, EmbeddingModel};

/// Domain examples document: flat `domain → example utterances`.
pub type DomainExamplesDoc = BTreeMap<String, Vec<String>>;

/// Embedding-similarity domain classifier.
pub struct DomainClassifier {
    embedder: Arc<dyn EmbeddingModel>,
    /// Sorted by domain name, so argmax ties break alphabetically.
    centroids: Vec<(String, Vec<f32>)>,
    threshold: f32,
    fallback: String,
    cache: Mutex<LruCache<String, DomainPrediction>>,
}

impl DomainClassifier {
    /// Compute one centroid per domain from its labeled examples.
    pub async fn build(
        embedder: Arc<dyn EmbeddingModel>,
        examples: DomainExamplesDoc,
        settings: &Settings,
    ) -> Result<Self> {
        let mut centroids = Vec::with_capacity(examples.len());

        for (domain, sentences) in &examples {
            if sentences.is_empty() {
                continue;
            }
            let mut embeddings = Vec::with_capacity(sentences.len());
            for sentence in sentences {
                embeddings.push(embedder.embed(sentence).await?);
            }
            centroids.push((domain.clone(), centroid(&embeddings)));
            tracing::debug!(domain = %domain, examples = sentences.len(), "computed domain centroid");
        }

        // BTreeMap iteration is already sorted; keep the invariant explicit.
        centroids.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::info!(domains = centroids.len(), "domain classifier ready");

        let capacity = NonZeroUsize::new(settings.cache_size)
            .unwrap_or_else(|| NonZeroUsize::new(nlu_core::config::defaults::CACHE_SIZE).unwrap());

        Ok(Self {
            embedder,
            centroids,
            threshold: settings.similarity_threshold,
            fallback: settings.fallback_domain.clone(),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Predict the best domain for `text`.
    ///
    /// Negative similarities clamp to zero. Below the similarity threshold
    /// the fallback domain is returned, still carrying the observed
    /// confidence.
    pub async fn classify(&self, text: &str) -> Result<DomainPrediction> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.get(text) {
                return Ok(cached.clone());
            }
        }

        let prediction = self.classify_uncached(text).await?;

        {
            let mut cache = self.cache.lock().await;
            cache.put(text.to_string(), prediction.clone());
        }
        Ok(prediction)
    }

    async fn classify_uncached(&self, text: &str) -> Result<DomainPrediction> {
        if self.centroids.is_empty() {
            return Ok(DomainPrediction {
                domain: self.fallback.clone(),
                confidence: 0.0,
            });
        }

        let mut embedding = self.embedder.embed(text).await?;
        normalize(&mut embedding);

        let mut best: Option<(&str, f32)> = None;
        for (domain, center) in &self.centroids {
            let similarity = dot(&embedding, center);
            // Strict > keeps the alphabetically first domain on a tie.
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((domain.as_str(), similarity));
            }
        }

        let (domain, similarity) = best.unwrap();
        let confidence = similarity.clamp(0.0, 1.0);

        if confidence < self.threshold {
            tracing::debug!(
                best = %domain,
                confidence,
                "below similarity threshold, using fallback domain"
            );
            return Ok(DomainPrediction {
                domain: self.fallback.clone(),
                confidence,
            });
        }

        Ok(DomainPrediction {
            domain: domain.to_string(),
            confidence,
        })
    }

    /// Domain labels in sorted order.
    pub fn supported_domains(&self) -> Vec<String> {
        self.centroids.iter().map(|(d, _)| d.clone()).collect()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}
