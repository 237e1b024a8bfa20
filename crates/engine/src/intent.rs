//! 意图匹配（模型路径）
//!
//! 在给定领域内，通过句向量相似度挑选最接近的意图标签，并独立于意图选择
//! 做一次词汇组槽位扫描，尽力填充 action/target/position/value。

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use nlu_core::{Result, Semantic, Settings};

use crate::embedding::{centroid, dot, normalize, EmbeddingModel};
use crate::vocabulary::VocabularyManager;

/// One intent's labeled examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentExampleDef {
    #[serde(default)]
    pub description: String,
    pub examples: Vec<String>,
    /// The domain this intent belongs to.
    pub domain: String,
}

/// The intent examples document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentExamplesDoc {
    #[serde(default)]
    pub intent_examples: BTreeMap<String, IntentExampleDef>,
}

/// Best intent plus best-effort slots for one utterance.
#[derive(Debug, Clone)]
pub struct IntentPrediction {
    pub intent: String,
    pub confidence: f32,
    pub semantic: Semantic,
    pub entities: BTreeMap<String, String>,
}

/// Embedding-similarity intent matcher.
pub struct IntentMatcher {
    embedder: Arc<dyn EmbeddingModel>,
    vocab: Arc<VocabularyManager>,
    /// domain → [(intent, centroid)], both levels sorted for determinism.
    by_domain: BTreeMap<String, Vec<(String, Vec<f32>)>>,
    threshold: f32,
    fallback_intent: String,
    cache: Mutex<LruCache<String, IntentPrediction>>,
}

impl IntentMatcher {
    /// Compute one centroid per (domain, intent) pair.
    pub async fn build(
        embedder: Arc<dyn EmbeddingModel>,
        vocab: Arc<VocabularyManager>,
        doc: IntentExamplesDoc,
        settings: &Settings,
    ) -> Result<Self> {
        let mut by_domain: BTreeMap<String, Vec<(String, Vec<f32>)>> = BTreeMap::new();

        for (intent, def) in &doc.intent_examples {
            if def.examples.is_empty() {
                continue;
            }
            let mut embeddings = Vec::with_capacity(def.examples.len());
            for sentence in &def.examples {
                embeddings.push(embedder.embed(sentence).await?);
            }
            by_domain
                .entry(def.domain.clone())
                .or_default()
                .push((intent.clone(), centroid(&embeddings)));
        }

        for intents in by_domain.values_mut() {
            intents.sort_by(|a, b| a.0.cmp(&b.0));
        }
        let intent_count: usize = by_domain.values().map(|v| v.len()).sum();
        tracing::info!(
            domains = by_domain.len(),
            intents = intent_count,
            "intent matcher ready"
        );

        let capacity = NonZeroUsize::new(settings.cache_size)
            .unwrap_or_else(|| NonZeroUsize::new(nlu_core::config::defaults::CACHE_SIZE).unwrap());

        Ok(Self {
            embedder,
            vocab,
            by_domain,
            threshold: settings.similarity_threshold,
            fallback_intent: settings.fallback_intent.clone(),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Predict the best intent for `text` within `domain`.
    ///
    /// Below the similarity threshold the intent degrades to the fallback
    /// (`unknown`) with the similarity passed through unchanged; slot
    /// extraction still runs.
    pub async fn predict(&self, text: &str, domain: &str) -> Result<IntentPrediction> {
        let cache_key = format!("{text}\u{1}{domain}");
        {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&cache_key) {
                return Ok(cached.clone());
            }
        }

        let prediction = self.predict_uncached(text, domain).await?;

        {
            let mut cache = self.cache.lock().await;
            cache.put(cache_key, prediction.clone());
        }
        Ok(prediction)
    }

    async fn predict_uncached(&self, text: &str, domain: &str) -> Result<IntentPrediction> {
        let (semantic, entities) = self.vocab.extract_slots(text);

        let Some(intents) = self.by_domain.get(domain).filter(|v| !v.is_empty()) else {
            return Ok(IntentPrediction {
                intent: self.fallback_intent.clone(),
                confidence: 0.0,
                semantic,
                entities,
            });
        };

        let mut embedding = self.embedder.embed(text).await?;
        normalize(&mut embedding);

        let mut best: Option<(&str, f32)> = None;
        for (intent, center) in intents {
            let similarity = dot(&embedding, center);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((intent.as_str(), similarity));
            }
        }

        let (intent, similarity) = best.unwrap();
        let confidence = similarity.clamp(0.0, 1.0);

        let intent = if confidence < self.threshold {
            tracing::debug!(best = %intent, confidence, domain = %domain, "intent below threshold");
            self.fallback_intent.clone()
        } else {
            intent.to_string()
        };

        Ok(IntentPrediction {
            intent,
            confidence,
            semantic,
            entities,
        })
    }

    /// Intents known for a domain, in sorted order.
    pub fn intents_for_domain(&self, domain: &str) -> Vec<String> {
        self.by_domain
            .get(domain)
            .map(|v| v.iter().map(|(i, _)| i.clone()).collect())
            .unwrap_or_default()
    }

    /// Total number of intent centroids.
    pub fn intent_count(&self) -> usize {
        self.by_domain.values().map(|v| v.len()).sum()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}
