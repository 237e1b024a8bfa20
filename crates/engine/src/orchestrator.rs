//! Recognition orchestrator.
//!
//! Races up to four concurrent units of work per request:
//!
//! - **G** global regex pass, **D** domain classification (stage 1);
//! - **R** domain-restricted regex, **M** intent matcher (stage 2, spawned
//!   once D resolves, concurrently with any still-live G).
//!
//! The first result that clears its threshold wins and everything else is
//! cancelled. Exactly-simultaneous completions resolve by the stable
//! precedence `regex_global > regex_domain > model`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nlu_core::{DomainPrediction, IntentData, RecognitionMethod, Settings};

use crate::domain::DomainClassifier;
use crate::embedding::EmbeddingModel;
use crate::intent::{IntentMatcher, IntentPrediction};
use crate::rules::{RuleMatch, RuleSet};
use crate::vocabulary::VocabularyManager;

/// One event from a recognition path. `None` payloads mean the path yielded
/// nothing (no hit, error, or cancellation) and simply retires.
enum PathEvent {
    Global(Option<RuleMatch>),
    Domain(Option<DomainPrediction>),
    DomainRegex(Option<RuleMatch>),
    Model(Option<IntentPrediction>),
}

impl PathEvent {
    /// Precedence rank for simultaneous completions; lower wins.
    fn rank(&self) -> u8 {
        match self {
            PathEvent::Global(_) => 0,
            PathEvent::DomainRegex(_) => 1,
            PathEvent::Model(_) => 2,
            PathEvent::Domain(_) => 3,
        }
    }
}

/// Service information snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub supported_domains: Vec<String>,
    pub intent_count: usize,
    pub pattern_count: usize,
    pub vocabulary_groups: usize,
    pub cache_size: CacheInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub domain_predictions: usize,
    pub intent_predictions: usize,
}

/// The assembled recognition pipeline.
pub struct NluEngine {
    settings: Settings,
    embedder: Arc<dyn EmbeddingModel>,
    vocabulary: Arc<VocabularyManager>,
    rules: Arc<RuleSet>,
    domains: Arc<DomainClassifier>,
    intents: Arc<IntentMatcher>,
}

impl std::fmt::Debug for NluEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NluEngine").finish_non_exhaustive()
    }
}

impl NluEngine {
    pub fn new(
        settings: Settings,
        embedder: Arc<dyn EmbeddingModel>,
        vocabulary: Arc<VocabularyManager>,
        rules: Arc<RuleSet>,
        domains: Arc<DomainClassifier>,
        intents: Arc<IntentMatcher>,
    ) -> Self {
        Self {
            settings,
            embedder,
            vocabulary,
            rules,
            domains,
            intents,
        }
    }

    pub fn vocabulary(&self) -> &VocabularyManager {
        &self.vocabulary
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Classify the domain of `text` directly (the standalone endpoint).
    pub async fn classify_domain(&self, text: &str) -> DomainPrediction {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return DomainPrediction {
                domain: self.settings.fallback_domain.clone(),
                confidence: 0.0,
            };
        }
        match self.domains.classify(trimmed).await {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::warn!(error = %e, "domain classification failed");
                DomainPrediction {
                    domain: self.settings.fallback_domain.clone(),
                    confidence: 0.0,
                }
            }
        }
    }

    /// Recognize one utterance.
    ///
    /// `domain` commits the request to a domain and skips stage 1 entirely.
    /// `context` and `session_id` are accepted for interface parity and
    /// currently unused. Never fails: every failure mode degrades to the
    /// `none` result.
    pub async fn recognize(
        &self,
        text: &str,
        domain: Option<&str>,
        context: Option<serde_json::Value>,
        session_id: Option<&str>,
    ) -> IntentData {
        let deadline = match self.settings.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        self.recognize_with_deadline(text, domain, context, session_id, deadline)
            .await
    }

    /// [`Self::recognize`] with an explicit overall deadline. On expiry the
    /// request behaves as if every path returned unacceptable.
    pub async fn recognize_with_deadline(
        &self,
        text: &str,
        domain: Option<&str>,
        _context: Option<serde_json::Value>,
        session_id: Option<&str>,
        request_deadline: Option<Duration>,
    ) -> IntentData {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return IntentData::none(text, self.settings.fallback_domain.clone());
        }

        tracing::info!(text = %trimmed, domain = ?domain, session_id = ?session_id, "recognizing intent");

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<PathEvent>(8);
        let mut outstanding = 0usize;
        let mut resolved_domain: Option<String> = None;

        if let Some(d) = domain {
            // Fast path: the caller committed the domain, only stage 2 runs.
            resolved_domain = Some(d.to_string());
            self.spawn_stage2(trimmed, d, &tx, &cancel);
            outstanding += 2;
        } else {
            self.spawn_global(trimmed, &tx, &cancel);
            self.spawn_classify(trimmed, &tx, &cancel);
            outstanding += 2;
        }

        let deadline = async {
            match request_deadline {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        while outstanding > 0 {
            let first = tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!(text = %trimmed, "recognition deadline exceeded");
                    cancel.cancel();
                    return self.none_result(text, resolved_domain);
                }
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            // Drain everything already completed, then rank by precedence so
            // dead heats resolve deterministically.
            let mut batch = vec![first];
            while let Ok(event) = rx.try_recv() {
                batch.push(event);
            }
            outstanding -= batch.len();
            batch.sort_by_key(PathEvent::rank);

            for event in batch {
                match event {
                    PathEvent::Domain(prediction) => {
                        match prediction {
                            Some(prediction) => {
                                tracing::debug!(
                                    domain = %prediction.domain,
                                    confidence = prediction.confidence,
                                    "domain resolved, spawning stage 2"
                                );
                                self.spawn_stage2(trimmed, &prediction.domain, &tx, &cancel);
                                outstanding += 2;
                                resolved_domain = Some(prediction.domain);
                            }
                            // D failed: the domain-restricted paths cannot
                            // run; any live G decides the request alone.
                            None => tracing::warn!("domain path yielded no result"),
                        }
                    }
                    PathEvent::Global(Some(hit))
                        if hit.confidence >= self.settings.confidence_threshold =>
                    {
                        cancel.cancel();
                        return self.regex_result(
                            text,
                            hit,
                            RecognitionMethod::RegexGlobal,
                            &resolved_domain,
                        );
                    }
                    PathEvent::DomainRegex(Some(hit))
                        if hit.confidence >= self.settings.confidence_threshold =>
                    {
                        let method = if hit.global_rule {
                            RecognitionMethod::RegexGlobal
                        } else {
                            RecognitionMethod::RegexDomain
                        };
                        cancel.cancel();
                        return self.regex_result(text, hit, method, &resolved_domain);
                    }
                    PathEvent::Model(Some(prediction))
                        if prediction.intent != self.settings.fallback_intent
                            && prediction.confidence >= self.settings.similarity_threshold =>
                    {
                        cancel.cancel();
                        return self.model_result(text, prediction, &resolved_domain);
                    }
                    // Unacceptable or empty results retire their path
                    // without disqualifying the others.
                    PathEvent::Global(_) | PathEvent::DomainRegex(_) | PathEvent::Model(_) => {}
                }
            }
        }

        self.none_result(text, resolved_domain)
    }

    fn spawn_global(&self, text: &str, tx: &mpsc::Sender<PathEvent>, cancel: &CancellationToken) {
        let rules = Arc::clone(&self.rules);
        let vocab = Arc::clone(&self.vocabulary);
        let tx = tx.clone();
        let cancel = cancel.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let hit = rules.match_superset(&text, &vocab, &cancel);
            if cancel.is_cancelled() {
                return;
            }
            let _ = tx.send(PathEvent::Global(hit)).await;
        });
    }

    fn spawn_classify(&self, text: &str, tx: &mpsc::Sender<PathEvent>, cancel: &CancellationToken) {
        let domains = Arc::clone(&self.domains);
        let tx = tx.clone();
        let cancel = cancel.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            let prediction = match domains.classify(&text).await {
                Ok(prediction) => Some(prediction),
                Err(e) => {
                    tracing::warn!(error = %e, "domain classification failed");
                    None
                }
            };
            if cancel.is_cancelled() {
                return;
            }
            let _ = tx.send(PathEvent::Domain(prediction)).await;
        });
    }

    fn spawn_stage2(
        &self,
        text: &str,
        domain: &str,
        tx: &mpsc::Sender<PathEvent>,
        cancel: &CancellationToken,
    ) {
        // R: regex restricted to the resolved domain.
        {
            let rules = Arc::clone(&self.rules);
            let vocab = Arc::clone(&self.vocabulary);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let text = text.to_string();
            let domain = domain.to_string();
            tokio::spawn(async move {
                let hit = rules.match_domain(&text, &domain, &vocab, &cancel);
                if cancel.is_cancelled() {
                    return;
                }
                let _ = tx.send(PathEvent::DomainRegex(hit)).await;
            });
        }

        // M: intent matcher restricted to the resolved domain.
        {
            let intents = Arc::clone(&self.intents);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let text = text.to_string();
            let domain = domain.to_string();
            tokio::spawn(async move {
                if cancel.is_cancelled() {
                    return;
                }
                let prediction = match intents.predict(&text, &domain).await {
                    Ok(prediction) => Some(prediction),
                    Err(e) => {
                        tracing::warn!(error = %e, "intent matching failed");
                        None
                    }
                };
                if cancel.is_cancelled() {
                    return;
                }
                let _ = tx.send(PathEvent::Model(prediction)).await;
            });
        }
    }

    fn regex_result(
        &self,
        raw_text: &str,
        hit: RuleMatch,
        method: RecognitionMethod,
        resolved_domain: &Option<String>,
    ) -> IntentData {
        let domain = hit
            .domain
            .or_else(|| resolved_domain.clone())
            .unwrap_or_else(|| self.settings.fallback_domain.clone());
        IntentData {
            intent: hit.intent,
            domain,
            semantic: hit.semantic,
            confidence: hit.confidence,
            entities: hit.entities,
            raw_text: raw_text.to_string(),
            method,
        }
    }

    fn model_result(
        &self,
        raw_text: &str,
        prediction: IntentPrediction,
        resolved_domain: &Option<String>,
    ) -> IntentData {
        let domain = resolved_domain
            .clone()
            .unwrap_or_else(|| self.settings.fallback_domain.clone());
        IntentData {
            intent: prediction.intent,
            domain,
            semantic: prediction.semantic,
            confidence: prediction.confidence,
            entities: prediction.entities,
            raw_text: raw_text.to_string(),
            method: RecognitionMethod::Model,
        }
    }

    fn none_result(&self, raw_text: &str, resolved_domain: Option<String>) -> IntentData {
        let domain = resolved_domain.unwrap_or_else(|| self.settings.fallback_domain.clone());
        IntentData::none(raw_text, domain)
    }

    /// Service information for the info endpoint.
    pub async fn info(&self) -> EngineInfo {
        EngineInfo {
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: self.embedder.dimension(),
            supported_domains: self.domains.supported_domains(),
            intent_count: self.intents.intent_count(),
            pattern_count: self.rules.pattern_count(),
            vocabulary_groups: self.vocabulary.group_count(),
            cache_size: CacheInfo {
                domain_predictions: self.domains.cache_len().await,
                intent_predictions: self.intents.cache_len().await,
            },
        }
    }

    /// Domain labels known to the classifier.
    pub fn supported_domains(&self) -> Vec<String> {
        self.domains.supported_domains()
    }

    /// Drop all prediction caches.
    pub async fn clear_caches(&self) {
        self.domains.clear_cache().await;
        self.intents.clear_cache().await;
        tracing::info!("prediction caches cleared");
    }
}
