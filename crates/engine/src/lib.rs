//! Recognition pipeline for the NLU service.
//!
//! Maps a short (typically Chinese) utterance to a semantic frame — domain,
//! intent and slots — by racing a global regex pass, a domain-restricted
//! regex pass and an embedding-similarity intent matcher, returning the
//! first acceptable result.

pub mod domain;
pub mod embedding;
pub mod intent;
pub mod loader;
pub mod orchestrator;
pub mod rules;
pub mod vocabulary;

pub use domain::{DomainClassifier, DomainExamplesDoc};
pub use embedding::{create_embedding_model, CachedEmbedding, EmbeddingModel, HashEmbedding, HttpEmbedding};
pub use intent::{IntentExamplesDoc, IntentMatcher, IntentPrediction};
pub use loader::load_engine;
pub use orchestrator::{EngineInfo, NluEngine};
pub use rules::{CompiledPattern, DomainRuleFile, PatternDef, RuleMatch, RuleSet, GLOBAL_DOMAIN};
pub use vocabulary::{VocabGroupDef, VocabularyDoc, VocabularyManager};
