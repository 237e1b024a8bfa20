//! Startup loading of the configuration documents.
//!
//! All documents are read and compiled before the engine is exposed; any
//! failure aborts startup so no partially initialized pipeline ever serves
//! requests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use nlu_core::{Error, Result, Settings};

use crate::domain::{DomainClassifier, DomainExamplesDoc};
use crate::embedding::EmbeddingModel;
use crate::intent::{IntentExamplesDoc, IntentMatcher};
use crate::orchestrator::NluEngine;
use crate::rules::{DomainRuleFile, RuleSet};
use crate::vocabulary::{VocabularyDoc, VocabularyManager};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config(format!("malformed {}: {e}", path.display())))
}

/// Read every `*.json` rule file under `dir`, sorted by file name for a
/// stable load order.
fn read_rule_files(dir: &Path) -> Result<Vec<DomainRuleFile>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(|e| Error::config(format!("cannot read rule dir {}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file: DomainRuleFile = read_json(&path)?;
        tracing::debug!(
            domain = %file.domain,
            patterns = file.patterns.len(),
            file = %path.display(),
            "loaded rule file"
        );
        files.push(file);
    }
    Ok(files)
}

/// Assemble the full pipeline from the configuration documents.
pub async fn load_engine(
    settings: Settings,
    embedder: Arc<dyn EmbeddingModel>,
) -> Result<NluEngine> {
    let vocab_doc: VocabularyDoc = read_json(&settings.vocabulary_path)?;
    let vocab = VocabularyManager::new(vocab_doc)?;
    tracing::info!(groups = vocab.group_count(), "vocabulary loaded");

    let rule_files = read_rule_files(&settings.regex_dir)?;
    let rules = RuleSet::compile(rule_files, &vocab)?;
    tracing::info!(patterns = rules.pattern_count(), "regex rules compiled");

    let vocab = Arc::new(vocab.with_domain_groups(rules.referenced_groups()));

    let domain_doc: DomainExamplesDoc = read_json(&settings.domain_examples_path)?;
    let domains = DomainClassifier::build(Arc::clone(&embedder), domain_doc, &settings).await?;

    let intent_doc: IntentExamplesDoc = read_json(&settings.intent_examples_path)?;
    let intents = IntentMatcher::build(
        Arc::clone(&embedder),
        Arc::clone(&vocab),
        intent_doc,
        &settings,
    )
    .await?;

    Ok(NluEngine::new(
        settings,
        embedder,
        vocab,
        Arc::new(rules),
        Arc::new(domains),
        Arc::new(intents),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedding;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    fn write_fixtures(dir: &Path) {
        write(
            dir,
            "vocabulary_groups.json",
            serde_json::json!({
                "groups": {
                    "action_open": {
                        "name": "打开动作",
                        "description": "表示打开、开启的动作词汇",
                        "items": ["打开", "开启", "启动", "开"],
                        "alias": "open"
                    },
                    "target_window": {"items": ["车窗"], "alias": "window"}
                }
            }),
        );
        fs::create_dir(dir.join("regex")).unwrap();
        write(
            &dir.join("regex"),
            "vehicle.json",
            serde_json::json!({
                "domain": "车控",
                "description": "车辆控制规则",
                "patterns": [
                    {
                        "pattern": "(?P<action>{{action_open}})(?P<target>{{target_window}})",
                        "intent": "vehicle_control",
                        "confidence": 0.95
                    }
                ]
            }),
        );
        write(
            dir,
            "domain_examples.json",
            serde_json::json!({
                "车控": ["打开车窗", "关闭空调"],
                "通用": ["今天天气怎么样", "现在几点了"]
            }),
        );
        write(
            dir,
            "intent_examples.json",
            serde_json::json!({
                "intent_examples": {
                    "vehicle_control": {
                        "description": "车辆控制意图",
                        "examples": ["打开车窗", "开启车门"],
                        "domain": "车控"
                    }
                }
            }),
        );
    }

    #[tokio::test]
    async fn test_load_engine_from_documents() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let settings = Settings::default().with_config_dir(dir.path());
        let embedder = Arc::new(HashEmbedding::new(64));
        let engine = load_engine(settings, embedder).await.unwrap();

        let info = engine.info().await;
        assert_eq!(info.vocabulary_groups, 2);
        assert_eq!(info.pattern_count, 1);
        assert_eq!(info.supported_domains, vec!["车控", "通用"]);
        assert_eq!(info.intent_count, 1);

        // The domain-group index was derived from the rule templates.
        let groups = engine.vocabulary().groups_for_domain("车控");
        assert!(groups.contains(&"action_open".to_string()));
    }

    #[tokio::test]
    async fn test_missing_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().with_config_dir(dir.path());
        let embedder = Arc::new(HashEmbedding::new(64));
        let err = load_engine(settings, embedder).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_group_in_rule_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        write(
            &dir.path().join("regex"),
            "broken.json",
            serde_json::json!({
                "domain": "车控",
                "patterns": [
                    {"pattern": "{{no_such_group}}", "intent": "x", "confidence": 1.0}
                ]
            }),
        );

        let settings = Settings::default().with_config_dir(dir.path());
        let embedder = Arc::new(HashEmbedding::new(64));
        let err = load_engine(settings, embedder).await.unwrap_err();
        assert!(matches!(err, Error::UnknownVocabularyGroup(_)));
    }
}
