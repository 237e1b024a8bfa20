//! Handler-level tests against an in-memory engine.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use nlu_core::{RecognitionMethod, Settings};
use nlu_engine::{
    DomainClassifier, DomainExamplesDoc, HashEmbedding, IntentExamplesDoc, IntentMatcher,
    NluEngine, RuleSet, VocabularyDoc, VocabularyManager,
};

use nlu_api::handlers::{basic, nlu};
use nlu_api::{IntentRequest, ServerState};

async fn state() -> ServerState {
    let settings = Settings::default();
    let embedder = Arc::new(HashEmbedding::new(64));

    let doc: VocabularyDoc = serde_json::from_value(serde_json::json!({
        "groups": {
            "action_open": {"items": ["打开", "开启"], "alias": "open"},
            "target_window": {"items": ["车窗"], "alias": "window"}
        }
    }))
    .unwrap();
    let vocab = VocabularyManager::new(doc).unwrap();

    let files = serde_json::from_value(serde_json::json!([
        {
            "domain": "车控",
            "patterns": [
                {
                    "pattern": "(?P<action>{{action_open}})(?P<target>{{target_window}})",
                    "intent": "vehicle_control",
                    "confidence": 0.95
                }
            ]
        }
    ]))
    .unwrap();
    let rules = RuleSet::compile(files, &vocab).unwrap();
    let vocab = Arc::new(vocab.with_domain_groups(rules.referenced_groups()));

    let domains = DomainClassifier::build(
        embedder.clone() as Arc<dyn nlu_engine::EmbeddingModel>,
        DomainExamplesDoc::new(),
        &settings,
    )
    .await
    .unwrap();
    let intents = IntentMatcher::build(
        embedder.clone(),
        Arc::clone(&vocab),
        IntentExamplesDoc::default(),
        &settings,
    )
    .await
    .unwrap();

    let engine = NluEngine::new(
        settings,
        embedder,
        vocab,
        Arc::new(rules),
        Arc::new(domains),
        Arc::new(intents),
    );
    ServerState::new(Arc::new(engine))
}

#[tokio::test]
async fn test_recognize_intent_endpoint() {
    let state = state().await;
    let request = IntentRequest {
        text: "打开车窗".to_string(),
        domain: None,
        context: None,
        session_id: None,
    };

    let Json(response) = nlu::recognize_intent_handler(State(state), Json(request)).await;
    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data.intent, "vehicle_control");
    assert_eq!(data.method, RecognitionMethod::RegexGlobal);
    assert_eq!(data.semantic.action.as_deref(), Some("open"));
    assert_eq!(data.raw_text, "打开车窗");
}

#[tokio::test]
async fn test_empty_text_yields_successful_none_result() {
    let state = state().await;
    let request = IntentRequest {
        text: "".to_string(),
        domain: None,
        context: None,
        session_id: None,
    };

    let Json(response) = nlu::recognize_intent_handler(State(state), Json(request)).await;
    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data.intent, "unknown");
    assert_eq!(data.domain, "通用");
    assert_eq!(data.method, RecognitionMethod::None);
}

#[tokio::test]
async fn test_domain_endpoint_falls_back_without_centroids() {
    let state = state().await;
    let request = IntentRequest {
        text: "打开车窗".to_string(),
        domain: None,
        context: None,
        session_id: None,
    };

    let Json(response) = nlu::classify_domain_handler(State(state), Json(request)).await;
    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data.domain, "通用");
}

#[tokio::test]
async fn test_info_and_cache_clear_endpoints() {
    let state = state().await;

    let Json(response) = nlu::engine_info_handler(State(state.clone())).await;
    let info = response.data.unwrap();
    assert_eq!(info.pattern_count, 1);
    assert_eq!(info.vocabulary_groups, 2);
    assert_eq!(info.embedding_model, "hash");

    let Json(response) = nlu::clear_cache_handler(State(state)).await;
    assert!(response.success);
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = state().await;
    let Json(body) = basic::health_handler(State(state)).await;
    assert_eq!(body["status"], "ok");
}
