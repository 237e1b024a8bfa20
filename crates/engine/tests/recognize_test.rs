//! End-to-end recognition scenarios against an in-memory engine with a
//! deterministic keyword embedder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use nlu_core::{RecognitionMethod, Result, Settings};
use nlu_engine::{
    DomainClassifier, DomainExamplesDoc, EmbeddingModel, IntentExamplesDoc, IntentMatcher,
    NluEngine, RuleSet, VocabularyDoc, VocabularyManager,
};

/// Maps sentences onto fixed axes by keyword, so that domain and intent
/// centroids are predictable.
struct KeywordEmbedding;

const AXES: &[(usize, &[&str])] = &[
    (0, &["车窗", "车门", "空调", "天窗"]),
    (1, &["歌", "音乐", "播放", "周杰伦"]),
    (2, &["导航", "路线"]),
    (3, &["天气", "几点"]),
    (4, &["暂停", "停止"]),
];

#[async_trait]
impl EmbeddingModel for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0_f32; 8];
        for (axis, keywords) in AXES {
            for keyword in *keywords {
                if text.contains(keyword) {
                    v[*axis] += 1.0;
                }
            }
        }
        if v.iter().all(|x| *x == 0.0) {
            v[7] = 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// Same axes, but request-time calls sleep. Example sentences (used while
/// computing centroids at startup) stay fast so engine construction is
/// cheap; everything else simulates a slow model server.
struct SlowEmbedding {
    delay: Duration,
    fast_texts: Vec<String>,
}

impl SlowEmbedding {
    fn new(delay: Duration) -> Self {
        let mut fast_texts: Vec<String> = Vec::new();
        for sentences in domain_examples().values() {
            fast_texts.extend(sentences.iter().cloned());
        }
        for def in intent_examples().intent_examples.values() {
            fast_texts.extend(def.examples.iter().cloned());
        }
        Self { delay, fast_texts }
    }
}

#[async_trait]
impl EmbeddingModel for SlowEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.fast_texts.iter().any(|t| t == text) {
            tokio::time::sleep(self.delay).await;
        }
        KeywordEmbedding.embed(text).await
    }

    fn dimension(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

fn vocabulary() -> VocabularyManager {
    let doc: VocabularyDoc = serde_json::from_value(serde_json::json!({
        "groups": {
            "action_open": {"items": ["打开", "开启", "启动", "开"], "alias": "open"},
            "action_close": {"items": ["关闭", "停止", "关上"], "alias": "close"},
            "action_play": {"items": ["播放", "听"], "alias": "play"},
            "target_window": {"items": ["车窗", "窗户"], "alias": "window"},
            "target_door": {"items": ["车门"], "alias": "door"},
            "target_ac": {"items": ["空调"], "alias": "ac"},
            "target_music": {"items": ["音乐", "歌"], "alias": "music"},
            "position_driver": {"items": ["主驾驶", "主驾", "驾驶位"], "alias": "driver"},
            "position_passenger": {"items": ["副驾驶", "副驾"], "alias": "passenger"}
        }
    }))
    .unwrap();
    VocabularyManager::new(doc).unwrap()
}

fn rule_sets(vocab: &VocabularyManager) -> RuleSet {
    let files = serde_json::from_value(serde_json::json!([
        {
            "domain": "__global__",
            "description": "跨领域通用规则",
            "patterns": [
                {
                    "pattern": "(?P<action>{{action_open}})(?P<position>{{position_driver}}|{{position_passenger}})?(?P<target>{{target_window}}|{{target_door}})",
                    "intent": "vehicle_control",
                    "confidence": 0.95,
                    "domain": "车控"
                }
            ]
        },
        {
            "domain": "车控",
            "description": "车辆控制规则",
            "patterns": [
                {
                    "pattern": "(?P<action>{{action_close}})(?P<target>{{target_ac}})",
                    "intent": "vehicle_control",
                    "confidence": 0.9
                },
                {
                    "pattern": "低置信度规则",
                    "intent": "vehicle_control",
                    "confidence": 0.4
                }
            ]
        }
    ]))
    .unwrap();
    RuleSet::compile(files, vocab).unwrap()
}

fn domain_examples() -> DomainExamplesDoc {
    serde_json::from_value(serde_json::json!({
        "车控": ["打开车窗", "关闭车门", "开启空调"],
        "音乐": ["播放音乐", "来一首歌", "暂停播放"],
        "通用": ["今天天气怎么样", "现在几点了"]
    }))
    .unwrap()
}

fn intent_examples() -> IntentExamplesDoc {
    serde_json::from_value(serde_json::json!({
        "intent_examples": {
            "vehicle_control": {
                "description": "车辆控制意图",
                "examples": ["打开车窗", "关闭空调"],
                "domain": "车控"
            },
            "music.play": {
                "description": "播放音乐",
                "examples": ["播放音乐", "我想听歌"],
                "domain": "音乐"
            },
            "music.pause": {
                "examples": ["暂停播放"],
                "domain": "音乐"
            }
        }
    }))
    .unwrap()
}

async fn build_engine(embedder: Arc<dyn EmbeddingModel>, settings: Settings) -> NluEngine {
    let vocab = vocabulary();
    let rules = rule_sets(&vocab);
    let vocab = Arc::new(vocab.with_domain_groups(rules.referenced_groups()));

    let domains = DomainClassifier::build(Arc::clone(&embedder), domain_examples(), &settings)
        .await
        .unwrap();
    let intents = IntentMatcher::build(
        Arc::clone(&embedder),
        Arc::clone(&vocab),
        intent_examples(),
        &settings,
    )
    .await
    .unwrap();

    NluEngine::new(
        settings,
        embedder,
        vocab,
        Arc::new(rules),
        Arc::new(domains),
        Arc::new(intents),
    )
}

/// Engine with a realistic latency gap between the regex paths and the
/// model paths: embedding requests take ~100ms, regex microseconds. This
/// keeps the race outcomes as deterministic as they are in production.
async fn engine() -> NluEngine {
    let embedder = Arc::new(SlowEmbedding::new(Duration::from_millis(100)));
    build_engine(embedder, Settings::default()).await
}

#[tokio::test]
async fn s1_global_regex_hit() {
    let engine = engine().await;
    let result = engine.recognize("打开车窗", None, None, None).await;

    assert_eq!(result.intent, "vehicle_control");
    assert_eq!(result.domain, "车控");
    assert_eq!(result.method, RecognitionMethod::RegexGlobal);
    assert!(result.confidence >= 0.9);
    assert_eq!(result.semantic.action.as_deref(), Some("open"));
    assert_eq!(result.semantic.target.as_deref(), Some("window"));
    assert_eq!(result.entities["action"], "打开");
    assert_eq!(result.entities["target"], "车窗");
    assert_eq!(result.raw_text, "打开车窗");
}

#[tokio::test]
async fn s2_position_captures_longest_alternative() {
    let engine = engine().await;
    let result = engine.recognize("打开主驾车窗", None, None, None).await;

    assert_eq!(result.semantic.action.as_deref(), Some("open"));
    assert_eq!(result.semantic.target.as_deref(), Some("window"));
    assert_eq!(result.semantic.position.as_deref(), Some("driver"));
    // "主驾" is matched whole, not the prefix of "主驾驶".
    assert_eq!(result.entities["position"], "主驾");
}

#[tokio::test]
async fn s3_model_path_wins_when_no_regex_matches() {
    let engine = engine().await;
    let result = engine.recognize("我想听周杰伦的歌", None, None, None).await;

    assert_eq!(result.method, RecognitionMethod::Model);
    assert_eq!(result.intent, "music.play");
    assert_eq!(result.domain, "音乐");
    assert!(result.confidence >= 0.6);
    // "听" aliases to play via the slot scan.
    assert_eq!(result.semantic.action.as_deref(), Some("play"));
}

#[tokio::test]
async fn s4_nothing_acceptable_returns_none() {
    let engine = engine().await;
    let result = engine.recognize("今天天气如何", None, None, None).await;

    assert_eq!(result.intent, "unknown");
    assert_eq!(result.domain, "通用");
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.method, RecognitionMethod::None);
    assert_eq!(result.raw_text, "今天天气如何");
}

#[tokio::test]
async fn s5_empty_input_returns_none() {
    let engine = engine().await;
    for text in ["", "   ", "\t\n"] {
        let result = engine.recognize(text, None, None, None).await;
        assert_eq!(result.intent, "unknown");
        assert_eq!(result.domain, "通用");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, RecognitionMethod::None);
        assert_eq!(result.raw_text, text);
    }
}

#[tokio::test]
async fn s6_fast_path_with_committed_domain() {
    let engine = engine().await;

    // The matching rule lives in the __global__ set, so the fast path labels
    // the hit regex_global.
    let result = engine.recognize("打开车窗", Some("车控"), None, None).await;
    assert_eq!(result.intent, "vehicle_control");
    assert_eq!(result.method, RecognitionMethod::RegexGlobal);
    assert_eq!(result.semantic.action.as_deref(), Some("open"));
    assert_eq!(result.semantic.target.as_deref(), Some("window"));

    // A rule from the domain's own set is labeled regex_domain.
    let result = engine.recognize("关闭空调", Some("车控"), None, None).await;
    assert_eq!(result.method, RecognitionMethod::RegexDomain);
    assert_eq!(result.domain, "车控");
    assert_eq!(result.semantic.action.as_deref(), Some("close"));
    assert_eq!(result.semantic.target.as_deref(), Some("ac"));
}

#[tokio::test]
async fn per_rule_confidence_below_global_gate_is_rejected() {
    let engine = engine().await;
    // The 0.4-confidence rule matches but cannot clear the 0.5 gate, and no
    // other path qualifies either.
    let result = engine.recognize("低置信度规则", Some("车控"), None, None).await;
    assert_eq!(result.method, RecognitionMethod::None);
    assert_eq!(result.intent, "unknown");
    assert_eq!(result.domain, "车控");
}

#[tokio::test]
async fn full_flow_equals_fast_path_for_same_domain() {
    let engine = engine().await;
    let full = engine.recognize("关闭空调", None, None, None).await;
    let fast = engine.recognize("关闭空调", Some("车控"), None, None).await;

    assert_eq!(full.intent, fast.intent);
    assert_eq!(full.domain, fast.domain);
    assert_eq!(full.semantic, fast.semantic);
    assert_eq!(full.entities, fast.entities);
}

#[tokio::test]
async fn global_precedence_over_domain_regex() {
    let engine = engine().await;
    // Reachable via both the superset pass and the domain pass; the label
    // must be the higher-precedence regex_global.
    let result = engine.recognize("打开车窗", None, None, None).await;
    assert_eq!(result.method, RecognitionMethod::RegexGlobal);
}

#[tokio::test]
async fn regex_acceptance_does_not_wait_for_slow_model() {
    // Domain classification and intent matching sleep 5 seconds per request;
    // once the global regex path accepts, the request must return without
    // waiting for them.
    let slow = Arc::new(SlowEmbedding::new(Duration::from_secs(5)));
    let engine = build_engine(slow, Settings::default()).await;

    let start = Instant::now();
    let result = engine.recognize("打开车窗", None, None, None).await;
    assert_eq!(result.method, RecognitionMethod::RegexGlobal);
    assert_eq!(result.intent, "vehicle_control");
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "regex acceptance must not wait for the model paths"
    );
}

#[tokio::test]
async fn deadline_returns_none_result() {
    let slow = Arc::new(SlowEmbedding::new(Duration::from_secs(5)));
    let engine = build_engine(slow, Settings::default()).await;

    let start = Instant::now();
    // No regex match, and the model paths cannot finish inside the deadline.
    let result = engine
        .recognize_with_deadline(
            "我想听周杰伦的歌",
            None,
            None,
            None,
            Some(Duration::from_millis(100)),
        )
        .await;
    assert_eq!(result.method, RecognitionMethod::None);
    assert_eq!(result.intent, "unknown");
    assert_eq!(result.confidence, 0.0);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn recognition_is_idempotent() {
    let engine = engine().await;
    for text in ["打开车窗", "我想听周杰伦的歌", "今天天气如何"] {
        let first = engine.recognize(text, None, None, None).await;
        let second = engine.recognize(text, None, None, None).await;
        assert_eq!(first.intent, second.intent);
        assert_eq!(first.domain, second.domain);
        assert_eq!(first.method, second.method);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.semantic, second.semantic);
        assert_eq!(first.entities, second.entities);
    }
}

#[tokio::test]
async fn raw_text_is_preserved_unmodified() {
    let engine = engine().await;
    let result = engine.recognize("  打开车窗  ", None, None, None).await;
    assert_eq!(result.raw_text, "  打开车窗  ");
    assert_eq!(result.intent, "vehicle_control");
}

#[tokio::test]
async fn clear_caches_resets_counts() {
    let engine = engine().await;
    engine.recognize("我想听周杰伦的歌", None, None, None).await;
    let info = engine.info().await;
    assert!(info.cache_size.domain_predictions > 0);

    engine.clear_caches().await;
    let info = engine.info().await;
    assert_eq!(info.cache_size.domain_predictions, 0);
    assert_eq!(info.cache_size.intent_predictions, 0);
}

#[tokio::test]
async fn standalone_domain_classification() {
    let engine = engine().await;
    let prediction = engine.classify_domain("打开车窗").await;
    assert_eq!(prediction.domain, "车控");
    assert!(prediction.confidence >= 0.6);

    let prediction = engine.classify_domain("").await;
    assert_eq!(prediction.domain, "通用");
    assert_eq!(prediction.confidence, 0.0);
}
