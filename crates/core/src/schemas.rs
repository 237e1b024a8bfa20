//! 识别结果数据模型
//!
//! 定义语义框架（领域 + 意图 + 语义槽位）的共享数据结构，
//! 以及各识别路径的中间结果类型。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The four recognized slot positions of a semantic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Action,
    Target,
    Position,
    Value,
}

impl Slot {
    /// Slot name as it appears in capture groups and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Target => "target",
            Self::Position => "position",
            Self::Value => "value",
        }
    }

    /// Parse a capture-group name into a slot.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "action" => Some(Self::Action),
            "target" => Some(Self::Target),
            "position" => Some(Self::Position),
            "value" => Some(Self::Value),
            _ => None,
        }
    }

    /// Determine the slot a vocabulary group feeds, from its id prefix
    /// (`action_*`, `target_*`, `position_*`, `value_*`).
    pub fn from_group_id(group_id: &str) -> Option<Self> {
        if group_id.starts_with("action_") {
            Some(Self::Action)
        } else if group_id.starts_with("target_") {
            Some(Self::Target)
        } else if group_id.starts_with("position_") {
            Some(Self::Position)
        } else if group_id.starts_with("value_") {
            Some(Self::Value)
        } else {
            None
        }
    }
}

/// Canonical slot assignments of a recognized utterance.
///
/// Values are vocabulary aliases (`open`, `window`, `driver`, ...). Keys
/// whose value is absent are omitted from JSON output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Semantic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Semantic {
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.target.is_none()
            && self.position.is_none()
            && self.value.is_none()
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Action => self.action.as_deref(),
            Slot::Target => self.target.as_deref(),
            Slot::Position => self.position.as_deref(),
            Slot::Value => self.value.as_deref(),
        }
    }

    pub fn set(&mut self, slot: Slot, alias: impl Into<String>) {
        let alias = Some(alias.into());
        match slot {
            Slot::Action => self.action = alias,
            Slot::Target => self.target = alias,
            Slot::Position => self.position = alias,
            Slot::Value => self.value = alias,
        }
    }
}

/// Which recognition path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    /// Global regex pass over every rule set.
    RegexGlobal,
    /// Regex pass restricted to one domain's rule set.
    RegexDomain,
    /// Embedding-similarity intent matcher.
    Model,
    /// No path produced an acceptable result.
    None,
}

impl RecognitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegexGlobal => "regex_global",
            Self::RegexDomain => "regex_domain",
            Self::Model => "model",
            Self::None => "none",
        }
    }
}

/// 意图识别结果
///
/// The machine-actionable record for one utterance. `entities` holds the raw
/// Chinese surface strings that matched; `semantic` holds their canonical
/// aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentData {
    /// Recognized intent, or the sentinel `unknown`.
    pub intent: String,
    /// Topical domain; never empty (falls back to `通用`).
    pub domain: String,
    /// Canonical slot assignments; absent keys are omitted.
    #[serde(default, skip_serializing_if = "Semantic::is_empty")]
    pub semantic: Semantic,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Raw matched surface strings keyed by slot name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, String>,
    /// The unmodified input text.
    pub raw_text: String,
    /// The path that produced this result.
    pub method: RecognitionMethod,
}

impl IntentData {
    /// The sentinel result returned when no path produced an acceptable
    /// outcome: `intent = "unknown"`, `confidence = 0`, `method = none`.
    pub fn none(raw_text: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            intent: crate::config::defaults::FALLBACK_INTENT.to_string(),
            domain: domain.into(),
            semantic: Semantic::default(),
            confidence: 0.0,
            entities: BTreeMap::new(),
            raw_text: raw_text.into(),
            method: RecognitionMethod::None,
        }
    }
}

/// Domain classification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPrediction {
    /// The predicted domain label.
    pub domain: String,
    /// Cosine similarity against the winning centroid, clamped to `[0, 1]`.
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_group_id() {
        assert_eq!(Slot::from_group_id("action_open"), Some(Slot::Action));
        assert_eq!(Slot::from_group_id("target_window"), Some(Slot::Target));
        assert_eq!(Slot::from_group_id("position_driver"), Some(Slot::Position));
        assert_eq!(Slot::from_group_id("value_max"), Some(Slot::Value));
        assert_eq!(Slot::from_group_id("misc_words"), None);
    }

    #[test]
    fn test_semantic_omits_absent_keys() {
        let mut semantic = Semantic::default();
        semantic.set(Slot::Action, "open");
        semantic.set(Slot::Target, "window");

        let json = serde_json::to_value(&semantic).unwrap();
        assert_eq!(json["action"], "open");
        assert_eq!(json["target"], "window");
        assert!(json.get("position").is_none());
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&RecognitionMethod::RegexGlobal).unwrap();
        assert_eq!(json, "\"regex_global\"");
        let json = serde_json::to_string(&RecognitionMethod::None).unwrap();
        assert_eq!(json, "\"none\"");
    }

    #[test]
    fn test_none_result_shape() {
        let result = IntentData::none("今天天气如何", "通用");
        assert_eq!(result.intent, "unknown");
        assert_eq!(result.domain, "通用");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, RecognitionMethod::None);
        assert_eq!(result.raw_text, "今天天气如何");

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("semantic").is_none());
        assert!(json.get("entities").is_none());
    }

    #[test]
    fn test_intent_data_roundtrip_ignores_unknown_fields() {
        let raw = serde_json::json!({
            "intent": "vehicle_control",
            "domain": "车控",
            "semantic": {"action": "open", "target": "window"},
            "confidence": 0.95,
            "entities": {"action": "打开", "target": "车窗"},
            "raw_text": "打开车窗",
            "method": "regex_global",
            "future_field": true
        });
        let data: IntentData = serde_json::from_value(raw).unwrap();
        assert_eq!(data.semantic.action.as_deref(), Some("open"));
        assert_eq!(data.entities["target"], "车窗");
        assert_eq!(data.method, RecognitionMethod::RegexGlobal);
    }
}
