//! Domain-indexed regex rule sets.
//!
//! Each domain owns an ordered list of compiled patterns loaded from one
//! rule file; the pseudo-domain `__global__` holds rules that apply across
//! all domains. Matching is first-hit-wins in declaration order, and a hit
//! is post-processed into aliases and raw entities via the vocabulary
//! manager.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use nlu_core::{Error, Result, Semantic, Slot};

use crate::vocabulary::VocabularyManager;

/// Pseudo-domain for rules that apply across all domains.
pub const GLOBAL_DOMAIN: &str = "__global__";

/// One pattern as declared in a domain rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDef {
    /// Pattern template; may contain `{{group_id}}` placeholders.
    pub pattern: String,
    /// Intent reported on a hit.
    pub intent: String,
    /// Default action alias, used when no `action` group captured.
    #[serde(default)]
    pub action: Option<String>,
    /// Default target alias, used when no `target` group captured.
    #[serde(default)]
    pub target: Option<String>,
    /// Confidence propagated into the result.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Declared domain; overrides the domain of the file the rule lives in.
    #[serde(default)]
    pub domain: Option<String>,
    /// Names for positional (unnamed) capture groups, 1-based in order.
    #[serde(default)]
    pub group_names: Vec<String>,
}

fn default_confidence() -> f32 {
    1.0
}

/// One domain rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRuleFile {
    pub domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
}

/// A pattern compiled against the vocabulary.
#[derive(Debug)]
pub struct CompiledPattern {
    /// Original template, kept for diagnostics.
    pub source: String,
    regex: Regex,
    pub intent: String,
    pub default_action: Option<String>,
    pub default_target: Option<String>,
    pub confidence: f32,
    pub domain: Option<String>,
    group_names: Vec<String>,
}

/// A successful rule hit, post-extraction.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub intent: String,
    pub confidence: f32,
    /// Declared domain, or the owning file's domain when not `__global__`.
    pub domain: Option<String>,
    pub semantic: Semantic,
    pub entities: BTreeMap<String, String>,
    /// Whether the hit came from the `__global__` rule set.
    pub global_rule: bool,
}

/// All rule sets, keyed by domain.
///
/// `BTreeMap` iteration fixes the superset pass order (deterministic);
/// `__global__` sorts ahead of every real domain name.
#[derive(Debug)]
pub struct RuleSet {
    domains: BTreeMap<String, Vec<CompiledPattern>>,
    /// Vocabulary groups referenced per domain, from `{{id}}` templates.
    referenced: BTreeMap<String, Vec<String>>,
}

impl RuleSet {
    /// Compile every rule file against the vocabulary. Any expansion or
    /// compilation failure aborts loading.
    pub fn compile(files: Vec<DomainRuleFile>, vocab: &VocabularyManager) -> Result<Self> {
        let placeholder = Regex::new(r"\{\{([^{}]+)\}\}")
            .map_err(|e| Error::internal(format!("placeholder regex: {e}")))?;

        let mut domains: BTreeMap<String, Vec<CompiledPattern>> = BTreeMap::new();
        let mut referenced: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for file in files {
            let patterns = domains.entry(file.domain.clone()).or_default();
            let refs = referenced.entry(file.domain.clone()).or_default();

            for def in file.patterns {
                for caps in placeholder.captures_iter(&def.pattern) {
                    let id = caps.get(1).unwrap().as_str().trim().to_string();
                    if !refs.contains(&id) {
                        refs.push(id);
                    }
                }

                let expanded = vocab.expand(&def.pattern)?;
                let regex = Regex::new(&expanded)
                    .map_err(|e| Error::pattern(&def.pattern, e.to_string()))?;

                patterns.push(CompiledPattern {
                    source: def.pattern,
                    regex,
                    intent: def.intent,
                    default_action: def.action,
                    default_target: def.target,
                    confidence: def.confidence.clamp(0.0, 1.0),
                    domain: def.domain,
                    group_names: def.group_names,
                });
            }
        }

        Ok(Self { domains, referenced })
    }

    /// Domain → referenced vocabulary groups, for the informational index.
    pub fn referenced_groups(&self) -> BTreeMap<String, Vec<String>> {
        self.referenced.clone()
    }

    /// Total number of compiled patterns.
    pub fn pattern_count(&self) -> usize {
        self.domains.values().map(|p| p.len()).sum()
    }

    /// Domains that own at least one rule (including `__global__`).
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(|s| s.as_str())
    }

    /// The superset pass: every domain's rules in deterministic order,
    /// first hit wins. This is the global regex path.
    pub fn match_superset(
        &self,
        text: &str,
        vocab: &VocabularyManager,
        cancel: &CancellationToken,
    ) -> Option<RuleMatch> {
        for (domain, patterns) in &self.domains {
            if let Some(hit) = self.match_patterns(patterns, domain, text, vocab, cancel) {
                return Some(hit);
            }
        }
        None
    }

    /// The domain-restricted pass: the named domain's rules in declaration
    /// order, then the `__global__` rules. The returned match records which
    /// set it came from so callers can label the method accordingly.
    pub fn match_domain(
        &self,
        text: &str,
        domain: &str,
        vocab: &VocabularyManager,
        cancel: &CancellationToken,
    ) -> Option<RuleMatch> {
        if let Some(patterns) = self.domains.get(domain) {
            if let Some(hit) = self.match_patterns(patterns, domain, text, vocab, cancel) {
                return Some(hit);
            }
        }
        if domain != GLOBAL_DOMAIN {
            if let Some(patterns) = self.domains.get(GLOBAL_DOMAIN) {
                return self.match_patterns(patterns, GLOBAL_DOMAIN, text, vocab, cancel);
            }
        }
        None
    }

    fn match_patterns(
        &self,
        patterns: &[CompiledPattern],
        file_domain: &str,
        text: &str,
        vocab: &VocabularyManager,
        cancel: &CancellationToken,
    ) -> Option<RuleMatch> {
        for pattern in patterns {
            if cancel.is_cancelled() {
                return None;
            }
            let Some(caps) = pattern.regex.captures(text) else {
                continue;
            };
            if cancel.is_cancelled() {
                return None;
            }
            return Some(extract(pattern, &caps, file_domain, vocab));
        }
        None
    }
}

/// Turn a raw capture set into a structured match.
///
/// Named captures `action|target|position|value` feed both `entities` (raw
/// surface) and, via the alias dictionary, `semantic`. Surfaces without an
/// alias stay out of `semantic`. Positional groups are named through
/// `group_names`, and declared defaults fill slots whose group did not
/// capture.
fn extract(
    pattern: &CompiledPattern,
    caps: &regex::Captures<'_>,
    file_domain: &str,
    vocab: &VocabularyManager,
) -> RuleMatch {
    let mut semantic = Semantic::default();
    let mut entities = BTreeMap::new();

    let mut record = |name: &str, surface: &str| {
        entities.insert(name.to_string(), surface.to_string());
        if let Some(slot) = Slot::from_name(name) {
            if let Some((alias, _)) = vocab.alias_of(surface) {
                semantic.set(slot, alias);
            }
        }
    };

    for name in pattern.regex.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            record(name, m.as_str());
        }
    }

    for (i, name) in pattern.group_names.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            record(name, m.as_str());
        }
    }

    if semantic.action.is_none() {
        if let Some(action) = &pattern.default_action {
            semantic.set(Slot::Action, action.clone());
        }
    }
    if semantic.target.is_none() {
        if let Some(target) = &pattern.default_target {
            semantic.set(Slot::Target, target.clone());
        }
    }

    let domain = pattern
        .domain
        .clone()
        .or_else(|| (file_domain != GLOBAL_DOMAIN).then(|| file_domain.to_string()));

    RuleMatch {
        intent: pattern.intent.clone(),
        confidence: pattern.confidence,
        domain,
        semantic,
        entities,
        global_rule: file_domain == GLOBAL_DOMAIN,
    }
}
