//! 词汇组管理
//!
//! 词汇组是共享同一个英文 alias 的一组中文表面词（如 `action_open` =
//! {"打开","开启","启动","开"} → `open`）。本模块负责：
//!
//! 1. 把规则模板中的 `{{group_id}}` 展开为具体的正则可选分支；
//! 2. 维护 中文表面词 → alias 的反向映射；
//! 3. 为意图匹配路径提供槽位词扫描。

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use nlu_core::{Error, Result, Semantic, Slot};

/// One vocabulary group as it appears in the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabGroupDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub items: Vec<String>,
    /// Canonical English identifier; defaults to the group id when absent.
    #[serde(default)]
    pub alias: Option<String>,
}

/// The vocabulary configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyDoc {
    #[serde(default)]
    pub groups: HashMap<String, VocabGroupDef>,
}

/// A loaded vocabulary group.
#[derive(Debug, Clone)]
struct GroupEntry {
    items: Vec<String>,
    alias: String,
    /// Pre-built alternation: items regex-escaped, longest first.
    alternation: String,
    slot: Option<Slot>,
}

#[derive(Debug, Clone)]
struct ReverseEntry {
    alias: String,
    group_id: String,
    /// Items count of the owning group, for the specificity tie-break.
    group_size: usize,
}

/// Immutable vocabulary lookup structures, built once at startup.
#[derive(Debug)]
pub struct VocabularyManager {
    groups: BTreeMap<String, GroupEntry>,
    reverse: HashMap<String, ReverseEntry>,
    domain_groups: BTreeMap<String, Vec<String>>,
    placeholder: Regex,
}

impl VocabularyManager {
    /// Build the lookup structures from a parsed document.
    ///
    /// Groups are processed in sorted-id order so that the reverse map is
    /// deterministic. When one surface string belongs to several groups, the
    /// group with the smaller items list wins (higher specificity); on equal
    /// size the later declaration wins.
    pub fn new(doc: VocabularyDoc) -> Result<Self> {
        let mut groups = BTreeMap::new();
        let mut reverse: HashMap<String, ReverseEntry> = HashMap::new();

        let mut ids: Vec<&String> = doc.groups.keys().collect();
        ids.sort();

        for id in ids {
            let def = &doc.groups[id];
            if def.items.is_empty() {
                return Err(Error::config(format!("vocabulary group '{id}' has no items")));
            }
            let alias = def.alias.clone().unwrap_or_else(|| id.clone());

            for item in &def.items {
                let keep_existing = reverse
                    .get(item.as_str())
                    .is_some_and(|existing| existing.group_size < def.items.len());
                if !keep_existing {
                    reverse.insert(
                        item.clone(),
                        ReverseEntry {
                            alias: alias.clone(),
                            group_id: id.clone(),
                            group_size: def.items.len(),
                        },
                    );
                }
            }

            groups.insert(
                id.clone(),
                GroupEntry {
                    alternation: build_alternation(&def.items),
                    items: def.items.clone(),
                    alias,
                    slot: Slot::from_group_id(id),
                },
            );
        }

        let placeholder = Regex::new(r"\{\{([^{}]+)\}\}")
            .map_err(|e| Error::internal(format!("placeholder regex: {e}")))?;

        Ok(Self {
            groups,
            reverse,
            domain_groups: BTreeMap::new(),
            placeholder,
        })
    }

    /// Attach the domain → referenced-groups index derived from the rule
    /// files. Informational only; consumed by [`Self::groups_for_domain`].
    pub fn with_domain_groups(mut self, map: BTreeMap<String, Vec<String>>) -> Self {
        self.domain_groups = map;
        self
    }

    /// Replace every `{{group_id}}` in `template` with the group's
    /// alternation `(item_1|item_2|…)`, longest alternative first.
    ///
    /// Fails with [`Error::UnknownVocabularyGroup`] when a placeholder names
    /// a group that does not exist; the result is guaranteed free of
    /// residual `{{…}}` tokens.
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut result = String::with_capacity(template.len());
        let mut last = 0;

        for caps in self.placeholder.captures_iter(template) {
            let full = caps.get(0).unwrap();
            let id = caps.get(1).unwrap().as_str().trim();

            let group = self
                .groups
                .get(id)
                .ok_or_else(|| Error::UnknownVocabularyGroup(id.to_string()))?;

            result.push_str(&template[last..full.start()]);
            result.push('(');
            result.push_str(&group.alternation);
            result.push(')');
            last = full.end();
        }
        result.push_str(&template[last..]);

        if result.contains("{{") || result.contains("}}") {
            return Err(Error::pattern(template, "residual placeholder after expansion"));
        }

        Ok(result)
    }

    /// Reverse lookup: surface string → (alias, group id).
    pub fn alias_of(&self, surface: &str) -> Option<(&str, &str)> {
        self.reverse
            .get(surface)
            .map(|e| (e.alias.as_str(), e.group_id.as_str()))
    }

    /// The vocabulary groups referenced by a domain's rules. Informational.
    pub fn groups_for_domain(&self, domain: &str) -> &[String] {
        self.domain_groups
            .get(domain)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of loaded groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Scan `text` for slot-typed vocabulary items (`action_*`, `target_*`,
    /// `position_*`, `value_*`).
    ///
    /// Within a slot the leftmost longest occurrence wins; a later candidate
    /// replaces an earlier one only when strictly longer. Returns the alias
    /// assignments and the raw surface strings.
    pub fn extract_slots(&self, text: &str) -> (Semantic, BTreeMap<String, String>) {
        struct Best<'a> {
            start: usize,
            chars: usize,
            surface: &'a str,
            alias: &'a str,
        }

        let mut best: HashMap<Slot, Best> = HashMap::new();

        for entry in self.groups.values() {
            let Some(slot) = entry.slot else { continue };
            for item in &entry.items {
                let Some(start) = text.find(item.as_str()) else {
                    continue;
                };
                let chars = item.chars().count();
                let replace = match best.get(&slot) {
                    None => true,
                    Some(cur) => chars > cur.chars || (chars == cur.chars && start < cur.start),
                };
                if replace {
                    best.insert(
                        slot,
                        Best {
                            start,
                            chars,
                            surface: item,
                            alias: &entry.alias,
                        },
                    );
                }
            }
        }

        let mut semantic = Semantic::default();
        let mut entities = BTreeMap::new();
        for (slot, found) in best {
            semantic.set(slot, found.alias);
            entities.insert(slot.as_str().to_string(), found.surface.to_string());
        }
        (semantic, entities)
    }
}

/// Escape items and join them longest-first, so that left-to-right
/// alternation cannot strand a suffix ("主驾" must not shadow "主驾驶").
fn build_alternation(items: &[String]) -> String {
    let mut sorted: Vec<&String> = items.iter().collect();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    sorted
        .iter()
        .map(|item| regex::escape(item))
        .collect::<Vec<_>>()
        .join("|")
}
