//! Label mappings for categorical dimensions.
//!
//! A label mapping is an ordered list of `(label, pattern)` rules applied
//! to a raw string field (stay type, note class, diagnosis code, ...).
//! Matching is a case-insensitive regex search, and the partition is
//! non-exclusive: a value matching several rules is tagged with every
//! matching label, and a value matching none is dropped.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label used by the catch-all mapping.
pub const ALL_LABEL: &str = "All";

/// One `(label, pattern)` rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelRule {
    pub label: String,
    pub pattern: String,
}

/// Label specification as accepted in configuration files.
///
/// - `"Urgences"` is shorthand for `{"Urgences": "Urgences"}`
/// - `{"Urg": "urgence", "Hospit": "hospitalis"}` maps labels to patterns
/// - `[{"label": ..., "pattern": ...}]` keeps an explicit rule order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LabelSpec {
    Single(String),
    Rules(Vec<LabelRule>),
    Map(BTreeMap<String, String>),
}

impl LabelSpec {
    /// Catch-all spec tagging every value with [`ALL_LABEL`].
    pub fn all() -> Self {
        LabelSpec::Rules(vec![LabelRule {
            label: ALL_LABEL.to_string(),
            pattern: ".*".to_string(),
        }])
    }

    /// Flatten into ordered rules.
    pub fn rules(&self) -> Vec<LabelRule> {
        match self {
            LabelSpec::Single(s) => vec![LabelRule {
                label: s.clone(),
                pattern: s.clone(),
            }],
            LabelSpec::Rules(rules) => rules.clone(),
            LabelSpec::Map(map) => map
                .iter()
                .map(|(label, pattern)| LabelRule {
                    label: label.clone(),
                    pattern: pattern.clone(),
                })
                .collect(),
        }
    }
}

/// Compiled label mapping.
#[derive(Debug, Clone)]
pub struct LabelMapping {
    rules: Vec<(String, Regex)>,
}

impl LabelMapping {
    /// Compile a configuration spec. Fails on the first invalid pattern.
    pub fn compile(spec: &LabelSpec) -> Result<Self> {
        Self::from_rules(&spec.rules())
    }

    /// Compile an explicit list of rules.
    pub fn from_rules(rules: &[LabelRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::InvalidLabelPattern {
                    label: rule.label.clone(),
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                })?;
            compiled.push((rule.label.clone(), regex));
        }
        Ok(LabelMapping { rules: compiled })
    }

    /// Labels whose pattern matches `value`, in rule order.
    pub fn matching_labels<'a>(&'a self, value: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |(_, re)| re.is_match(value))
            .map(|(label, _)| label.as_str())
    }

    /// Labels in rule order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(label, _)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
