//! Learned structures consumed by the pattern comparator.
//!
//! Confidence values are supplied by whoever trained the model; the core reads
//! them but never recomputes them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar metadata value attached to a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Pattern family, e.g. `field` or `line`. Patterns of different types never match.
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub name: String,
    pub pattern_string: String,
    #[serde(default)]
    pub frequency: u32,
    /// In `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl LearnedPattern {
    pub fn new(
        pattern_type: impl Into<String>,
        name: impl Into<String>,
        pattern_string: impl Into<String>,
    ) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            name: name.into(),
            pattern_string: pattern_string.into(),
            frequency: 1,
            confidence: 1.0,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A confidence-scored field-to-element association learned from past mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedMappingRule {
    /// Line holding the source field in the intermediate record.
    #[serde(default)]
    pub source_line: Option<String>,
    pub source_field: String,
    pub target_element: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedModel {
    pub layout_name: String,
    #[serde(default)]
    pub patterns: Vec<LearnedPattern>,
    #[serde(default)]
    pub mapping_rules: Vec<LearnedMappingRule>,
}

impl LearnedModel {
    pub fn new(layout_name: impl Into<String>) -> Self {
        Self {
            layout_name: layout_name.into(),
            patterns: Vec::new(),
            mapping_rules: Vec::new(),
        }
    }

    /// Learned rules targeting `element` (case-insensitive) with at least `min_confidence`,
    /// most confident first.
    pub fn rules_for_element(&self, element: &str, min_confidence: f64) -> Vec<&LearnedMappingRule> {
        let mut rules: Vec<&LearnedMappingRule> = self
            .mapping_rules
            .iter()
            .filter(|rule| {
                rule.confidence >= min_confidence
                    && rule
                        .target_element
                        .rsplit('/')
                        .next()
                        .is_some_and(|last| last.eq_ignore_ascii_case(element))
            })
            .collect();
        rules.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        rules
    }
}
