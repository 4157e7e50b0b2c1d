//! Similarity scoring between generated and learned patterns.
//!
//! Uses normalized Levenshtein distance for the pattern strings, key-wise
//! equality for metadata, and the mean of both confidences, combined with
//! fixed weights.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use edi_model::{LearnedPattern, MetadataValue};
use rapidfuzz::distance::levenshtein;

const STRING_WEIGHT: f64 = 0.4;
const METADATA_WEIGHT: f64 = 0.3;
const CONFIDENCE_WEIGHT: f64 = 0.3;

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, counted in characters.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    if a.is_empty() || b.is_empty() || longest == 0 {
        return 0.0;
    }
    let distance = levenshtein::distance(a.chars(), b.chars());
    1.0 - distance as f64 / longest as f64
}

/// Fraction of shared keys whose stringified values agree, over the larger key count.
pub fn metadata_similarity(
    a: &BTreeMap<String, MetadataValue>,
    b: &BTreeMap<String, MetadataValue>,
) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matching = a
        .iter()
        .filter(|(key, value)| {
            b.get(*key)
                .is_some_and(|other| other.to_string() == value.to_string())
        })
        .count();
    matching as f64 / a.len().max(b.len()) as f64
}

/// A weighted contribution to a similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityComponent {
    pub name: &'static str,
    pub value: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    /// Final score in `[0, 1]`.
    pub score: f64,
    pub components: Vec<SimilarityComponent>,
}

impl Similarity {
    fn none() -> Self {
        Self {
            score: 0.0,
            components: Vec::new(),
        }
    }

    pub fn explain(&self) -> String {
        if self.components.is_empty() {
            return format!("{:.0}%", self.score * 100.0);
        }
        self.components
            .iter()
            .map(|c| format!("{}: {:.0}%", c.name, c.value * 100.0))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Score two patterns with a component breakdown.
///
/// A pattern compared with an identical copy of itself scores exactly 1.0.
pub fn score(a: &LearnedPattern, b: &LearnedPattern) -> Similarity {
    if a.pattern_type != b.pattern_type {
        return Similarity::none();
    }
    if !a.pattern_string.is_empty() && a == b {
        return Similarity {
            score: 1.0,
            components: Vec::new(),
        };
    }
    let components = vec![
        SimilarityComponent {
            name: "Pattern",
            value: string_similarity(&a.pattern_string, &b.pattern_string),
            weight: STRING_WEIGHT,
        },
        SimilarityComponent {
            name: "Metadata",
            value: metadata_similarity(&a.metadata, &b.metadata),
            weight: METADATA_WEIGHT,
        },
        SimilarityComponent {
            name: "Confidence",
            value: (a.confidence + b.confidence) / 2.0,
            weight: CONFIDENCE_WEIGHT,
        },
    ];
    let total: f64 = components.iter().map(|c| c.value * c.weight).sum();
    Similarity {
        score: total.clamp(0.0, 1.0),
        components,
    }
}

pub fn similarity(a: &LearnedPattern, b: &LearnedPattern) -> f64 {
    score(a, b).score
}

/// A learned pattern together with its score against a generated one.
#[derive(Debug, Clone)]
pub struct PatternMatch<'a> {
    pub pattern: &'a LearnedPattern,
    pub similarity: Similarity,
}

/// Every learned pattern scoring at least `threshold`, most similar first.
pub fn find_most_similar<'a>(
    generated: &LearnedPattern,
    learned: &'a [LearnedPattern],
    threshold: f64,
) -> Vec<PatternMatch<'a>> {
    let mut matches: Vec<PatternMatch<'a>> = learned
        .iter()
        .filter_map(|pattern| {
            let similarity = score(generated, pattern);
            (similarity.score >= threshold).then_some(PatternMatch {
                pattern,
                similarity,
            })
        })
        .collect();
    matches.sort_by(|a, b| {
        b.similarity
            .score
            .partial_cmp(&a.similarity.score)
            .unwrap_or(Ordering::Equal)
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_similarity_edges() {
        assert_eq!(string_similarity("ABC", "ABC"), 1.0);
        assert_eq!(string_similarity("", ""), 1.0);
        assert_eq!(string_similarity("", "ABC"), 0.0);
        assert_eq!(string_similarity("ABC", ""), 0.0);
        assert!((string_similarity("ABCD", "ABCE") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn metadata_similarity_counts_equal_values() {
        let a: BTreeMap<String, MetadataValue> = [
            ("length".to_string(), MetadataValue::from(15)),
            ("line".to_string(), MetadataValue::from("A")),
        ]
        .into_iter()
        .collect();
        let mut b = a.clone();
        b.insert("line".to_string(), MetadataValue::from("B"));
        b.insert("extra".to_string(), MetadataValue::from(true));
        assert!((metadata_similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(metadata_similarity(&a, &BTreeMap::new()), 0.0);
    }

    #[test]
    fn integer_and_text_metadata_compare_by_string() {
        let a: BTreeMap<String, MetadataValue> =
            [("length".to_string(), MetadataValue::from(15))].into_iter().collect();
        let b: BTreeMap<String, MetadataValue> =
            [("length".to_string(), MetadataValue::from("15"))].into_iter().collect();
        assert_eq!(metadata_similarity(&a, &b), 1.0);
    }

    #[test]
    fn weighted_sum_without_identity() {
        let a = LearnedPattern::new("field", "vProd", "13,2,0").with_confidence(0.5);
        let b = LearnedPattern::new("field", "vProd", "13,2,0").with_confidence(1.0);
        let result = score(&a, &b);
        // 0.4 * 1.0 + 0.3 * 0.0 + 0.3 * 0.75
        assert!((result.score - 0.625).abs() < 1e-9);
        assert_eq!(result.components.len(), 3);
        assert!(result.explain().starts_with("Pattern: 100%"));
    }

    #[test]
    fn results_are_sorted_and_thresholded() {
        let generated = LearnedPattern::new("field", "vNF", "13,2,0");
        let learned = vec![
            LearnedPattern::new("field", "x", "zzzzzz").with_confidence(0.1),
            LearnedPattern::new("field", "vNF", "13,2,0"),
            LearnedPattern::new("field", "vNF", "13,4,0"),
            LearnedPattern::new("line", "vNF", "13,2,0"),
        ];
        let matches = find_most_similar(&generated, &learned, 0.5);
        let strings: Vec<&str> = matches
            .iter()
            .map(|m| m.pattern.pattern_string.as_str())
            .collect();
        assert_eq!(strings, ["13,2,0", "13,4,0"]);
    }
}
