//! Learned-pattern comparison for generated maps.
//!
//! Generated map fields are turned into `field` patterns and compared against
//! a learned model. Low-confidence field lengths can be rewritten from a
//! sufficiently similar learned pattern; everything else only produces
//! advisories.

use edi_model::{FieldLength, LearnedModel, LearnedPattern, MetadataValue};
use tracing::{debug, info};

use crate::score::find_most_similar;
use crate::tcl::{GeneratedMap, MapField};

/// Pattern type of map fields.
pub const FIELD_PATTERN: &str = "field";

/// Matches below this score are reported as novel.
pub const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Generated fields below this confidence are candidates for refinement.
pub const LOW_CONFIDENCE: f64 = 0.6;

/// Minimum similarity a learned pattern needs to override a generated length.
pub const REFINE_THRESHOLD: f64 = 0.75;

/// Pattern describing one generated map field.
pub fn field_pattern(line_identifier: &str, field: &MapField) -> LearnedPattern {
    LearnedPattern::new(FIELD_PATTERN, &field.name, field.length.to_string())
        .with_confidence(field.confidence)
        .with_metadata("line", line_identifier)
        .with_metadata("length", field.length.width() as i64)
}

/// Patterns for every field of `map`, in map order.
pub fn map_patterns(map: &GeneratedMap) -> Vec<LearnedPattern> {
    map.lines
        .iter()
        .flat_map(|line| {
            line.fields
                .iter()
                .map(|field| field_pattern(&line.identifier, field))
        })
        .collect()
}

/// Human-readable advisories comparing `generated` against `learned`.
///
/// Advisories are never applied automatically.
pub fn suggest_improvements(generated: &LearnedPattern, learned: &[LearnedPattern]) -> Vec<String> {
    let matches = find_most_similar(generated, learned, SUGGESTION_THRESHOLD);
    let Some(best) = matches.first() else {
        return vec![format!(
            "no similar pattern for '{}'; possibly novel",
            generated.name
        )];
    };
    let pattern = best.pattern;
    let mut advisories = Vec::new();
    if pattern.pattern_string != generated.pattern_string {
        advisories.push(format!(
            "'{}': generated '{}' differs from learned '{}' ({})",
            generated.name,
            generated.pattern_string,
            pattern.pattern_string,
            best.similarity.explain()
        ));
    }
    if pattern.confidence > generated.confidence {
        advisories.push(format!(
            "'{}': learned pattern is more confident ({:.0}% vs {:.0}%)",
            generated.name,
            pattern.confidence * 100.0,
            generated.confidence * 100.0
        ));
    }
    if pattern.frequency > generated.frequency {
        advisories.push(format!(
            "'{}': learned pattern '{}' was seen {} times",
            generated.name, pattern.pattern_string, pattern.frequency
        ));
    }
    if advisories.is_empty() {
        advisories.push(format!(
            "'{}': matches learned pattern ({:.0}%)",
            generated.name,
            best.similarity.score * 100.0
        ));
    }
    advisories
}

/// Advisories for every field of a generated map.
pub fn suggest_for_map(map: &GeneratedMap, model: &LearnedModel) -> Vec<String> {
    map_patterns(map)
        .iter()
        .flat_map(|pattern| suggest_improvements(pattern, &model.patterns))
        .collect()
}

/// Result of refining a map against a learned model.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub map: GeneratedMap,
    pub advisories: Vec<String>,
    pub rewritten: usize,
}

/// Rewrites low-confidence field lengths from learned patterns.
#[derive(Debug, Clone)]
pub struct MapRefiner<'a> {
    model: &'a LearnedModel,
    low_confidence: f64,
    threshold: f64,
}

impl<'a> MapRefiner<'a> {
    pub fn new(model: &'a LearnedModel) -> Self {
        Self {
            model,
            low_confidence: LOW_CONFIDENCE,
            threshold: REFINE_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn refine(&self, map: &GeneratedMap) -> Refinement {
        let mut refined = map.clone();
        let mut advisories = Vec::new();
        let mut rewritten = 0;

        for line in &mut refined.lines {
            for field in &mut line.fields {
                if field.confidence >= self.low_confidence {
                    continue;
                }
                let generated = field_pattern(&line.identifier, field);
                match self.replacement(&generated, field) {
                    Some((learned, length, score)) => {
                        advisories.push(format!(
                            "line {} field '{}': length {} replaced by learned {} (similarity {:.0}%)",
                            line.identifier,
                            field.name,
                            field.length,
                            length,
                            score * 100.0
                        ));
                        debug!(
                            line = %line.identifier,
                            field = %field.name,
                            from = %field.length,
                            to = %length,
                            "refined field length"
                        );
                        field.length = length;
                        field.confidence = learned.confidence;
                        rewritten += 1;
                    }
                    None => advisories.push(format!(
                        "line {} field '{}': low confidence ({:.0}%) for {}; no learned pattern confirms it",
                        line.identifier,
                        field.name,
                        field.confidence * 100.0,
                        field.length
                    )),
                }
            }
        }
        info!(rewritten, advisories = advisories.len(), "map refinement finished");
        Refinement {
            map: refined,
            advisories,
            rewritten,
        }
    }

    /// Best learned pattern for the same field name that keeps the field width.
    fn replacement(
        &self,
        generated: &LearnedPattern,
        field: &MapField,
    ) -> Option<(&'a LearnedPattern, FieldLength, f64)> {
        let width = field.length.width();
        find_most_similar(generated, &self.model.patterns, self.threshold)
            .into_iter()
            .filter(|m| m.pattern.name.eq_ignore_ascii_case(&generated.name))
            .filter(|m| m.pattern.confidence > generated.confidence)
            .filter(|m| learned_width(m.pattern) == Some(width))
            .find_map(|m| {
                let length = FieldLength::parse(&m.pattern.pattern_string)?;
                (length.width() == width).then_some((m.pattern, length, m.similarity.score))
            })
    }
}

fn learned_width(pattern: &LearnedPattern) -> Option<usize> {
    match pattern.metadata.get("length")? {
        MetadataValue::Integer(value) => usize::try_from(*value).ok(),
        MetadataValue::Text(value) => value.trim().parse().ok(),
        MetadataValue::Float(_) | MetadataValue::Bool(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learned(pattern_string: &str, width: i64, confidence: f64) -> LearnedPattern {
        LearnedPattern::new(FIELD_PATTERN, "vProd", pattern_string)
            .with_confidence(confidence)
            .with_frequency(12)
            .with_metadata("line", "A")
            .with_metadata("length", width)
    }

    #[test]
    fn novel_pattern_advisory() {
        let generated = LearnedPattern::new(FIELD_PATTERN, "xPed", "15");
        let advisories = suggest_improvements(&generated, &[]);
        assert_eq!(advisories, ["no similar pattern for 'xPed'; possibly novel"]);
    }

    #[test]
    fn advisories_compare_confidence_and_frequency() {
        let generated = LearnedPattern::new(FIELD_PATTERN, "vProd", "13,2,0")
            .with_confidence(0.5)
            .with_metadata("line", "A")
            .with_metadata("length", 15);
        let advisories = suggest_improvements(&generated, &[learned("11,4,0", 15, 1.0)]);
        assert_eq!(advisories.len(), 3);
        assert!(advisories[0].contains("differs from learned '11,4,0'"));
        assert!(advisories[1].contains("more confident (100% vs 50%)"));
        assert!(advisories[2].contains("seen 12 times"));
    }
}
