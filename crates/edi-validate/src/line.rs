//! Single-line validation.

use edi_model::{FieldSpan, LineDef, ValidationFailure};
use serde::{Deserialize, Serialize};

use crate::issue::Issue;

/// Issues found on one line, in check order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReport {
    pub line: String,
    pub issues: Vec<Issue>,
}

impl LineReport {
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(Issue::is_error)
    }

    pub fn errors(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|issue| issue.is_error())
            .map(ToString::to_string)
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|issue| !issue.is_error())
            .map(ToString::to_string)
            .collect()
    }

    pub fn outcome(&self) -> ValidationOutcome {
        ValidationOutcome {
            valid: self.is_valid(),
            errors: self.errors(),
            warnings: self.warnings(),
        }
    }

    /// The failure to feed back into synthesis, or `None` when the line is valid.
    pub fn failure(&self) -> Option<ValidationFailure> {
        (!self.is_valid()).then(|| ValidationFailure {
            line: self.line.clone(),
            errors: self.errors(),
        })
    }
}

/// Flattened validation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate one candidate line against its definition.
///
/// Every check runs; issues accumulate instead of stopping at the first one.
/// An empty line only reports its shape, there is nothing to slice.
pub fn validate_line(text: &str, def: &LineDef, line_width: usize) -> LineReport {
    let chars: Vec<char> = text.chars().collect();
    let mut issues = Vec::new();

    // 1. Non-empty
    if chars.is_empty() {
        issues.push(Issue::EmptyLine);
    }

    // 2. Exact width
    if chars.len() != line_width {
        issues.push(Issue::WidthMismatch {
            expected: line_width,
            actual: chars.len(),
        });
    }

    if chars.is_empty() {
        return LineReport {
            line: def.name.clone(),
            issues,
        };
    }

    // 3. Identifying prefix
    if !def.initial_value.is_empty() && !text.starts_with(&def.initial_value) {
        let found: String = chars
            .iter()
            .take(def.initial_value.chars().count())
            .collect();
        issues.push(Issue::PrefixMismatch {
            expected: def.initial_value.clone(),
            found,
        });
    }

    // 4. Fields at their recomputed offsets
    for span in def.field_spans() {
        check_field(&chars, &span, &mut issues);
    }

    LineReport {
        line: def.name.clone(),
        issues,
    }
}

fn check_field(chars: &[char], span: &FieldSpan<'_>, issues: &mut Vec<Issue>) {
    let field = span.field;
    if span.width == 0 {
        return;
    }
    if span.start >= chars.len() {
        issues.push(Issue::OutOfBounds {
            field: field.name.clone(),
            start: span.start,
            line_length: chars.len(),
        });
        return;
    }
    let end = span.end().min(chars.len());
    if end < span.end() {
        issues.push(Issue::Truncated {
            field: field.name.clone(),
            declared: span.width,
            available: end - span.start,
        });
    }
    let raw: String = chars[span.start..end].iter().collect();
    let value = raw.trim();

    if field.required && value.is_empty() {
        issues.push(Issue::RequiredBlank {
            field: field.name.clone(),
        });
    }
    if value.is_empty() {
        return;
    }
    if let Some(domain) = field.domain.as_ref().filter(|values| !values.is_empty())
        && !domain.iter().any(|allowed| allowed.trim() == value)
    {
        issues.push(Issue::DomainViolation {
            field: field.name.clone(),
            value: value.to_string(),
        });
    }
    if let Some(expected) = &field.fixed_value
        && expected.trim() != value
    {
        issues.push(Issue::FixedValueMismatch {
            field: field.name.clone(),
            expected: expected.clone(),
            found: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::{Alignment, FieldDef};

    fn detail() -> LineDef {
        LineDef::new("LINHA000")
            .with_field(FieldDef::new("nome", 1, 10).required())
            .with_field(FieldDef::new("codigo", 2, 5).with_alignment(Alignment::Right))
    }

    #[test]
    fn exact_line_is_valid() {
        let report = validate_line("000001JOAO      00042", &detail(), 21);
        assert!(report.is_valid(), "{:?}", report.issues);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn issues_accumulate() {
        let report = validate_line("000001          ", &detail(), 21);
        assert_eq!(
            report.issues,
            vec![
                Issue::WidthMismatch {
                    expected: 21,
                    actual: 16
                },
                Issue::RequiredBlank {
                    field: "nome".to_string()
                },
                Issue::OutOfBounds {
                    field: "codigo".to_string(),
                    start: 16,
                    line_length: 16
                },
            ]
        );
    }

    #[test]
    fn partial_field_is_a_warning() {
        let report = validate_line("000001JOAO      000", &detail(), 19);
        assert!(report.is_valid());
        assert_eq!(report.warnings().len(), 1);
        assert!(report.warnings()[0].contains("truncated: 3 of 5"));
    }

    #[test]
    fn empty_line_reports_shape_only() {
        let report = validate_line("", &detail(), 21);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0], Issue::EmptyLine);
        let failure = report.failure().unwrap();
        assert_eq!(failure.line, "LINHA000");
        assert_eq!(failure.errors.len(), 2);
    }

    #[test]
    fn prefix_domain_and_fixed_value() {
        let header = LineDef::new("HEADER")
            .with_initial_value("NF")
            .with_field(FieldDef::new("tpAmb", 1, 1).with_domain(["1", "2"]))
            .with_field(FieldDef::new("versao", 2, 4).with_fixed_value("4.00"));
        let report = validate_line("XX93.10", &header, 7);
        let outcome = report.outcome();
        assert!(!outcome.valid);
        assert_eq!(outcome.errors, ["line prefix 'XX' does not match 'NF'"]);
        assert_eq!(outcome.warnings.len(), 2);
    }
}
