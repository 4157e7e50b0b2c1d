//! Whole-record validation.

use std::collections::BTreeMap;

use edi_model::Layout;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::issue::Issue;
use crate::line::{LineReport, ValidationOutcome, validate_line};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReport {
    pub layout: String,
    /// One report per input line, in input order.
    pub lines: Vec<LineReport>,
    /// Occurrence and matching issues that belong to no single line.
    pub issues: Vec<Issue>,
}

impl RecordReport {
    pub fn is_valid(&self) -> bool {
        self.lines.iter().all(LineReport::is_valid) && !self.issues.iter().any(Issue::is_error)
    }

    /// Flatten into one outcome; line messages are prefixed with their 1-based number.
    pub fn outcome(&self) -> ValidationOutcome {
        let mut outcome = ValidationOutcome {
            valid: self.is_valid(),
            ..ValidationOutcome::default()
        };
        for (index, report) in self.lines.iter().enumerate() {
            for issue in &report.issues {
                let message = format!("line {} ({}): {issue}", index + 1, report.line);
                if issue.is_error() {
                    outcome.errors.push(message);
                } else {
                    outcome.warnings.push(message);
                }
            }
        }
        for issue in &self.issues {
            if issue.is_error() {
                outcome.errors.push(issue.to_string());
            } else {
                outcome.warnings.push(issue.to_string());
            }
        }
        outcome
    }

    pub fn error_count(&self) -> usize {
        self.lines
            .iter()
            .flat_map(|report| &report.issues)
            .chain(&self.issues)
            .filter(|issue| issue.is_error())
            .count()
    }
}

/// Validate every line of `text` against `layout`.
///
/// Lines are matched to definitions with [`Layout::match_line`]; `\n` and
/// `\r\n` terminators are both accepted. Blank trailing lines are ignored.
pub fn validate_record(text: &str, layout: &Layout) -> RecordReport {
    let mut lines = Vec::new();
    let mut issues = Vec::new();
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();

    let raw_lines: Vec<&str> = text.lines().collect();
    let used = raw_lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |last| last + 1);

    for (index, raw) in raw_lines[..used].iter().enumerate() {
        match layout.match_line(raw, index) {
            Some(def) => {
                *counts.entry(def.name.as_str()).or_default() += 1;
                lines.push(validate_line(raw, def, layout.line_width));
            }
            None => {
                issues.push(Issue::UnmatchedLine { index });
                lines.push(LineReport {
                    line: String::new(),
                    issues: Vec::new(),
                });
            }
        }
    }

    for def in &layout.lines {
        let found = counts.get(def.name.as_str()).copied().unwrap_or(0);
        let minimum = if def.required {
            def.min_occurs.max(1)
        } else {
            def.min_occurs
        };
        if found < minimum {
            issues.push(Issue::MissingLine {
                line: def.name.clone(),
                min_occurs: minimum,
                found,
            });
        }
        if let Some(max_occurs) = def.max_occurs
            && found > max_occurs
        {
            issues.push(Issue::TooManyOccurrences {
                line: def.name.clone(),
                max_occurs,
                found,
            });
        }
    }

    let report = RecordReport {
        layout: layout.id.clone(),
        lines,
        issues,
    };
    debug!(
        layout = %layout.id,
        line_count = report.lines.len(),
        errors = report.error_count(),
        "record validated"
    );
    report
}
