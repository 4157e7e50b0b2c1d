//! Language-model backed provider.
//!
//! Prompt construction and response extraction live here; the transport is
//! behind [`CompletionClient`] so callers plug in whatever HTTP client they use.

use std::fmt::Write as _;

use edi_model::{Alignment, CollaboratorError, DATA_TARGET, LearnedModel, MetadataValue};
use tracing::{debug, trace};

use crate::provider::{ContentProvider, LineRequest};

/// Pattern type of learned line samples.
pub const LINE_EXAMPLE_TYPE: &str = "line_example";
const DEFAULT_EXAMPLE_LIMIT: usize = 3;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const FIRST_TEMPERATURE: f32 = 0.7;
const RETRY_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "You write single lines of fixed-width EDI records. \
Answer with the line only, no explanation, no quotes.";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A completion endpoint. Implementations enforce their own timeout and report
/// it as [`CollaboratorError::Timeout`].
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CollaboratorError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CollaboratorError> {
        (**self).complete(request)
    }
}

pub struct LlmProvider<C> {
    client: C,
    examples: Option<LearnedModel>,
    example_limit: usize,
}

impl<C: CompletionClient> LlmProvider<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            examples: None,
            example_limit: DEFAULT_EXAMPLE_LIMIT,
        }
    }

    #[must_use]
    pub fn with_examples(mut self, model: LearnedModel) -> Self {
        self.examples = Some(model);
        self
    }

    #[must_use]
    pub fn with_example_limit(mut self, limit: usize) -> Self {
        self.example_limit = limit;
        self
    }

    pub fn request_for(&self, request: &LineRequest<'_>) -> CompletionRequest {
        let examples = self
            .examples
            .as_ref()
            .map(|model| examples_for_line(model, &request.line.name, self.example_limit))
            .unwrap_or_default();
        CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(request, &examples),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: if request.is_retry() {
                RETRY_TEMPERATURE
            } else {
                FIRST_TEMPERATURE
            },
        }
    }
}

impl<C: CompletionClient> ContentProvider for LlmProvider<C> {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn generate(&mut self, request: &LineRequest<'_>) -> Result<String, CollaboratorError> {
        let completion = self.request_for(request);
        debug!(
            line = %request.line.name,
            attempt = request.attempt,
            prompt_chars = completion.prompt.len(),
            "requesting completion"
        );
        let response = self.client.complete(&completion)?;
        trace!(target: DATA_TARGET, response = %response, "completion received");
        let prefix = request.prefix();
        let line = extract_line(&response, &prefix)
            .ok_or_else(|| CollaboratorError::failed("llm", "response holds no line"))?;
        Ok(pad_to_width(line, request.layout.line_width))
    }
}

/// Learned line samples for `line`, most confident first.
pub fn examples_for_line(model: &LearnedModel, line: &str, limit: usize) -> Vec<String> {
    let mut matches: Vec<_> = model
        .patterns
        .iter()
        .filter(|pattern| pattern.pattern_type == LINE_EXAMPLE_TYPE)
        .filter(|pattern| {
            matches!(
                pattern.metadata.get("line"),
                Some(MetadataValue::Text(name)) if name.eq_ignore_ascii_case(line)
            )
        })
        .collect();
    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matches
        .into_iter()
        .take(limit)
        .map(|pattern| pattern.pattern_string.clone())
        .collect()
}

/// Prompt holding the field table, learned samples and, on retries, the
/// rejected attempt with its validator errors.
pub fn build_prompt(request: &LineRequest<'_>, examples: &[String]) -> String {
    let line = request.line;
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Layout: {} | line: {} | occurrence {}",
        request.layout.display_name(),
        line.name,
        request.occurrence + 1
    );
    let _ = writeln!(
        prompt,
        "The line is exactly {} characters and starts with \"{}\".",
        request.layout.line_width,
        request.prefix()
    );
    prompt.push_str("Fields in order (start is 0-based):\n");
    prompt.push_str("name | start | width | align | required | allowed\n");
    for span in line.field_spans() {
        let field = span.field;
        let allowed = match (&field.fixed_value, &field.domain) {
            (Some(fixed), _) => format!("={fixed}"),
            (None, Some(values)) if !values.is_empty() => values.join("/"),
            _ => field.kind().as_str().to_string(),
        };
        let _ = writeln!(
            prompt,
            "{} | {} | {} | {} | {} | {}",
            field.name,
            span.start,
            span.width,
            alignment_label(field.alignment),
            if field.required { "yes" } else { "no" },
            allowed
        );
    }
    if !examples.is_empty() {
        prompt.push_str("Known good lines:\n");
        for example in examples {
            let _ = writeln!(prompt, "{example}");
        }
    }
    if let Some(previous) = request.previous {
        prompt.push_str("Your previous line was rejected:\n");
        let _ = writeln!(prompt, "{previous}");
        prompt.push_str("Errors:\n");
        for error in request.errors {
            let _ = writeln!(prompt, "- {error}");
        }
        prompt.push_str("Fix every error and answer with the corrected line.\n");
    }
    prompt
}

/// Pull the candidate line out of a completion: code fences are dropped, a
/// line starting with `prefix` wins, otherwise the first non-blank line.
pub fn extract_line<'a>(response: &'a str, prefix: &str) -> Option<&'a str> {
    let mut candidates = response
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim_start().starts_with("```"))
        .filter(|line| !line.trim().is_empty());
    let first = candidates.next()?;
    if prefix.is_empty() || first.starts_with(prefix) {
        return Some(first);
    }
    Some(candidates.find(|line| line.starts_with(prefix)).unwrap_or(first))
}

fn alignment_label(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "left",
        Alignment::Right => "right",
        Alignment::Center => "center",
    }
}

/// Trailing spaces rarely survive a completion round trip.
fn pad_to_width(line: &str, width: usize) -> String {
    let len = line.chars().count();
    let mut text = line.to_string();
    if len < width {
        text.extend(std::iter::repeat_n(' ', width - len));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::{FieldDef, LearnedPattern, Layout, LineDef};

    fn layout() -> Layout {
        Layout::new("NF", "Nota").with_line_width(16).with_line(
            LineDef::new("LINHA001")
                .with_initial_value("01")
                .with_field(FieldDef::new("tpNF", 1, 1).with_domain(["0", "1"]))
                .with_field(FieldDef::new("nNF", 2, 9).required()),
        )
    }

    #[test]
    fn extraction() {
        assert_eq!(extract_line("```\n010001 abc\n```", "010001"), Some("010001 abc"));
        assert_eq!(
            extract_line("Here it is:\n010001xyz\n", "010001"),
            Some("010001xyz")
        );
        assert_eq!(extract_line("only text", "01"), Some("only text"));
        assert_eq!(extract_line("\n```\n```\n", "01"), None);
    }

    #[test]
    fn retry_prompt_carries_feedback() {
        let layout = layout();
        let errors = vec!["required field 'nNF' is blank".to_string()];
        let request = LineRequest {
            layout: &layout,
            line: &layout.lines[0],
            occurrence: 0,
            sequence: 1,
            attempt: 2,
            previous: Some("0100011         "),
            errors: &errors,
        };
        let prompt = build_prompt(&request, &["0100010000000042".to_string()]);
        assert!(prompt.contains("exactly 16 characters"));
        assert!(prompt.contains("tpNF | 6 | 1 | left | no | 0/1"));
        assert!(prompt.contains("0100010000000042"));
        assert!(prompt.contains("- required field 'nNF' is blank"));
    }

    #[test]
    fn examples_are_filtered_by_line() {
        let mut model = LearnedModel::new("NF");
        model.patterns = vec![
            LearnedPattern::new(LINE_EXAMPLE_TYPE, "a", "low")
                .with_confidence(0.2)
                .with_metadata("line", "LINHA001"),
            LearnedPattern::new(LINE_EXAMPLE_TYPE, "b", "high")
                .with_confidence(0.9)
                .with_metadata("line", "linha001"),
            LearnedPattern::new(LINE_EXAMPLE_TYPE, "c", "other").with_metadata("line", "LINHA002"),
            LearnedPattern::new("field", "d", "field").with_metadata("line", "LINHA001"),
        ];
        assert_eq!(examples_for_line(&model, "LINHA001", 5), vec!["high", "low"]);
        assert_eq!(examples_for_line(&model, "LINHA001", 1), vec!["high"]);
    }
}
