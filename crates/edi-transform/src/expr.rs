//! Rule expressions.
//!
//! A rule's text holds pseudo-assignment statements such as
//! `infNFe/ide/cUF = GetConfig("UF");`. They are parsed once into a small
//! tagged AST; functions outside the recognised set become
//! [`Expression::Unknown`] instead of failing.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use edi_model::Mapping;
use regex::Regex;

use crate::sanitize::strip_quotes;

static ASSIGNMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_@][\w/.:@-]*)\s*=\s*([A-Za-z_][\w.]*)\s*\(([^()]*)\)\s*;?")
        .expect("Invalid assignment regex")
});

static MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<%|%>|\bBEGIN\b|\bEND\b").expect("Invalid marker regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

const CONFIG_FUNCTIONS: &[&str] = &["getconfig", "config", "configvalue", "getparametro"];
const CONCAT_FUNCTIONS: &[&str] = &["concat", "string.concat", "concatenar"];

/// Argument of a concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    /// Bare field name, resolved like a link mapping.
    Reference(String),
}

impl Operand {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let quoted = trimmed.len() >= 2
            && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
                || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
        if quoted {
            Self::Literal(strip_quotes(trimmed))
        } else {
            Self::Reference(trimmed.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    ConfigLookup { key: String },
    Concat(Operand, Operand),
    Unknown { function: String, raw: String },
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigLookup { key } => write!(f, "config({key})"),
            Self::Concat(a, b) => write!(f, "concat({a:?}, {b:?})"),
            Self::Unknown { raw, .. } => f.write_str(raw),
        }
    }
}

/// One `target = expression` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub target: String,
    pub expression: Expression,
}

/// Statements of a mapping plus the warnings collected while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRules {
    pub statements: Vec<Statement>,
    pub warnings: Vec<String>,
}

/// Remove begin/end markers and collapse whitespace.
pub fn normalize_expression(text: &str) -> String {
    let unmarked = MARKER_REGEX.replace_all(text, " ");
    WHITESPACE_REGEX
        .replace_all(unmarked.trim(), " ")
        .trim()
        .to_string()
}

/// Parse the statements of one expression text, in textual order.
pub fn parse_statements(text: &str) -> Vec<Statement> {
    let normalized = normalize_expression(text);
    ASSIGNMENT_REGEX
        .captures_iter(&normalized)
        .map(|caps| {
            let target = caps[1].trim_matches('/').to_string();
            let function = caps[2].to_string();
            let args = &caps[3];
            Statement {
                target,
                expression: classify(&function, args, &caps[0]),
            }
        })
        .collect()
}

fn classify(function: &str, args: &str, raw: &str) -> Expression {
    let lower = function.to_ascii_lowercase();
    let operands = split_arguments(args);
    if CONFIG_FUNCTIONS.contains(&lower.as_str()) && operands.len() == 1 {
        return Expression::ConfigLookup {
            key: strip_quotes(&operands[0]),
        };
    }
    if CONCAT_FUNCTIONS.contains(&lower.as_str()) && operands.len() == 2 {
        return Expression::Concat(Operand::parse(&operands[0]), Operand::parse(&operands[1]));
    }
    Expression::Unknown {
        function: function.to_string(),
        raw: raw.trim().trim_end_matches(';').trim().to_string(),
    }
}

/// Split on commas outside quotes.
fn split_arguments(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in args.chars() {
        match (quote, ch) {
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (Some(open), c) if c == open => {
                quote = None;
                current.push(ch);
            }
            (None, ',') => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current);
    }
    parts.into_iter().map(|p| p.trim().to_string()).collect()
}

/// Parse every rule of `mapping` in ascending sequence.
///
/// Statements are deduplicated by target path; the first occurrence wins.
/// Unknown functions are kept and reported as warnings.
pub fn parse_rules(mapping: &Mapping) -> ParsedRules {
    let mut seen = BTreeSet::new();
    let mut parsed = ParsedRules::default();
    for rule in mapping.ordered_rules() {
        let statements = parse_statements(&rule.expression);
        if statements.is_empty() && !rule.expression.trim().is_empty() {
            parsed.warnings.push(format!(
                "rule {} has no assignment statements",
                rule.sequence
            ));
        }
        for statement in statements {
            if !seen.insert(statement.target.to_ascii_lowercase()) {
                continue;
            }
            if let Expression::Unknown { function, .. } = &statement.expression {
                parsed.warnings.push(format!(
                    "unrecognized function '{function}' for '{}'; emitted empty",
                    statement.target
                ));
            }
            parsed.statements.push(statement);
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::Rule;

    #[test]
    fn parses_config_and_concat() {
        let statements = parse_statements(
            "<% infNFe/ide/cUF = GetConfig(\"UF\"); infNFe/ide/natOp = Concat('Venda ', xProd) %>",
        );
        assert_eq!(
            statements,
            vec![
                Statement {
                    target: "infNFe/ide/cUF".to_string(),
                    expression: Expression::ConfigLookup {
                        key: "UF".to_string()
                    },
                },
                Statement {
                    target: "infNFe/ide/natOp".to_string(),
                    expression: Expression::Concat(
                        Operand::Literal("Venda ".to_string()),
                        Operand::Reference("xProd".to_string())
                    ),
                },
            ]
        );
    }

    #[test]
    fn markers_and_whitespace_are_normalized() {
        assert_eq!(
            normalize_expression("BEGIN\n  a =\tConfig(x)\nEND"),
            "a = Config(x)"
        );
    }

    #[test]
    fn commas_inside_quotes_do_not_split() {
        assert_eq!(split_arguments("'a,b', c"), ["'a,b'", "c"]);
        assert!(split_arguments("").is_empty());
    }

    #[test]
    fn unknown_functions_warn_and_first_target_wins() {
        let mapping = edi_model::Mapping::new("IN", "OUT")
            .with_rule(Rule::new(2, "ide/cNF = Random(8)"))
            .with_rule(Rule::new(1, "ide/cNF = ConfigValue('CNF'); ide/mod = String.Concat(\"5\", \"5\")"));
        let parsed = parse_rules(&mapping);
        assert_eq!(parsed.statements.len(), 2);
        assert_eq!(
            parsed.statements[0].expression,
            Expression::ConfigLookup {
                key: "CNF".to_string()
            }
        );
        assert!(parsed.warnings.is_empty());

        let unknown = edi_model::Mapping::new("IN", "OUT").with_rule(Rule::new(1, "x = Random(8)"));
        let parsed = parse_rules(&unknown);
        assert_eq!(
            parsed.warnings,
            ["unrecognized function 'Random' for 'x'; emitted empty"]
        );
        assert!(matches!(
            parsed.statements[0].expression,
            Expression::Unknown { ref raw, .. } if raw == "x = Random(8)"
        ));
    }
}
