//! Ranked lookup candidates for link mappings.
//!
//! Ranking is a pure function of the mapping (plus optional learned rules and
//! input layout). Each candidate renders to an XPath for the template and can
//! be evaluated directly against an in-memory intermediate record, so the
//! fallback behaviour is testable without an XSLT engine.

use std::collections::HashSet;

use edi_model::{IntermediateRecord, Layout, LearnedModel, LinkMapping, RecordNode};

use crate::sanitize::{is_plain_name, sanitize_name};

/// Line names that most intermediate records use, tried in this order.
pub const COMMON_LINES: &[&str] = &[
    "HEADER", "LINHA000", "LINHA001", "LINHA002", "LINHA003", "TRAILER", "A", "B", "C", "D", "E",
    "F", "G", "H", "chave",
];

/// Candidates embedded in one fallback chain.
pub const MAX_EMBEDDED_CANDIDATES: usize = 5;

/// Learned rules below this confidence are ignored.
pub const LEARNED_CONFIDENCE: f64 = 0.8;

/// Case folding shared by the emitted `translate()` calls and in-memory
/// matching: ASCII plus the accented Latin-1 capitals of Portuguese names.
/// Both strings hold the same number of characters, position by position.
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZÁÀÂÃÄÇÉÈÊËÍÌÎÏÑÓÒÔÕÖÚÙÛÜ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyzáàâãäçéèêëíìîïñóòôõöúùûü";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupCandidate {
    /// Field named by a learned mapping rule.
    Learned { line: Option<String>, field: String },
    /// Exact name under a known line.
    Structured { line: String, name: String },
    /// Case-insensitive name under any line.
    StructuredCi { name: String },
    /// Case-insensitive name anywhere in the record.
    AnywhereCi { name: String },
    /// Any element whose name contains `fragment`, case-insensitive.
    Contains { fragment: String },
    /// Name compared with underscores removed, case-insensitive.
    Normalized { name: String },
    /// Direct child of the record root.
    RootChild { name: String },
}

impl LookupCandidate {
    pub fn to_xpath(&self) -> String {
        match self {
            Self::Learned {
                line: Some(line),
                field,
            } => format!("/*/{}/{}", step(line), step(field)),
            Self::Learned { line: None, field } => format!("//{}", step(field)),
            Self::Structured { line, name } => format!("/*/{}/{}", step(line), step(name)),
            Self::StructuredCi { name } => {
                format!("/*/*/*[{} = '{}']", folded_name(), fold(name))
            }
            Self::AnywhereCi { name } => {
                format!("//*[{} = '{}']", folded_name(), fold(name))
            }
            Self::Contains { fragment } => format!(
                "//*[contains({}, '{}')]",
                folded_name(),
                fold(fragment)
            ),
            Self::Normalized { name } => format!(
                "//*[translate(local-name(), '{UPPER}_', '{LOWER}') = '{}']",
                normalize(name)
            ),
            Self::RootChild { name } => format!("/*/{}", step(name)),
        }
    }

    /// Evaluate against `record`: the string value of the first matching node.
    pub fn resolve(&self, record: &IntermediateRecord) -> Option<String> {
        self.first_match(&record.root).map(RecordNode::string_value)
    }

    fn first_match<'a>(&self, root: &'a RecordNode) -> Option<&'a RecordNode> {
        let under_line = |line: &str, name: &str| {
            root.children
                .iter()
                .filter(|node| node.name == line)
                .flat_map(|node| &node.children)
                .find(|node| node.name == name)
        };
        match self {
            Self::Learned {
                line: Some(line),
                field,
            } => under_line(line.as_str(), field.as_str()),
            Self::Learned { line: None, field } => {
                root.descendants().find(|node| node.name == *field)
            }
            Self::Structured { line, name } => under_line(line.as_str(), name.as_str()),
            Self::StructuredCi { name } => root
                .children
                .iter()
                .flat_map(|node| &node.children)
                .find(|node| fold(&node.name) == fold(name)),
            Self::AnywhereCi { name } => root
                .descendants()
                .find(|node| fold(&node.name) == fold(name)),
            Self::Contains { fragment } => {
                let fragment = fold(fragment);
                root.descendants()
                    .find(|node| fold(&node.name).contains(&fragment))
            }
            Self::Normalized { name } => {
                let wanted = normalize(name);
                root.descendants().find(|node| normalize(&node.name) == wanted)
            }
            Self::RootChild { name } => root.children.iter().find(|node| node.name == *name),
        }
    }
}

/// Path step for a name; names that are not plain go through a `local-name()` test.
fn step(name: &str) -> String {
    if is_plain_name(name) {
        name.to_string()
    } else {
        format!("*[local-name() = '{}']", name.replace('\'', ""))
    }
}

fn folded_name() -> String {
    format!("translate(local-name(), '{UPPER}', '{LOWER}')")
}

/// Lowercase exactly the characters `translate(.., UPPER, LOWER)` lowercases.
fn fold(name: &str) -> String {
    name.chars()
        .map(|c| match UPPER.chars().position(|upper| upper == c) {
            Some(index) => LOWER.chars().nth(index).unwrap_or(c),
            None => c,
        })
        .collect()
}

/// [`fold`] with underscores removed, matching the `Normalized` XPath.
fn normalize(name: &str) -> String {
    fold(&name.replace('_', ""))
}

/// Inputs that widen the ranking beyond the mapping itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankContext<'a> {
    pub learned: Option<&'a LearnedModel>,
    pub layout: Option<&'a Layout>,
}

/// Ranked, de-duplicated lookup candidates for one link mapping.
///
/// Order: learned rules, lines of the input layout declaring the field, then
/// the common lines with the sanitized element name and with the raw mapping
/// name, a case-insensitive line search, a case-insensitive search anywhere,
/// containment, normalized name, and finally a direct child of the root.
pub fn rank_candidates(link: &LinkMapping, context: RankContext<'_>) -> Vec<LookupCandidate> {
    let element = sanitize_name(link.element_name());
    let raw = link.name.trim();
    let mut ranked = Vec::new();

    if let Some(model) = context.learned {
        for rule in model.rules_for_element(link.element_name(), LEARNED_CONFIDENCE) {
            ranked.push(LookupCandidate::Learned {
                line: rule.source_line.clone(),
                field: sanitize_name(&rule.source_field),
            });
        }
    }

    if let Some(layout) = context.layout {
        for line in &layout.lines {
            let declares = line.fields.iter().any(|field| {
                let name = sanitize_name(&field.name);
                name.eq_ignore_ascii_case(&element) || field.name.eq_ignore_ascii_case(raw)
            });
            if declares {
                let field_name = line
                    .fields
                    .iter()
                    .map(|field| sanitize_name(&field.name))
                    .find(|name| name.eq_ignore_ascii_case(&element))
                    .unwrap_or_else(|| sanitize_name(raw));
                ranked.push(LookupCandidate::Structured {
                    line: sanitize_name(&line.name),
                    name: field_name,
                });
            }
        }
    }

    for name in [element.as_str(), raw] {
        if name.is_empty() {
            continue;
        }
        for line in COMMON_LINES {
            ranked.push(LookupCandidate::Structured {
                line: (*line).to_string(),
                name: name.to_string(),
            });
        }
    }
    ranked.push(LookupCandidate::StructuredCi {
        name: element.clone(),
    });
    ranked.push(LookupCandidate::AnywhereCi {
        name: element.clone(),
    });
    if !raw.eq_ignore_ascii_case(&element) && fold(&raw).contains(&fold(&element)) {
        ranked.push(LookupCandidate::Contains {
            fragment: element.clone(),
        });
    }
    if element.contains('_') {
        ranked.push(LookupCandidate::Normalized {
            name: element.clone(),
        });
    }
    ranked.push(LookupCandidate::RootChild { name: element });

    dedupe(ranked)
}

/// Remove candidates rendering to an XPath already seen, preserving order.
pub fn dedupe(candidates: Vec<LookupCandidate>) -> Vec<LookupCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.to_xpath()))
        .collect()
}

/// The prefix of a ranking that goes into the generated fallback chain.
pub fn embedded(candidates: &[LookupCandidate]) -> &[LookupCandidate] {
    &candidates[..candidates.len().min(MAX_EMBEDDED_CANDIDATES)]
}

/// How a link mapping's fallback chain resolves for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A candidate produced a non-blank value.
    Value(String),
    /// Every candidate was blank; the default value applies.
    Default(String),
    /// Every candidate was blank and the element is emitted empty.
    Empty,
    /// Every candidate was blank and the element is left out.
    Omitted,
}

/// Evaluate the embedded fallback chain of `link` against `record`, the way
/// the generated template does.
pub fn resolve_link(
    link: &LinkMapping,
    candidates: &[LookupCandidate],
    record: &IntermediateRecord,
) -> Resolution {
    let found = embedded(candidates)
        .iter()
        .filter_map(|candidate| candidate.resolve(record))
        .find(|value| !value.trim().is_empty());
    match (found, &link.default_value) {
        (Some(value), _) => Resolution::Value(value),
        (None, Some(default)) => Resolution::Default(default.clone()),
        (None, None) if link.allow_empty => Resolution::Omitted,
        (None, None) => Resolution::Empty,
    }
}
