//! Field-kind heuristics.
//!
//! Layout catalogues rarely declare a field's semantic kind, so it is inferred
//! from naming conventions (Portuguese and English tokens). The token lists are
//! data, not code: they deserialize from the `[heuristics]` table of the
//! configuration file and make no claim of completeness.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::layout::{FieldDef, FieldKind, FieldLength, Layout};

/// `N,M` precision annotations embedded in free-text descriptions.
static PRECISION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*,\s*(\d+)").expect("Invalid precision regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldHeuristics {
    /// Case-insensitive substrings marking monetary / decimal fields.
    pub monetary_tokens: Vec<String>,
    /// Treat `v` followed by an uppercase letter (`vProd`, `vICMS`) as monetary.
    pub monetary_prefix_rule: bool,
    /// Case-insensitive name prefixes marking date fields.
    pub date_tokens: Vec<String>,
    /// Case-insensitive name prefixes marking numeric fields.
    pub numeric_tokens: Vec<String>,
    /// Decimal places assumed when a description carries no `N,M` annotation.
    pub default_decimals: u32,
}

impl Default for FieldHeuristics {
    fn default() -> Self {
        let tokens = |values: &[&str]| values.iter().map(|v| (*v).to_string()).collect();
        Self {
            monetary_tokens: tokens(&[
                "valor", "vlr", "preco", "preço", "price", "total", "value", "amount", "montante",
            ]),
            monetary_prefix_rule: true,
            date_tokens: tokens(&["data", "date", "dt", "dh"]),
            numeric_tokens: tokens(&["qtd", "qtde", "quant", "num", "nro", "nr", "seq"]),
            default_decimals: 2,
        }
    }
}

impl FieldHeuristics {
    pub fn is_monetary(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        if self
            .monetary_tokens
            .iter()
            .any(|token| lower.contains(&token.to_lowercase()))
        {
            return true;
        }
        if self.monetary_prefix_rule {
            let mut chars = name.chars();
            if let (Some('v'), Some(next)) = (chars.next(), chars.next()) {
                return next.is_ascii_uppercase();
            }
        }
        false
    }

    pub fn is_date(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.date_tokens
            .iter()
            .any(|token| lower.starts_with(&token.to_lowercase()))
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.numeric_tokens
            .iter()
            .any(|token| lower.starts_with(&token.to_lowercase()))
    }

    /// Decimal places declared by the last `N,M` annotation of `description`, if any.
    pub fn annotated_decimals(&self, description: Option<&str>) -> Option<u32> {
        description
            .and_then(|text| PRECISION_REGEX.captures_iter(text).last())
            .and_then(|caps| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Decimal places from the description annotation, or the configured default.
    pub fn decimal_places(&self, description: Option<&str>) -> u32 {
        self.annotated_decimals(description)
            .unwrap_or(self.default_decimals)
    }

    /// Infer the kind of one field.
    pub fn classify(&self, field: &FieldDef) -> FieldKind {
        if let FieldLength::Packed { decimals, .. } = field.length {
            return FieldKind::Decimal {
                scale: clamp_scale(decimals),
            };
        }
        if self.is_monetary(&field.name) {
            return FieldKind::Decimal {
                scale: clamp_scale(self.decimal_places(field.description.as_deref())),
            };
        }
        if self.is_date(&field.name) {
            return FieldKind::Date;
        }
        let enumerated_digits = field.domain.as_ref().is_some_and(|values| {
            !values.is_empty()
                && values
                    .iter()
                    .all(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
        });
        if self.is_numeric(&field.name) || enumerated_digits {
            return FieldKind::Numeric;
        }
        FieldKind::Text
    }

    /// Fill in the kind of every field that does not declare one.
    pub fn resolve(&self, layout: &mut Layout) {
        for line in &mut layout.lines {
            for field in &mut line.fields {
                if field.kind.is_none() {
                    field.kind = Some(self.classify(field));
                }
            }
        }
    }
}

fn clamp_scale(decimals: u32) -> u8 {
    u8::try_from(decimals).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LineDef;

    #[test]
    fn monetary_by_token_and_prefix_rule() {
        let heuristics = FieldHeuristics::default();
        assert!(heuristics.is_monetary("ValorTotal"));
        assert!(heuristics.is_monetary("vProd"));
        assert!(heuristics.is_monetary("PRECO_UNIT"));
        assert!(!heuristics.is_monetary("versao"));
        assert!(!heuristics.is_monetary("xNome"));
    }

    #[test]
    fn decimal_places_reads_description() {
        let heuristics = FieldHeuristics::default();
        assert_eq!(heuristics.decimal_places(Some("Valor do item (13,4)")), 4);
        assert_eq!(heuristics.decimal_places(Some("sem precisao")), 2);
        assert_eq!(heuristics.decimal_places(None), 2);
    }

    #[test]
    fn resolve_keeps_declared_kinds() {
        let mut layout = Layout::new("L", "L").with_line(
            LineDef::new("LINHA000")
                .with_field(FieldDef::new("vNF", 1, 15))
                .with_field(FieldDef::new("dtEmissao", 2, 8))
                .with_field(FieldDef::new("qtdItens", 3, 4))
                .with_field(FieldDef::new("valorFixo", 4, 4).with_kind(FieldKind::Text))
                .with_field(FieldDef::new("tpAmb", 5, 1).with_domain(["1", "2"])),
        );
        FieldHeuristics::default().resolve(&mut layout);
        let kinds: Vec<FieldKind> = layout.lines[0].fields.iter().map(FieldDef::kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Decimal { scale: 2 },
                FieldKind::Date,
                FieldKind::Numeric,
                FieldKind::Text,
                FieldKind::Numeric,
            ]
        );
    }
}
