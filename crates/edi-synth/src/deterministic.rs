//! Deterministic provider: fixed values first, then domain, then a per-kind default.

use chrono::NaiveDate;
use edi_model::{CollaboratorError, FieldDef, FieldKind};

use crate::documents::{cnpj_from_base, cpf_from_base};
use crate::provider::{ContentProvider, Identifier, LineRequest, identifier_kind};
use crate::values::{format_date, implied_decimal};

const REFERENCE_DATE: (i32, u32, u32) = (2024, 1, 1);
const CNPJ_BASE: [u8; 12] = [1, 1, 2, 2, 2, 3, 3, 3, 0, 0, 0, 1];
const CPF_BASE: [u8; 9] = [5, 2, 9, 9, 8, 2, 2, 4, 7];

#[derive(Debug, Clone)]
pub struct DeterministicProvider {
    reference_date: NaiveDate,
}

impl Default for DeterministicProvider {
    fn default() -> Self {
        let (year, month, day) = REFERENCE_DATE;
        Self {
            reference_date: NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default(),
        }
    }
}

impl DeterministicProvider {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self { reference_date }
    }

    pub fn value(&self, field: &FieldDef, occurrence: u32) -> String {
        if let Some(fixed) = &field.fixed_value {
            return fixed.clone();
        }
        if let Some(first) = field
            .domain
            .as_ref()
            .and_then(|values| values.iter().find(|value| !value.trim().is_empty()))
        {
            return first.clone();
        }
        if field.is_sequential {
            return (occurrence + 1).to_string();
        }
        match identifier_kind(field) {
            Some(Identifier::Cnpj) => return cnpj_from_base(CNPJ_BASE),
            Some(Identifier::Cpf) => return cpf_from_base(CPF_BASE),
            None => {}
        }
        match field.kind() {
            FieldKind::Text => text_default(&field.name),
            FieldKind::Numeric => "1".to_string(),
            FieldKind::Date => format_date(self.reference_date, field.width()),
            FieldKind::Decimal { scale } => implied_decimal(1, 0, scale),
        }
    }
}

/// Upper-cased alphanumerics of the field name, `X` when none remain.
fn text_default(name: &str) -> String {
    let text: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if text.is_empty() { "X".to_string() } else { text }
}

impl ContentProvider for DeterministicProvider {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn generate(&mut self, request: &LineRequest<'_>) -> Result<String, CollaboratorError> {
        Ok(request.compose(|field| self.value(field, request.occurrence)))
    }
}
