//! Seeded random provider producing constrained, valid-looking values.

use chrono::{Days, NaiveDate};
use edi_model::{CollaboratorError, FieldDef, FieldKind};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::documents::{cnpj_from_base, cpf_from_base};
use crate::provider::{ContentProvider, Identifier, LineRequest, identifier_kind};
use crate::values::{format_date, implied_decimal, max_for_digits};

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Dates fall within this many days before the reference date.
const DATE_WINDOW_DAYS: u64 = 365;
const MAX_TEXT_LENGTH: usize = 12;
/// Integer digits of generated amounts.
const MAX_AMOUNT_DIGITS: usize = 6;
/// Chance that an optional free field is left blank.
const BLANK_OPTIONAL: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct RandomProvider {
    rng: SmallRng,
    reference_date: NaiveDate,
}

impl RandomProvider {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            reference_date: chrono::Local::now().date_naive(),
        }
    }

    #[must_use]
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn value(&mut self, field: &FieldDef, occurrence: u32) -> String {
        if let Some(fixed) = &field.fixed_value {
            return fixed.clone();
        }
        if let Some(values) = field.domain.as_ref().filter(|values| !values.is_empty()) {
            return values[self.rng.random_range(0..values.len())].clone();
        }
        if field.is_sequential {
            return (occurrence + 1).to_string();
        }
        match identifier_kind(field) {
            Some(Identifier::Cnpj) => return cnpj_from_base(self.digits()),
            Some(Identifier::Cpf) => return cpf_from_base(self.digits()),
            None => {}
        }
        if !field.required && self.rng.random_bool(BLANK_OPTIONAL) {
            return String::new();
        }
        let width = field.width();
        match field.kind() {
            FieldKind::Text => {
                let length = self.rng.random_range(1..=width.clamp(1, MAX_TEXT_LENGTH));
                (0..length)
                    .map(|_| char::from(ALPHANUMERIC[self.rng.random_range(0..ALPHANUMERIC.len())]))
                    .collect()
            }
            FieldKind::Numeric => self.rng.random_range(1..=max_for_digits(width).max(1)).to_string(),
            FieldKind::Date => {
                let back = self.rng.random_range(0..=DATE_WINDOW_DAYS);
                let date = self
                    .reference_date
                    .checked_sub_days(Days::new(back))
                    .unwrap_or(self.reference_date);
                format_date(date, width)
            }
            FieldKind::Decimal { scale } => {
                let int_digits = width
                    .saturating_sub(usize::from(scale))
                    .min(MAX_AMOUNT_DIGITS);
                let integer = self.rng.random_range(0..=max_for_digits(int_digits));
                let fraction = self.rng.random_range(0..=max_for_digits(usize::from(scale)));
                let amount = implied_decimal(integer, fraction, scale);
                // Keep amounts non-zero so required monetary fields never look blank.
                if amount.chars().all(|c| c == '0') {
                    implied_decimal(1, 0, scale)
                } else {
                    amount
                }
            }
        }
    }

    fn digits<const N: usize>(&mut self) -> [u8; N] {
        std::array::from_fn(|_| self.rng.random_range(0..10u8))
    }
}

impl ContentProvider for RandomProvider {
    fn name(&self) -> &'static str {
        "random"
    }

    fn generate(&mut self, request: &LineRequest<'_>) -> Result<String, CollaboratorError> {
        Ok(request.compose(|field| self.value(field, request.occurrence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{is_valid_cnpj, is_valid_cpf};

    #[test]
    fn same_seed_same_values() {
        let field = FieldDef::new("xProd", 1, 20).required();
        let mut a = RandomProvider::seeded(7);
        let mut b = RandomProvider::seeded(7);
        for _ in 0..10 {
            assert_eq!(a.value(&field, 0), b.value(&field, 0));
        }
    }

    #[test]
    fn identifiers_carry_valid_check_digits() {
        let mut provider = RandomProvider::seeded(42);
        let cnpj = FieldDef::new("cnpjDest", 1, 14);
        let cpf = FieldDef::new("CPF", 1, 11);
        for _ in 0..20 {
            assert!(is_valid_cnpj(&provider.value(&cnpj, 0)));
            assert!(is_valid_cpf(&provider.value(&cpf, 0)));
        }
    }

    #[test]
    fn dates_stay_in_window() {
        let reference = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let mut provider = RandomProvider::seeded(1).with_reference_date(reference);
        let field = FieldDef::new("dEmi", 1, 8).required().with_kind(FieldKind::Date);
        for _ in 0..50 {
            let value = provider.value(&field, 0);
            let date = NaiveDate::parse_from_str(&value, "%Y%m%d").unwrap();
            assert!(date <= reference);
            assert!(date >= reference - Days::new(DATE_WINDOW_DAYS));
        }
    }

    #[test]
    fn required_values_are_never_blank() {
        let mut provider = RandomProvider::seeded(3);
        let amount = FieldDef::new("vProd", 1, 15)
            .required()
            .with_kind(FieldKind::Decimal { scale: 2 });
        let text = FieldDef::new("xNome", 1, 1).required();
        for _ in 0..100 {
            assert!(!provider.value(&amount, 0).trim().is_empty());
            assert!(!provider.value(&text, 0).trim().is_empty());
        }
    }
}
