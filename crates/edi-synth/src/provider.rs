//! Candidate content providers and line composition.

use edi_model::{Alignment, CollaboratorError, FieldDef, FieldKind, Layout, LineDef, SEQUENCE_PREFIX_WIDTH};

/// Everything a provider knows when producing one candidate line.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest<'a> {
    pub layout: &'a Layout,
    pub line: &'a LineDef,
    /// Zero-based occurrence of this line kind within the record.
    pub occurrence: u32,
    /// Running number of non-header lines within the record, from 1.
    pub sequence: u32,
    /// One-based attempt counter.
    pub attempt: u32,
    /// The previous invalid candidate, on retries.
    pub previous: Option<&'a str>,
    /// Validator errors of the previous candidate.
    pub errors: &'a [String],
}

impl LineRequest<'_> {
    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }

    pub fn prefix(&self) -> String {
        line_prefix(self.line, self.sequence)
    }

    /// Build a full-width line from one value per field, in sequence order.
    pub fn compose(&self, mut value_of: impl FnMut(&FieldDef) -> String) -> String {
        let mut text = self.prefix();
        for field in self.line.ordered_fields() {
            text.push_str(&fit_value(field, &value_of(field)));
        }
        normalize_line(&text, self.layout.line_width)
    }
}

/// Produces candidate lines for the synthesis loop.
///
/// Implementations may keep state (an RNG, a client handle); one provider
/// instance serves one record at a time.
pub trait ContentProvider {
    fn name(&self) -> &'static str;

    fn generate(&mut self, request: &LineRequest<'_>) -> Result<String, CollaboratorError>;
}

impl<P: ContentProvider + ?Sized> ContentProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn generate(&mut self, request: &LineRequest<'_>) -> Result<String, CollaboratorError> {
        (**self).generate(request)
    }
}

/// Literal start of a line.
///
/// The header starts with its `initial_value`. Other lines fill the
/// sequence prefix with their `initial_value` followed by the zero-padded
/// running sequence number.
pub fn line_prefix(line: &LineDef, sequence: u32) -> String {
    if line.is_header() {
        return line.initial_value.clone();
    }
    let initial: String = line.initial_value.chars().take(SEQUENCE_PREFIX_WIDTH).collect();
    let digits = SEQUENCE_PREFIX_WIDTH - initial.chars().count();
    if digits == 0 {
        return initial;
    }
    let number = sequence.to_string();
    let number: String = number.chars().skip(number.len().saturating_sub(digits)).collect();
    format!("{initial}{number:0>digits$}")
}

/// Fit a value into its field. Right-aligned numeric content pads with zeros.
pub fn fit_value(field: &FieldDef, value: &str) -> String {
    let zero_padded = field.alignment == Alignment::Right
        && !matches!(field.kind(), FieldKind::Text)
        && !value.is_empty()
        && value.chars().all(|c| c.is_ascii_digit());
    let pad = if zero_padded { '0' } else { ' ' };
    field.alignment.fit_with(value, field.width(), pad)
}

/// Truncate or right-pad with spaces to exactly `width` characters.
pub fn normalize_line(text: &str, width: usize) -> String {
    let mut line: String = text.chars().take(width).collect();
    let len = line.chars().count();
    line.extend(std::iter::repeat_n(' ', width - len));
    line
}

/// A line holding only its prefix.
pub fn blank_line(request: &LineRequest<'_>) -> String {
    normalize_line(&request.prefix(), request.layout.line_width)
}

/// Identifier fields recognised by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier {
    Cnpj,
    Cpf,
}

pub fn identifier_kind(field: &FieldDef) -> Option<Identifier> {
    let name = field.name.to_lowercase();
    if name.contains("cnpj") && field.width() >= crate::documents::CNPJ_LENGTH {
        Some(Identifier::Cnpj)
    } else if name.contains("cpf") && field.width() >= crate::documents::CPF_LENGTH {
        Some(Identifier::Cpf)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        let header = LineDef::new("HEADER").with_initial_value("HDR");
        assert_eq!(line_prefix(&header, 9), "HDR");
        let body = LineDef::new("LINHA001").with_initial_value("01");
        assert_eq!(line_prefix(&body, 7), "010007");
        assert_eq!(line_prefix(&LineDef::new("A"), 12), "000012");
        assert_eq!(line_prefix(&LineDef::new("B").with_initial_value("ABCDEF"), 1), "ABCDEF");
        // Overflowing sequence numbers keep their low digits.
        assert_eq!(line_prefix(&body, 123_456), "013456");
    }

    #[test]
    fn numeric_fields_pad_with_zeros() {
        let field = FieldDef::new("qtd", 1, 5)
            .with_alignment(Alignment::Right)
            .with_kind(FieldKind::Numeric);
        assert_eq!(fit_value(&field, "42"), "00042");
        let text = FieldDef::new("xNome", 1, 5).with_alignment(Alignment::Right);
        assert_eq!(fit_value(&text, "AB"), "   AB");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_line("abc", 5), "abc  ");
        assert_eq!(normalize_line("abcdef", 4), "abcd");
    }
}
