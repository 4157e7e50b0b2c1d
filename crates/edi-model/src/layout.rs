//! Record layout tree: layouts, line definitions and field definitions.
//!
//! A [`Layout`] describes one fixed-width record format. Every line of the
//! format is a [`LineDef`] and every column range inside a line is a
//! [`FieldDef`]. Positions are counted in characters, one character per column.
//!
//! # Offset rule
//!
//! The first field of the `HEADER` line starts right after the line's
//! `initial_value`. Every other line reserves a [`SEQUENCE_PREFIX_WIDTH`]
//! prefix, so its first field starts at column 6. Subsequent fields follow
//! contiguously in ascending `sequence` order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StructureError;

/// Line width used when a layout does not declare one.
pub const DEFAULT_LINE_WIDTH: usize = 600;

/// Width of the prefix every non-header line reserves for its sequence number.
pub const SEQUENCE_PREFIX_WIDTH: usize = 6;

fn default_line_width() -> usize {
    DEFAULT_LINE_WIDTH
}

/// Physical encoding of a layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutType {
    #[default]
    TextPositional,
    Xml,
    Json,
}

/// Horizontal alignment of a value inside its field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
}

impl Alignment {
    /// Parse an alignment code as found in layout tables.
    ///
    /// Accepts English and Portuguese spellings and their single-letter codes
    /// (`L`/`E` left, `R`/`D` right, `C` center).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "l" | "e" | "left" | "esquerda" => Some(Self::Left),
            "r" | "d" | "right" | "direita" => Some(Self::Right),
            "c" | "center" | "centre" | "centro" => Some(Self::Center),
            _ => None,
        }
    }

    /// Fit `value` into exactly `width` characters, padding with spaces.
    ///
    /// Over-long values keep their leftmost characters, except right-aligned
    /// values which keep their rightmost (least significant) characters.
    pub fn fit(self, value: &str, width: usize) -> String {
        self.fit_with(value, width, ' ')
    }

    /// Like [`Alignment::fit`] with an explicit pad character.
    pub fn fit_with(self, value: &str, width: usize, pad: char) -> String {
        let len = value.chars().count();
        if len >= width {
            return match self {
                Self::Right => value.chars().skip(len - width).collect(),
                Self::Left | Self::Center => value.chars().take(width).collect(),
            };
        }
        let missing = width - len;
        let padding = |count: usize| std::iter::repeat_n(pad, count).collect::<String>();
        match self {
            Self::Left => format!("{value}{}", padding(missing)),
            Self::Right => format!("{}{value}", padding(missing)),
            Self::Center => {
                let left = missing / 2;
                format!("{}{value}{}", padding(left), padding(missing - left))
            }
        }
    }
}

/// Declared width of a field.
///
/// Packed decimal fields are described by a digit triple; their positional
/// width is `int_digits + decimals` (the decimal point is implied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldLength {
    Plain(u32),
    Packed {
        int_digits: u32,
        decimals: u32,
        #[serde(default)]
        scale: u32,
    },
}

impl FieldLength {
    /// Number of columns the field occupies.
    pub fn width(&self) -> usize {
        match *self {
            Self::Plain(length) => length as usize,
            Self::Packed {
                int_digits,
                decimals,
                ..
            } => (int_digits + decimals) as usize,
        }
    }

    /// Parse `"10"` or `"13,2,0"` (scale optional).
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [length] => length.parse().ok().map(Self::Plain),
            [int_digits, decimals] => Some(Self::Packed {
                int_digits: int_digits.parse().ok()?,
                decimals: decimals.parse().ok()?,
                scale: 0,
            }),
            [int_digits, decimals, scale] => Some(Self::Packed {
                int_digits: int_digits.parse().ok()?,
                decimals: decimals.parse().ok()?,
                scale: scale.parse().ok()?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for FieldLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(length) => write!(f, "{length}"),
            Self::Packed {
                int_digits,
                decimals,
                scale,
            } => write!(f, "{int_digits},{decimals},{scale}"),
        }
    }
}

/// Semantic kind of a field's content, resolved once when a layout is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Numeric,
    Date,
    Decimal {
        scale: u8,
    },
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Numeric => "numeric",
            Self::Date => "date",
            Self::Decimal { .. } => "decimal",
        }
    }
}

/// One column range of a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Free-text description from the layout catalogue.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordering key within the line.
    pub sequence: u32,
    /// Declared start relative to the first field of the line (0 = not declared).
    #[serde(default)]
    pub relative_start: u32,
    pub length: FieldLength,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub required: bool,
    /// Finite set of allowed values, when the field is enumerated.
    #[serde(default)]
    pub domain: Option<Vec<String>>,
    #[serde(default)]
    pub fixed_value: Option<String>,
    /// Field carries the occurrence counter of its line.
    #[serde(default)]
    pub is_sequential: bool,
    /// Resolved content kind; `None` until heuristics have run.
    #[serde(default)]
    pub kind: Option<FieldKind>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, sequence: u32, length: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            sequence,
            relative_start: 0,
            length: FieldLength::Plain(length),
            alignment: Alignment::Left,
            required: false,
            domain: None,
            fixed_value: None,
            is_sequential: false,
            kind: None,
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: FieldLength) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_domain<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_fixed_value(mut self, value: impl Into<String>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.is_sequential = true;
        self
    }

    pub fn width(&self) -> usize {
        self.length.width()
    }

    /// Resolved kind, `Text` when heuristics have not run.
    pub fn kind(&self) -> FieldKind {
        self.kind.unwrap_or_default()
    }
}

/// A field with its absolute position inside a line.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpan<'a> {
    pub field: &'a FieldDef,
    pub start: usize,
    pub width: usize,
}

impl FieldSpan<'_> {
    pub fn end(&self) -> usize {
        self.start + self.width
    }
}

/// One line kind of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDef {
    pub name: String,
    /// Literal prefix identifying the line; empty for header-less layouts.
    #[serde(default)]
    pub initial_value: String,
    #[serde(default)]
    pub min_occurs: u32,
    /// Upper occurrence bound; `None` means unbounded.
    #[serde(default)]
    pub max_occurs: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl LineDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_value: String::new(),
            min_occurs: 1,
            max_occurs: Some(1),
            required: false,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_initial_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = value.into();
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_occurs(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_header(&self) -> bool {
        self.name.trim().eq_ignore_ascii_case("HEADER")
    }

    pub fn is_trailer(&self) -> bool {
        self.name.to_ascii_uppercase().contains("TRAILER")
    }

    /// Fields in ascending `sequence` order (stable for equal keys).
    pub fn ordered_fields(&self) -> Vec<&FieldDef> {
        let mut fields: Vec<&FieldDef> = self.fields.iter().collect();
        fields.sort_by_key(|field| field.sequence);
        fields
    }

    /// Column at which the first field starts.
    pub fn content_offset(&self) -> usize {
        if self.is_header() {
            self.initial_value.chars().count()
        } else {
            SEQUENCE_PREFIX_WIDTH
        }
    }

    /// Absolute position of every field, in sequence order.
    pub fn field_spans(&self) -> Vec<FieldSpan<'_>> {
        let mut cursor = self.content_offset();
        self.ordered_fields()
            .into_iter()
            .map(|field| {
                let span = FieldSpan {
                    field,
                    start: cursor,
                    width: field.width(),
                };
                cursor += span.width;
                span
            })
            .collect()
    }

    /// Columns used by the prefix and all fields.
    pub fn content_width(&self) -> usize {
        self.content_offset() + self.fields.iter().map(FieldDef::width).sum::<usize>()
    }
}

/// A complete record layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub layout_type: LayoutType,
    #[serde(default = "default_line_width")]
    pub line_width: usize,
    #[serde(default)]
    pub lines: Vec<LineDef>,
}

impl Layout {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layout_type: LayoutType::TextPositional,
            line_width: DEFAULT_LINE_WIDTH,
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_line_width(mut self, width: usize) -> Self {
        self.line_width = width;
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: LineDef) -> Self {
        self.lines.push(line);
        self
    }

    /// Name used in artifacts: the layout name, or its id when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn find_line(&self, name: &str) -> Option<&LineDef> {
        self.lines
            .iter()
            .find(|line| line.name.eq_ignore_ascii_case(name))
    }

    pub fn header(&self) -> Option<&LineDef> {
        self.lines.iter().find(|line| line.is_header())
    }

    /// Line definition a raw record line belongs to.
    ///
    /// The header wins when its `initial_value` prefixes the line, or when it
    /// declares no prefix and `index` is 0. Other lines match by prefix in
    /// declared order; a line without a prefix is the last resort.
    pub fn match_line(&self, raw: &str, index: usize) -> Option<&LineDef> {
        if let Some(header) = self.header() {
            let prefixed = !header.initial_value.is_empty() && raw.starts_with(&header.initial_value);
            if prefixed || (index == 0 && header.initial_value.is_empty()) {
                return Some(header);
            }
        }
        let body = || self.lines.iter().filter(|line| !line.is_header());
        body()
            .find(|line| !line.initial_value.is_empty() && raw.starts_with(&line.initial_value))
            .or_else(|| body().find(|line| line.initial_value.is_empty()))
    }

    pub fn field_count(&self) -> usize {
        self.lines.iter().map(|line| line.fields.len()).sum()
    }

    /// Verify the structural invariants of the layout.
    ///
    /// Fields must be contiguous once ordered by sequence, must not share a
    /// sequence number, and must end within `line_width`.
    pub fn check_structure(&self) -> Result<(), StructureError> {
        if self.lines.is_empty() {
            return Err(StructureError::EmptyLayout {
                layout: self.id.clone(),
            });
        }
        for line in &self.lines {
            if !line.is_header() && line.initial_value.chars().count() > SEQUENCE_PREFIX_WIDTH {
                return Err(StructureError::InvalidPrefix {
                    layout: self.id.clone(),
                    line: line.name.clone(),
                    prefix: line.initial_value.clone(),
                });
            }
            let spans = line.field_spans();
            let base = line.content_offset();
            let mut previous_sequence = None;
            for span in &spans {
                if previous_sequence == Some(span.field.sequence) {
                    return Err(StructureError::FieldOverlap {
                        layout: self.id.clone(),
                        line: line.name.clone(),
                        field: span.field.name.clone(),
                    });
                }
                previous_sequence = Some(span.field.sequence);
                let declared = span.field.relative_start as usize;
                if declared != 0 && base + declared != span.start {
                    return Err(StructureError::NonContiguousField {
                        layout: self.id.clone(),
                        line: line.name.clone(),
                        field: span.field.name.clone(),
                        expected: span.start - base,
                        declared,
                    });
                }
                if span.end() > self.line_width {
                    return Err(StructureError::WidthOverflow {
                        layout: self.id.clone(),
                        line: line.name.clone(),
                        field: span.field.name.clone(),
                        end: span.end(),
                        line_width: self.line_width,
                    });
                }
            }
        }
        Ok(())
    }
}
