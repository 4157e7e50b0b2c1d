//! Map generator: compiles a layout into the line-identified field map (TCL).
//!
//! # Artifact format
//!
//! ```text
//! MAP "<layout name>" WIDTH <line width>
//! LINE <identifier> "<line name>"
//!   FIELD "<field name>" <length | intDigits,decimals,scale>
//! END LINE
//! END MAP
//! ```
//!
//! Lines are ordered `HEADER` first, `LINHA<nnn>` by number, other lines after
//! those, and `TRAILER` last.

use std::fmt::{self, Write as _};

use edi_model::{FieldDef, FieldHeuristics, FieldLength, Layout, LineDef, StructureError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sort key of lines that are neither framing lines nor `LINHA<nnn>`.
const GENERIC_LINE_KEY: u32 = 5000;

/// Generated confidence of a field width taken verbatim from the layout.
pub const DECLARED_CONFIDENCE: f64 = 1.0;
/// Monetary split backed by an explicit `N,M` annotation.
pub const ANNOTATED_CONFIDENCE: f64 = 0.8;
/// Monetary split relying on the default decimal count.
pub const INFERRED_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapField {
    pub name: String,
    pub length: FieldLength,
    /// How certain the generator is about `length`, in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLine {
    pub identifier: String,
    pub name: String,
    pub fields: Vec<MapField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMap {
    pub layout_name: String,
    pub line_width: usize,
    pub lines: Vec<MapLine>,
}

impl GeneratedMap {
    pub fn identifiers(&self) -> Vec<&str> {
        self.lines
            .iter()
            .map(|line| line.identifier.as_str())
            .collect()
    }

    /// Render the TCL text artifact.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "MAP {} WIDTH {}",
            Quoted(&self.layout_name),
            self.line_width
        );
        for line in &self.lines {
            let _ = writeln!(out, "LINE {} {}", line.identifier, Quoted(&line.name));
            for field in &line.fields {
                let _ = writeln!(out, "  FIELD {} {}", Quoted(&field.name), field.length);
            }
            out.push_str("END LINE\n");
        }
        out.push_str("END MAP\n");
        out
    }
}

/// Double-quoted TCL word with `"` and `\` backslash-escaped.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            if matches!(c, '"' | '\\') {
                f.write_char('\\')?;
            }
            f.write_char(c)?;
        }
        f.write_char('"')
    }
}

/// Number embedded in a `LINHA<nnn>` line name.
pub fn generic_line_number(name: &str) -> Option<u32> {
    let upper = name.trim().to_ascii_uppercase();
    let digits = upper.strip_prefix("LINHA")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Ordering key of a line: `HEADER` 0, `LINHA<nnn>` nnn+1, other 5000, `TRAILER` last.
pub fn line_sort_key(name: &str) -> u32 {
    let upper = name.trim().to_ascii_uppercase();
    if upper == "HEADER" {
        0
    } else if upper.contains("TRAILER") {
        u32::MAX
    } else if let Some(number) = generic_line_number(name) {
        number.saturating_add(1)
    } else {
        GENERIC_LINE_KEY
    }
}

/// Letter code for a generic line number: 0→A … 25→Z, 26→AA … 51→AZ, then `Z<nn>`.
pub fn letter_code(number: u32) -> String {
    let letter = |offset: u32| char::from(b'A' + offset as u8);
    match number {
        0..=25 => letter(number).to_string(),
        26..=51 => format!("A{}", letter(number - 26)),
        _ => format!("Z{number:02}"),
    }
}

/// Map identifier of a line.
pub fn line_identifier(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    if upper == "HEADER" {
        return "HEADER".to_string();
    }
    if upper.contains("TRAILER") {
        return "TRAILER".to_string();
    }
    if let Some(number) = generic_line_number(name) {
        return letter_code(number);
    }
    upper
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Compiles layouts into [`GeneratedMap`]s.
#[derive(Debug, Clone, Default)]
pub struct MapGenerator {
    heuristics: FieldHeuristics,
}

impl MapGenerator {
    pub fn new(heuristics: FieldHeuristics) -> Self {
        Self { heuristics }
    }

    pub fn heuristics(&self) -> &FieldHeuristics {
        &self.heuristics
    }

    /// Compile `layout`. Fails when the layout has no lines, or when a line
    /// other than the `HEADER`/`TRAILER` framing lines has no fields.
    pub fn generate(&self, layout: &Layout) -> Result<GeneratedMap, StructureError> {
        if layout.lines.is_empty() {
            return Err(StructureError::EmptyLayout {
                layout: layout.id.clone(),
            });
        }
        let mut ordered: Vec<&LineDef> = layout.lines.iter().collect();
        ordered.sort_by(|a, b| {
            line_sort_key(&a.name)
                .cmp(&line_sort_key(&b.name))
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut lines = Vec::with_capacity(ordered.len());
        for line in ordered {
            if line.fields.is_empty() && !(line.is_header() || line.is_trailer()) {
                return Err(StructureError::EmptyLine {
                    layout: layout.id.clone(),
                    line: line.name.clone(),
                });
            }
            let fields = line
                .ordered_fields()
                .into_iter()
                .map(|field| self.map_field(field))
                .collect();
            lines.push(MapLine {
                identifier: line_identifier(&line.name),
                name: line.name.clone(),
                fields,
            });
        }
        debug!(
            layout = %layout.id,
            line_count = lines.len(),
            "generated field map"
        );
        Ok(GeneratedMap {
            layout_name: layout.display_name().to_string(),
            line_width: layout.line_width,
            lines,
        })
    }

    fn map_field(&self, field: &FieldDef) -> MapField {
        let (length, confidence) = match field.length {
            FieldLength::Plain(total) if self.heuristics.is_monetary(&field.name) => {
                let annotated = self
                    .heuristics
                    .annotated_decimals(field.description.as_deref());
                let decimals = annotated.unwrap_or(self.heuristics.default_decimals);
                if decimals < total {
                    let confidence = if annotated.is_some() {
                        ANNOTATED_CONFIDENCE
                    } else {
                        INFERRED_CONFIDENCE
                    };
                    (
                        FieldLength::Packed {
                            int_digits: total - decimals,
                            decimals,
                            scale: 0,
                        },
                        confidence,
                    )
                } else {
                    (field.length, INFERRED_CONFIDENCE)
                }
            }
            declared => (declared, DECLARED_CONFIDENCE),
        };
        MapField {
            name: field.name.clone(),
            length,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::Alignment;

    #[test]
    fn quoted_names_escape_quotes_and_backslashes() {
        let map = GeneratedMap {
            layout_name: r#"Nota "NF-e" C:\edi"#.to_string(),
            line_width: 20,
            lines: vec![MapLine {
                identifier: "HEADER".to_string(),
                name: "HEADER".to_string(),
                fields: vec![MapField {
                    name: r#"obs"x"#.to_string(),
                    length: FieldLength::Plain(4),
                    confidence: DECLARED_CONFIDENCE,
                }],
            }],
        };
        let text = map.render();
        assert!(text.starts_with(r#"MAP "Nota \"NF-e\" C:\\edi" WIDTH 20"#));
        assert!(text.contains(r#"  FIELD "obs\"x" 4"#));
    }

    #[test]
    fn letter_codes_roll_over() {
        assert_eq!(letter_code(0), "A");
        assert_eq!(letter_code(25), "Z");
        assert_eq!(letter_code(26), "AA");
        assert_eq!(letter_code(27), "AB");
        assert_eq!(letter_code(51), "AZ");
        assert_eq!(letter_code(52), "Z52");
    }

    #[test]
    fn identifiers_for_framing_and_generic_lines() {
        assert_eq!(line_identifier("HEADER"), "HEADER");
        assert_eq!(line_identifier("TRAILER_NF"), "TRAILER");
        assert_eq!(line_identifier("LINHA003"), "D");
        assert_eq!(line_identifier("detalhe item"), "DETALHE_ITEM");
    }

    #[test]
    fn sort_keys_order_framing_lines() {
        assert_eq!(line_sort_key("HEADER"), 0);
        assert_eq!(line_sort_key("LINHA000"), 1);
        assert_eq!(line_sort_key("LINHA012"), 13);
        assert_eq!(line_sort_key("OUTRA"), 5000);
        assert_eq!(line_sort_key("TRAILER"), u32::MAX);
        assert_eq!(generic_line_number("LINHA"), None);
        assert_eq!(generic_line_number("LINHAX1"), None);
    }

    #[test]
    fn header_and_one_detail_line_scenario() {
        let layout = Layout::new("SCN", "scenario")
            .with_line_width(21)
            .with_line(
                LineDef::new("LINHA000")
                    .with_field(FieldDef::new("nome", 1, 10))
                    .with_field(FieldDef::new("codigo", 2, 5).with_alignment(Alignment::Right)),
            )
            .with_line(LineDef::new("HEADER"));
        let map = MapGenerator::default().generate(&layout).unwrap();
        assert_eq!(map.identifiers(), ["HEADER", "A"]);
        assert_eq!(map.lines[1].fields[0].length, FieldLength::Plain(10));
    }

    #[test]
    fn empty_generic_line_is_rejected() {
        let layout = Layout::new("E", "empty").with_line(LineDef::new("LINHA001"));
        assert_eq!(
            MapGenerator::default().generate(&layout),
            Err(StructureError::EmptyLine {
                layout: "E".to_string(),
                line: "LINHA001".to_string()
            })
        );
    }

    #[test]
    fn monetary_fields_emit_triples() {
        let layout = Layout::new("M", "money").with_line(
            LineDef::new("LINHA000")
                .with_field(FieldDef::new("vProd", 1, 15))
                .with_field(
                    FieldDef::new("valorUnit", 2, 21).with_description("Valor unitario (21,10)"),
                )
                .with_field(FieldDef::new("xProd", 3, 60)),
        );
        let map = MapGenerator::default().generate(&layout).unwrap();
        let fields = &map.lines[0].fields;
        assert_eq!(fields[0].length.to_string(), "13,2,0");
        assert_eq!(fields[0].confidence, INFERRED_CONFIDENCE);
        assert_eq!(fields[1].length.to_string(), "11,10,0");
        assert_eq!(fields[1].confidence, ANNOTATED_CONFIDENCE);
        assert_eq!(fields[2].length.to_string(), "60");
        assert_eq!(fields[2].confidence, DECLARED_CONFIDENCE);
    }
}
