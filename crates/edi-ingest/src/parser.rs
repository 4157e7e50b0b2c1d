//! Positional parser: raw fixed-width text to intermediate record.

use edi_model::{DATA_TARGET, Decryptor, IntermediateRecord, Layout, LineDef, RecordNode};
use edi_transform::sanitize_name;
use tracing::{debug, trace, warn};

/// A parsed record plus the raw lines no line definition claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub record: IntermediateRecord,
    /// Names of the matched line definitions, one per parsed line.
    pub matched: Vec<String>,
    /// Zero-based indices of lines that matched no definition.
    pub unmatched: Vec<usize>,
}

/// Slice one raw line into a line node using the line's field spans.
///
/// Values are trimmed. Columns past the end of a short line read as blank.
pub fn parse_line(raw: &str, def: &LineDef) -> RecordNode {
    let chars: Vec<char> = raw.chars().collect();
    let mut node = RecordNode::new(sanitize_name(&def.name));
    for span in def.field_spans() {
        let start = span.start.min(chars.len());
        let end = span.end().min(chars.len());
        let value: String = chars[start..end].iter().collect();
        node.push(RecordNode::leaf(
            sanitize_name(&span.field.name),
            value.trim(),
        ));
    }
    node
}

/// Parse a whole record against `layout`.
///
/// Each non-blank line is matched with [`Layout::match_line`]; element names
/// are sanitized the same way the transform generator sanitizes lookups.
pub fn parse_record(text: &str, layout: &Layout) -> ParsedRecord {
    let mut record = IntermediateRecord::new();
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        match layout.match_line(raw, index) {
            Some(def) => {
                trace!(target: DATA_TARGET, index, line = %def.name, content = raw, "parsed line");
                record.push_line(parse_line(raw, def));
                matched.push(def.name.clone());
            }
            None => {
                warn!(index, layout = %layout.id, "line matches no line definition");
                unmatched.push(index);
            }
        }
    }

    debug!(
        layout = %layout.id,
        lines = matched.len(),
        unmatched = unmatched.len(),
        "parsed record"
    );
    ParsedRecord {
        record,
        matched,
        unmatched,
    }
}

/// Decrypt `ciphertext` first, then parse it.
pub fn parse_encrypted(ciphertext: &str, layout: &Layout, decryptor: &dyn Decryptor) -> ParsedRecord {
    let plaintext = decryptor.decrypt(ciphertext);
    parse_record(&plaintext, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::FieldDef;

    fn layout() -> Layout {
        Layout::new("NOTA", "Nota")
            .with_line_width(20)
            .with_line(
                LineDef::new("HEADER")
                    .with_initial_value("H")
                    .with_field(FieldDef::new("nfe:serie", 1, 3)),
            )
            .with_line(
                LineDef::new("LINHA001")
                    .with_initial_value("01")
                    .with_field(FieldDef::new("cProd", 1, 4))
                    .with_field(FieldDef::new("qtd", 2, 3)),
            )
    }

    #[test]
    fn short_lines_read_as_blank() {
        let node = parse_line("01000 AB", &layout().lines[1]);
        assert_eq!(node.children[0].text, "AB");
        assert_eq!(node.children[1].text, "");
    }

    #[test]
    fn names_are_sanitized_and_unmatched_lines_reported() {
        let parsed = parse_record("H001\n01000 ABCD 12\nXX\n", &layout());
        assert_eq!(parsed.matched, ["HEADER", "LINHA001"]);
        assert_eq!(parsed.unmatched, [2]);
        assert_eq!(parsed.record.lines()[0].children[0].name, "nfe_serie");
        assert_eq!(parsed.record.lines()[1].children[1].text, "12");
    }
}
