//! Layout, mapping and learned-model loading.
//!
//! Layouts come from JSON documents or from a CSV field table with the columns
//! `line,line_initial_value,line_required,min_occurs,max_occurs,field,sequence,
//! start,length,alignment,required,fixed_value,domain,description`. Every
//! loaded layout has its field kinds resolved and its structure checked.

use std::fs;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use edi_model::{
    Alignment, FieldDef, FieldHeuristics, FieldLength, Layout, LearnedModel, LineDef, Mapping,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Values accepted as "yes" in boolean columns (English and Portuguese).
const TRUE_VALUES: &[&str] = &["1", "true", "t", "yes", "y", "sim", "s", "x"];
const FALSE_VALUES: &[&str] = &["", "0", "false", "f", "no", "n", "nao", "não"];

/// `max_occurs` spellings meaning "no upper bound".
const UNBOUNDED_VALUES: &[&str] = &["*", "n", "unbounded", "ilimitado"];

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve field kinds and check structural invariants.
pub fn finish_layout(mut layout: Layout, heuristics: &FieldHeuristics) -> Result<Layout> {
    heuristics.resolve(&mut layout);
    layout.check_structure()?;
    Ok(layout)
}

pub fn load_layout_json(path: &Path, heuristics: &FieldHeuristics) -> Result<Layout> {
    let layout: Layout = read_json(path)?;
    debug!(path = %path.display(), layout = %layout.id, "loaded JSON layout");
    finish_layout(layout, heuristics)
}

/// Load a layout from a CSV field table. The file stem becomes the layout id.
pub fn load_layout_csv(
    path: &Path,
    line_width: usize,
    heuristics: &FieldHeuristics,
) -> Result<Layout> {
    let file = fs::File::open(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("layout")
        .to_string();
    let layout = layout_from_csv(file, Layout::new(id.clone(), id).with_line_width(line_width))?;
    debug!(path = %path.display(), lines = layout.lines.len(), "loaded CSV layout");
    finish_layout(layout, heuristics)
}

/// Load a layout file, choosing the format by extension.
pub fn load_layout(path: &Path, line_width: usize, heuristics: &FieldHeuristics) -> Result<Layout> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => load_layout_json(path, heuristics),
        Some("csv") => load_layout_csv(path, line_width, heuristics),
        _ => Err(IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub fn load_mapping(path: &Path) -> Result<Mapping> {
    read_json(path)
}

pub fn load_learned_model(path: &Path) -> Result<LearnedModel> {
    read_json(path)
}

#[derive(Debug, Deserialize)]
struct FieldRow {
    line: String,
    #[serde(default)]
    line_initial_value: String,
    #[serde(default)]
    line_required: String,
    #[serde(default)]
    min_occurs: String,
    #[serde(default)]
    max_occurs: String,
    field: String,
    #[serde(default)]
    sequence: String,
    #[serde(default)]
    start: String,
    length: String,
    #[serde(default)]
    alignment: String,
    #[serde(default)]
    required: String,
    #[serde(default)]
    fixed_value: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    description: String,
}

/// Append the lines described by a CSV field table to `layout`.
///
/// Lines appear in first-seen order and take their line-level columns from
/// their first row. An empty `sequence` continues the line's numbering.
pub fn layout_from_csv<R: Read>(reader: R, mut layout: Layout) -> Result<Layout> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    for (index, result) in csv.deserialize::<FieldRow>().enumerate() {
        let row = result?;
        // Header is row 1.
        let number = index + 2;
        if row.line.is_empty() {
            return Err(IngestError::MissingValue {
                row: number,
                column: "line",
            });
        }
        if row.field.is_empty() {
            return Err(IngestError::MissingValue {
                row: number,
                column: "field",
            });
        }

        let position = match layout
            .lines
            .iter()
            .position(|line| line.name == row.line)
        {
            Some(position) => position,
            None => {
                layout.lines.push(line_from_row(&row, number)?);
                layout.lines.len() - 1
            }
        };
        let line = &mut layout.lines[position];
        let next_sequence = line.fields.iter().map(|f| f.sequence).max().unwrap_or(0) + 1;
        line.fields.push(field_from_row(&row, number, next_sequence)?);
    }
    Ok(layout)
}

fn line_from_row(row: &FieldRow, number: usize) -> Result<LineDef> {
    let mut line = LineDef::new(row.line.clone()).with_initial_value(row.line_initial_value.clone());
    line.required = parse_bool(&row.line_required, number, "line_required")?;
    if !row.min_occurs.is_empty() {
        line.min_occurs = parse_number(&row.min_occurs, number, "min_occurs")?;
    }
    let max = row.max_occurs.to_lowercase();
    if UNBOUNDED_VALUES.contains(&max.as_str()) {
        line.max_occurs = None;
    } else if !max.is_empty() {
        line.max_occurs = Some(parse_number(&max, number, "max_occurs")?);
    }
    Ok(line)
}

fn field_from_row(row: &FieldRow, number: usize, next_sequence: u32) -> Result<FieldDef> {
    let length = FieldLength::parse(&row.length).ok_or_else(|| IngestError::InvalidValue {
        row: number,
        column: "length",
        value: row.length.clone(),
    })?;
    let sequence = if row.sequence.is_empty() {
        next_sequence
    } else {
        parse_number(&row.sequence, number, "sequence")?
    };
    let alignment = if row.alignment.is_empty() {
        Alignment::default()
    } else {
        Alignment::parse(&row.alignment).ok_or_else(|| IngestError::InvalidValue {
            row: number,
            column: "alignment",
            value: row.alignment.clone(),
        })?
    };

    let mut field = FieldDef::new(row.field.clone(), sequence, 0)
        .with_length(length)
        .with_alignment(alignment);
    if !row.start.is_empty() {
        field.relative_start = parse_number(&row.start, number, "start")?;
    }
    if parse_bool(&row.required, number, "required")? {
        field = field.required();
    }
    if !row.fixed_value.is_empty() {
        field = field.with_fixed_value(row.fixed_value.clone());
    }
    if !row.domain.is_empty() {
        field = field.with_domain(
            row.domain
                .split(['|', ';'])
                .map(str::trim)
                .filter(|value| !value.is_empty()),
        );
    }
    if !row.description.is_empty() {
        field = field.with_description(row.description.clone());
    }
    Ok(field)
}

fn parse_bool(value: &str, row: usize, column: &'static str) -> Result<bool> {
    let lower = value.trim().to_lowercase();
    if TRUE_VALUES.contains(&lower.as_str()) {
        Ok(true)
    } else if FALSE_VALUES.contains(&lower.as_str()) {
        Ok(false)
    } else {
        Err(IngestError::InvalidValue {
            row,
            column,
            value: value.to_string(),
        })
    }
}

fn parse_number(value: &str, row: usize, column: &'static str) -> Result<u32> {
    value.trim().parse().map_err(|_| IngestError::InvalidValue {
        row,
        column,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::FieldKind;

    const TABLE: &str = "\
line,line_initial_value,line_required,min_occurs,max_occurs,field,sequence,start,length,alignment,required,fixed_value,domain,description
HEADER,HDR,S,1,1,CNPJ,1,0,14,E,S,,,
HEADER,HDR,S,1,1,tpAmb,2,,1,D,N,,1|2,
LINHA001,01,N,0,*,vProd,1,,15,D,S,,,\"Valor do produto (15,4)\"
LINHA001,01,N,0,*,xProd,,,\"10\",,,,,
";

    #[test]
    fn reads_field_table() {
        let layout = layout_from_csv(TABLE.as_bytes(), Layout::new("NOTA", "Nota")).unwrap();
        assert_eq!(layout.lines.len(), 2);
        let header = &layout.lines[0];
        assert!(header.required);
        assert_eq!(header.initial_value, "HDR");
        assert_eq!(header.fields[1].alignment, Alignment::Right);
        assert_eq!(
            header.fields[1].domain.as_deref(),
            Some(&["1".to_string(), "2".to_string()][..])
        );
        let body = &layout.lines[1];
        assert_eq!(body.max_occurs, None);
        assert_eq!(body.min_occurs, 0);
        assert_eq!(body.fields[1].sequence, 2);
    }

    #[test]
    fn resolves_kinds_after_loading() {
        let layout = layout_from_csv(TABLE.as_bytes(), Layout::new("NOTA", "Nota")).unwrap();
        let layout = finish_layout(layout, &FieldHeuristics::default()).unwrap();
        assert_eq!(
            layout.lines[1].fields[0].kind(),
            FieldKind::Decimal { scale: 4 }
        );
    }

    #[test]
    fn rejects_bad_length() {
        let table = "line,field,length\nHEADER,CNPJ,abc\n";
        let error = layout_from_csv(table.as_bytes(), Layout::new("L", "L")).unwrap_err();
        assert!(matches!(
            error,
            IngestError::InvalidValue {
                row: 2,
                column: "length",
                ..
            }
        ));
    }
}
