use edi_model::{Alignment, FieldDef, Layout, LineDef};
use edi_validate::{Issue, validate_line, validate_record};
use proptest::prelude::*;

fn layout() -> Layout {
    Layout::new("NFE", "Nota Fiscal")
        .with_line_width(20)
        .with_line(
            LineDef::new("HEADER")
                .with_initial_value("HDR")
                .required()
                .with_field(FieldDef::new("cnpj", 1, 14).required())
                .with_field(FieldDef::new("tpAmb", 2, 1).with_domain(["1", "2"]))
                .with_field(FieldDef::new("livre", 3, 2)),
        )
        .with_line(
            LineDef::new("LINHA000")
                .with_initial_value("A")
                .with_occurs(1, Some(2))
                .with_field(FieldDef::new("item", 1, 4).with_alignment(Alignment::Right))
                .with_field(FieldDef::new("desc", 2, 10)),
        )
}

#[test]
fn valid_record_passes() {
    let text = "HDR123456780001951  \nA00001  01CANETA    \r\nA00002  02LAPIS     \n\n";
    let report = validate_record(text, &layout());
    let outcome = report.outcome();
    assert!(outcome.valid, "{:?}", outcome.errors);
    assert_eq!(report.lines.len(), 3);
    assert!(report.issues.is_empty());
}

#[test]
fn occurrence_and_matching_errors() {
    let text = "A00001  01CANETA    \nA00002  02LAPIS     \nA00003  03BORRACHA  \nZZZ";
    let report = validate_record(text, &layout());
    assert!(!report.is_valid());
    assert!(report.issues.contains(&Issue::MissingLine {
        line: "HEADER".to_string(),
        min_occurs: 1,
        found: 0
    }));
    assert!(report.issues.contains(&Issue::TooManyOccurrences {
        line: "LINHA000".to_string(),
        max_occurs: 2,
        found: 3
    }));
    // "ZZZ" matches nothing: the layout has no prefix-less body line.
    assert!(report.issues.contains(&Issue::UnmatchedLine { index: 3 }));
    let outcome = report.outcome();
    assert_eq!(outcome.errors.len(), report.error_count());
}

#[test]
fn outcome_numbers_line_messages() {
    let text = "HDR123456780001959  \nA00001  01CANETA    ";
    let outcome = validate_record(text, &layout()).outcome();
    assert!(outcome.valid);
    assert_eq!(
        outcome.warnings,
        ["line 1 (HEADER): field 'tpAmb' value '9' is outside its domain"]
    );
}

#[test]
fn report_serializes() {
    let report = validate_line("", &LineDef::new("LINHA000"), 10);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["line"], "LINHA000");
    assert_eq!(json["issues"][0], "EmptyLine");
}

proptest! {
    #[test]
    fn fitted_values_always_validate(
        fields in prop::collection::vec(("[A-Z0-9 ]{0,20}", 1u32..12, any::<bool>()), 1..8),
    ) {
        let mut def = LineDef::new("LINHA001");
        let mut line = String::from("000001");
        for (index, (value, width, right)) in fields.iter().enumerate() {
            let alignment = if *right { Alignment::Right } else { Alignment::Left };
            def = def.with_field(
                FieldDef::new(format!("f{index}"), index as u32 + 1, *width).with_alignment(alignment),
            );
            line.push_str(&alignment.fit(value, *width as usize));
        }
        let width = line.chars().count();
        let report = validate_line(&line, &def, width);
        prop_assert!(report.is_valid(), "{:?}", report.issues);
        let end = def.field_spans().last().map(|span| span.end()).unwrap_or(0);
        prop_assert!(end <= width);
    }
}
