//! Tests for edi-model types.

use std::collections::BTreeMap;

use edi_model::{
    CollaboratorError, FieldDef, GenerationResponse, Layout, LayoutStore, LearnedMappingRule,
    LearnedModel, LineDef, StructureError, require_layout,
};
use proptest::prelude::*;

struct MapStore(BTreeMap<String, Layout>);

impl LayoutStore for MapStore {
    fn fetch(&self, id: &str) -> Result<Option<Layout>, CollaboratorError> {
        Ok(self.0.get(id).cloned())
    }

    fn search(&self, term: &str, max_results: usize) -> Result<Vec<Layout>, CollaboratorError> {
        Ok(self
            .0
            .values()
            .filter(|layout| layout.id.contains(term))
            .take(max_results)
            .cloned()
            .collect())
    }
}

struct BrokenStore;

impl LayoutStore for BrokenStore {
    fn fetch(&self, _id: &str) -> Result<Option<Layout>, CollaboratorError> {
        Err(CollaboratorError::failed("layout store", "connection refused"))
    }

    fn search(&self, _term: &str, _max: usize) -> Result<Vec<Layout>, CollaboratorError> {
        Ok(Vec::new())
    }
}

#[test]
fn missing_layout_is_a_structure_error() {
    let store = MapStore(BTreeMap::new());
    assert_eq!(
        require_layout(&store, "NFE").unwrap_err(),
        StructureError::LayoutNotFound {
            id: "NFE".to_string()
        }
    );
}

#[test]
fn store_failure_propagates_as_structure_error() {
    let error = require_layout(&BrokenStore, "NFE").unwrap_err();
    assert!(matches!(error, StructureError::Message(ref m) if m.contains("connection refused")));
}

#[test]
fn response_keeps_warnings_on_failure() {
    let response: GenerationResponse<String> = GenerationResponse::from_result(
        Err(StructureError::EmptyLayout {
            layout: "X".to_string(),
        }),
        vec!["first warning".to_string()],
    );
    assert!(!response.success);
    assert_eq!(response.errors, ["layout X has no lines"]);
    assert_eq!(response.warnings, ["first warning"]);

    let json = serde_json::to_string(&response).expect("serialize response");
    let round: GenerationResponse<String> =
        serde_json::from_str(&json).expect("deserialize response");
    assert_eq!(round, response);
}

#[test]
fn learned_rules_filter_by_element_and_confidence() {
    let mut model = LearnedModel::new("NFE");
    model.mapping_rules = vec![
        LearnedMappingRule {
            source_line: Some("HEADER".to_string()),
            source_field: "CNPJ_EMIT".to_string(),
            target_element: "emit/CNPJ".to_string(),
            confidence: 0.9,
        },
        LearnedMappingRule {
            source_line: None,
            source_field: "CNPJ".to_string(),
            target_element: "CNPJ".to_string(),
            confidence: 0.95,
        },
        LearnedMappingRule {
            source_line: None,
            source_field: "DOC".to_string(),
            target_element: "cnpj".to_string(),
            confidence: 0.4,
        },
    ];
    let rules = model.rules_for_element("CNPJ", 0.8);
    let fields: Vec<&str> = rules.iter().map(|r| r.source_field.as_str()).collect();
    assert_eq!(fields, ["CNPJ", "CNPJ_EMIT"]);
}

proptest! {
    #[test]
    fn structurally_valid_lines_fit_their_width(widths in prop::collection::vec(1u32..40, 1..12)) {
        let mut line = LineDef::new("LINHA000");
        for (index, width) in widths.iter().enumerate() {
            line = line.with_field(FieldDef::new(format!("f{index}"), index as u32 + 1, *width));
        }
        let total: usize = 6 + widths.iter().map(|w| *w as usize).sum::<usize>();
        let layout = Layout::new("P", "P").with_line_width(total).with_line(line);
        prop_assert!(layout.check_structure().is_ok());
        for span in layout.lines[0].field_spans() {
            prop_assert!(span.end() <= layout.line_width);
        }
        let narrower = layout.clone().with_line_width(total - 1);
        prop_assert!(narrower.check_structure().is_err());
    }
}
