//! Store, parser and intermediate-XML integration tests.

use std::fs;

use edi_ingest::{
    JsonLayoutStore, JsonLearnedModelStore, JsonMappingStore, load_layout, parse_line,
    parse_record, render_intermediate_xml,
};
use edi_model::{
    Alignment, FieldDef, FieldHeuristics, FieldKind, LayoutStore, Layout, LearnedModel,
    LearnedModelStore, LineDef, LinkMapping, Mapping, MappingStore, StructureError,
    require_layout, require_mapping,
};
use edi_transform::{RankContext, Resolution, rank_candidates, resolve_link};
use proptest::prelude::*;
use tempfile::TempDir;

fn invoice_layout() -> Layout {
    Layout::new("NOTA", "Nota fiscal")
        .with_line_width(30)
        .with_line(
            LineDef::new("HEADER")
                .with_initial_value("HDR")
                .with_field(FieldDef::new("CNPJ", 1, 14))
                .with_field(FieldDef::new("nNF", 2, 6).with_alignment(Alignment::Right)),
        )
        .with_line(
            LineDef::new("LINHA001")
                .with_initial_value("01")
                .with_occurs(0, None)
                .with_field(FieldDef::new("cProd", 1, 8))
                .with_field(FieldDef::new("vProd", 2, 10).with_alignment(Alignment::Right)),
        )
}

fn write_json<T: serde::Serialize>(dir: &TempDir, name: &str, value: &T) {
    let text = serde_json::to_string_pretty(value).unwrap();
    fs::write(dir.path().join(name), text).unwrap();
}

#[test]
fn layout_store_fetches_and_searches() {
    let dir = TempDir::new().unwrap();
    write_json(&dir, "NOTA.json", &invoice_layout());
    write_json(&dir, "other.json", &Layout::new("CTE", "Conhecimento").with_line(LineDef::new("HEADER")));
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let store = JsonLayoutStore::new(dir.path());
    let layout = store.fetch("NOTA").unwrap().unwrap();
    assert_eq!(
        layout.lines[1].fields[1].kind,
        Some(FieldKind::Decimal { scale: 2 })
    );
    // Found by scanning: the file name differs from the id.
    assert!(store.fetch("CTE").unwrap().is_some());
    assert!(store.fetch("MDFE").unwrap().is_none());

    let found = store.search("conhec", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "CTE");
    assert_eq!(store.search("", 1).unwrap().len(), 1);

    assert!(matches!(
        require_layout(&store, "MDFE"),
        Err(StructureError::LayoutNotFound { .. })
    ));
}

#[test]
fn mapping_store_falls_back_to_target_layout() {
    let dir = TempDir::new().unwrap();
    let mapping = Mapping::new("NOTA", "NFE").with_link(LinkMapping::new("CNPJ", 1));
    write_json(&dir, "nota-nfe.json", &mapping);

    let store = JsonMappingStore::new(dir.path());
    assert_eq!(store.fetch_by_input_layout("NOTA").unwrap(), Some(mapping.clone()));
    assert_eq!(require_mapping(&store, "NFE").unwrap(), mapping);
    assert!(matches!(
        require_mapping(&store, "CTE"),
        Err(StructureError::MappingNotFound { .. })
    ));
}

#[test]
fn learned_store_matches_layout_name() {
    let dir = TempDir::new().unwrap();
    write_json(&dir, "model-1.json", &LearnedModel::new("Nota fiscal"));
    let store = JsonLearnedModelStore::new(dir.path());
    assert!(store.load("NOTA FISCAL").unwrap().is_some());
    assert!(store.load("CTE").unwrap().is_none());
    assert!(JsonLearnedModelStore::new(dir.path().join("missing")).load("x").unwrap().is_none());
}

#[test]
fn csv_layout_file_is_loaded_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("NOTA.csv");
    fs::write(
        &path,
        "line,line_initial_value,field,length,alignment,required\n\
         HEADER,HDR,CNPJ,14,L,S\n\
         LINHA001,01,vProd,10,R,N\n",
    )
    .unwrap();
    let layout = load_layout(&path, 30, &FieldHeuristics::default()).unwrap();
    assert_eq!(layout.id, "NOTA");
    assert_eq!(layout.line_width, 30);
    assert!(layout.lines[0].fields[0].required);
    assert!(load_layout(&dir.path().join("NOTA.txt"), 30, &FieldHeuristics::default()).is_err());
}

#[test]
fn parsed_records_feed_the_lookup_chain() {
    let text = "HDR12345678000195000042\n010001  ABC-1      1050\n";
    let parsed = parse_record(text, &invoice_layout());
    assert!(parsed.unmatched.is_empty());

    let link = LinkMapping::new("vProd", 1).with_target("det/prod/vProd");
    let candidates = rank_candidates(&link, RankContext::default());
    assert_eq!(
        resolve_link(&link, &candidates, &parsed.record),
        Resolution::Value("1050".to_string())
    );

    let xml = render_intermediate_xml(&parsed.record).unwrap();
    assert!(xml.contains("<nNF>000042</nNF>"));
    assert!(xml.contains("<cProd>ABC-1</cProd>"));
}

proptest! {
    #[test]
    fn fitted_values_parse_back(values in prop::collection::vec("[A-Z0-9]{0,8}", 1..5)) {
        let mut line = LineDef::new("LINHA001").with_initial_value("01");
        for (index, _) in values.iter().enumerate() {
            line = line.with_field(FieldDef::new(format!("f{index}"), index as u32 + 1, 8));
        }
        let mut raw = String::from("010001");
        for value in &values {
            raw.push_str(&Alignment::Left.fit(value, 8));
        }
        let node = parse_line(&raw, &line);
        let parsed: Vec<&str> = node.children.iter().map(|child| child.text.as_str()).collect();
        let expected: Vec<&str> = values.iter().map(String::as_str).collect();
        prop_assert_eq!(parsed, expected);
    }
}
