//! End-to-end transform generation tests.

use edi_model::{
    FieldDef, IntermediateRecord, Layout, LearnedMappingRule, LearnedModel, LineDef, LinkMapping,
    Mapping, RecordNode, Rule,
};
use edi_transform::{
    LookupCandidate, RankContext, Resolution, TransformGenerator, XSI_NAMESPACE, clean_stylesheet,
    rank_candidates, resolve_link,
};
use proptest::prelude::*;

fn header_only_record() -> IntermediateRecord {
    let mut record = IntermediateRecord::new();
    record.push_line(
        RecordNode::new("HEADER")
            .with_child(RecordNode::leaf("CNPJ", "12345678000195"))
            .with_child(RecordNode::leaf("nNF", "000123")),
    );
    record
}

#[test]
fn missing_required_value_falls_back_to_default() {
    let link = LinkMapping::new("B2BDirectory", 1)
        .with_target("infNFe/infAdic/B2BDirectory")
        .with_default("N/A")
        .with_allow_empty(false);
    let mapping = Mapping::new("NOTA", "NFE").with_link(link.clone());
    let generator = TransformGenerator::default();

    let candidates = generator.candidates_for(&link);
    assert_eq!(
        resolve_link(&link, &candidates, &header_only_record()),
        Resolution::Default("N/A".to_string())
    );

    let generated = generator.generate(&mapping, None).unwrap();
    assert!(generated.warnings.is_empty());
    assert!(generated.xsl.contains("<xsl:text>N/A</xsl:text>"));
    assert!(generated.xsl.contains("<B2BDirectory>"));
    assert!(!generated.xsl.contains("<xsl:if"));
}

#[test]
fn present_value_wins_over_default() {
    let link = LinkMapping::new("nNF", 1).with_target("infNFe/ide/nNF").with_default("0");
    let candidates = rank_candidates(&link, RankContext::default());
    assert_eq!(
        resolve_link(&link, &candidates, &header_only_record()),
        Resolution::Value("000123".to_string())
    );
}

#[test]
fn embedded_chain_uses_the_first_common_lines() {
    let link = LinkMapping::new("CNPJ", 1).with_target("emit/CNPJ");
    let candidates = TransformGenerator::default().candidates_for(&link);
    let xpaths: Vec<String> = edi_transform::lookup::embedded(&candidates)
        .iter()
        .map(LookupCandidate::to_xpath)
        .collect();
    insta::assert_snapshot!(xpaths.join("\n"), @r"
    /*/HEADER/CNPJ
    /*/LINHA000/CNPJ
    /*/LINHA001/CNPJ
    /*/LINHA002/CNPJ
    /*/LINHA003/CNPJ
    ");
}

#[test]
fn learned_rules_rank_first() {
    let mut model = LearnedModel::new("NOTA");
    model.mapping_rules.push(LearnedMappingRule {
        source_line: Some("LINHA001".to_string()),
        source_field: "cnpj_emitente".to_string(),
        target_element: "NFe/infNFe/emit/CNPJ".to_string(),
        confidence: 0.92,
    });
    model.mapping_rules.push(LearnedMappingRule {
        source_line: None,
        source_field: "doc_emit".to_string(),
        target_element: "CNPJ".to_string(),
        confidence: 0.4,
    });
    let generator = TransformGenerator::default().with_learned(&model);
    let candidates = generator.candidates_for(&LinkMapping::new("CNPJ", 1).with_target("emit/CNPJ"));
    assert_eq!(candidates[0].to_xpath(), "/*/LINHA001/cnpj_emitente");
    assert!(
        !candidates
            .iter()
            .any(|candidate| candidate.to_xpath().contains("doc_emit"))
    );
}

#[test]
fn layout_lines_declaring_the_field_follow_learned_rules() {
    let layout = Layout::new("NOTA", "Nota fiscal").with_line(
        LineDef::new("LINHA009")
            .with_initial_value("009")
            .with_field(FieldDef::new("cnpj_emit", 1, 14)),
    );
    let generator = TransformGenerator::default().with_layout(&layout);
    let candidates = generator.candidates_for(&LinkMapping::new("cnpj_emit", 1).with_target("emit/CNPJ"));
    assert_eq!(candidates[0].to_xpath(), "/*/LINHA009/cnpj_emit");
}

#[test]
fn xsi_attribute_gets_a_declaration() {
    let mapping = Mapping::new("NOTA", "NFE").with_link(
        LinkMapping::new("schema", 1)
            .with_target("@xsi:schemaLocation")
            .with_default("http://www.portalfiscal.inf.br/nfe nfe_v4.00.xsd"),
    );
    let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
    assert!(generated.xsl.contains(r#"<xsl:attribute name="xsi:schemaLocation">"#));
    assert_eq!(generated.xsl.matches("xmlns:xsi=").count(), 2);
    assert!(generated.xsl.contains(&format!(
        r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe" xmlns:xsi="{XSI_NAMESPACE}">"#
    )));
}

#[test]
fn example_batch_wrapper_is_reproduced() {
    let example = r#"<?xml version="1.0" encoding="UTF-8"?>
<enviNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <idLote>7</idLote>
  <indSinc>1</indSinc>
  <NFe><infNFe/></NFe>
</enviNFe>"#;
    let mapping = Mapping::new("NOTA", "NFE")
        .with_link(LinkMapping::new("nNF", 1).with_target("NFe/infNFe/ide/nNF"));
    let generated = TransformGenerator::default()
        .generate(&mapping, Some(example))
        .unwrap();
    assert_eq!(generated.batch_root.as_deref(), Some("enviNFe"));
    assert!(generated.xsl.contains("<idLote>7</idLote>"));
    assert!(generated.xsl.contains("<indSinc>1</indSinc>"));
    assert_eq!(generated.xsl.matches("<NFe").count(), 1);
}

#[test]
fn unusable_example_degrades_to_defaults() {
    let mapping = Mapping::new("NOTA", "NFE").with_link(LinkMapping::new("nNF", 1));
    let response = TransformGenerator::default().generate_response(&mapping, Some("<<<"));
    assert!(response.success);
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].starts_with("example document ignored"));
    assert_eq!(response.output.unwrap().root, "NFe");
}

#[test]
fn concat_rule_references_resolve_to_lookups() {
    let mapping = Mapping::new("NOTA", "NFE")
        .with_rule(Rule::new(1, "infNFe/ide/natOp = Concat('VENDA ', CFOP)"));
    let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
    let natop = generated.xsl.find("<natOp>").unwrap();
    let body = &generated.xsl[natop..generated.xsl.find("</natOp>").unwrap()];
    assert!(body.contains(r#"<xsl:variable name="ref"#));
    assert!(body.contains("concat('VENDA ', $ref"));
    assert!(body.contains("normalize-space(/*/HEADER/CFOP) != ''"));
    assert!(body.contains(r#"<xsl:value-of select="/*/LINHA001/CFOP"/>"#));
}

#[test]
fn optional_parent_keeps_children_with_defaults() {
    let mapping = Mapping::new("NOTA", "NFE")
        .with_link(LinkMapping::new("ide", 1).with_target("infNFe/ide"))
        .with_link(
            LinkMapping::new("cUF", 2)
                .with_target("infNFe/ide/cUF")
                .with_default("35"),
        );
    let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
    let cuf = generated.xsl.find("<cUF>").unwrap();
    assert!(!generated.xsl[..cuf].contains("<xsl:if"));
    assert!(generated.xsl[cuf..].contains("<xsl:text>35</xsl:text>"));
}

#[test]
fn optional_leaf_is_guarded() {
    let mapping = Mapping::new("NOTA", "NFE")
        .with_link(LinkMapping::new("xObs", 1).with_target("infNFe/infAdic/xObs"));
    let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
    let guard = generated.xsl.find("<xsl:if").unwrap();
    assert!(guard < generated.xsl.find("<xObs>").unwrap());
}

fn arbitrary_mapping() -> impl Strategy<Value = Mapping> {
    let link = (
        "[A-Za-z][A-Za-z0-9_]{0,8}",
        prop::option::of("[a-z]{1,4}(/[a-z]{1,4}){0,2}"),
        prop::option::of("[A-Z0-9]{1,4}"),
        any::<bool>(),
    );
    prop::collection::vec(link, 1..8).prop_map(|links| {
        links.into_iter().enumerate().fold(
            Mapping::new("IN", "OUT"),
            |mapping, (index, (name, parent, default, allow_empty))| {
                let mut link = LinkMapping::new(name.clone(), index as u32)
                    .with_allow_empty(allow_empty);
                if let Some(parent) = parent {
                    link = link.with_target(format!("{parent}/{name}"));
                }
                if let Some(default) = default {
                    link = link.with_default(default);
                }
                mapping.with_link(link)
            },
        )
    })
}

proptest! {
    #[test]
    fn generation_is_deterministic(mapping in arbitrary_mapping()) {
        let generator = TransformGenerator::default();
        let first = generator.generate(&mapping, None).unwrap();
        let second = generator.generate(&mapping, None).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn generated_output_is_already_clean(mapping in arbitrary_mapping()) {
        let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
        prop_assert_eq!(clean_stylesheet(&generated.xsl), generated.xsl);
    }
}
