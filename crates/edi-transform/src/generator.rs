//! Transform generator: compiles a mapping into an XSL template.

use edi_model::{GenerationResponse, Layout, LearnedModel, LinkMapping, Mapping};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::cleanup::clean_stylesheet;
use crate::error::Result;
use crate::example::{BatchWrapper, DEFAULT_NAMESPACE, DEFAULT_ROOT, DocumentShape, inspect_example};
use crate::expr::{Expression, Operand, parse_rules};
use crate::lookup::{LookupCandidate, RankContext, embedded, rank_candidates};
use crate::sanitize::{path_segments, sanitize_name};
use crate::template::{Content, OutputNode, render_stylesheet};

/// Output document defaults used when no example document is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub default_root: String,
    pub default_namespace: String,
    /// Batch wrapper root (e.g. `enviNFe`) to emit without an example document.
    pub batch_wrapper_root: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            default_root: DEFAULT_ROOT.to_string(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            batch_wrapper_root: None,
        }
    }
}

impl TransformOptions {
    fn default_shape(&self) -> DocumentShape {
        DocumentShape {
            root: self.default_root.clone(),
            namespace: self.default_namespace.clone(),
            batch: self.batch_wrapper_root.as_ref().map(|root| BatchWrapper {
                root: root.clone(),
                namespace: self.default_namespace.clone(),
                lot: None,
                sync: None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTransform {
    pub root: String,
    pub namespace: String,
    pub batch_root: Option<String>,
    pub xsl: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformGenerator<'a> {
    options: TransformOptions,
    context: RankContext<'a>,
}

impl<'a> TransformGenerator<'a> {
    pub fn new(options: TransformOptions) -> Self {
        Self {
            options,
            context: RankContext::default(),
        }
    }

    #[must_use]
    pub fn with_learned(mut self, model: &'a LearnedModel) -> Self {
        self.context.learned = Some(model);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: &'a Layout) -> Self {
        self.context.layout = Some(layout);
        self
    }

    /// Ranked lookup candidates for one link mapping.
    pub fn candidates_for(&self, link: &LinkMapping) -> Vec<LookupCandidate> {
        rank_candidates(link, self.context)
    }

    /// Compile `mapping`. Fails only when the mapping has neither rules nor
    /// link mappings; everything else degrades to warnings.
    pub fn generate(&self, mapping: &Mapping, example: Option<&str>) -> Result<GeneratedTransform> {
        let span = info_span!(
            "generate_transform",
            input = %mapping.input_layout_id,
            target = %mapping.target_layout_id
        );
        let _guard = span.enter();

        mapping.ensure_not_empty()?;
        let mut warnings = Vec::new();

        let shape = match example {
            Some(xml) => inspect_example(xml).unwrap_or_else(|error| {
                warn!(%error, "example document unusable, using defaults");
                warnings.push(format!("example document ignored: {error}"));
                self.options.default_shape()
            }),
            None => self.options.default_shape(),
        };

        let mut root = OutputNode::new(sanitize_name(&shape.root));

        let rules = parse_rules(mapping);
        warnings.extend(rules.warnings);
        for statement in rules.statements {
            let references = match &statement.expression {
                Expression::Concat(a, b) => vec![self.reference(a), self.reference(b)],
                _ => Vec::new(),
            };
            let content = Content::Rule {
                expression: statement.expression,
                references,
            };
            place(&mut root, &statement.target, content, &mut warnings);
        }

        for link in mapping.ordered_links() {
            let candidates = self.candidates_for(link);
            debug!(
                link = %link.name,
                candidates = candidates.len(),
                "ranked lookup candidates"
            );
            let content = Content::Link {
                link: link.clone(),
                candidates,
            };
            place(&mut root, link.target_path(), content, &mut warnings);
        }

        let bytes = render_stylesheet(&shape, &root)?;
        let xsl = clean_stylesheet(&String::from_utf8(bytes)?);
        info!(
            root = %shape.root,
            rules = mapping.rules.len(),
            links = mapping.link_mappings.len(),
            warnings = warnings.len(),
            "generated transform"
        );
        Ok(GeneratedTransform {
            root: shape.root,
            namespace: shape.namespace,
            batch_root: shape.batch.map(|batch| batch.root),
            xsl,
            warnings,
        })
    }

    /// [`TransformGenerator::generate`] wrapped in a response envelope.
    pub fn generate_response(
        &self,
        mapping: &Mapping,
        example: Option<&str>,
    ) -> GenerationResponse<GeneratedTransform> {
        match self.generate(mapping, example) {
            Ok(generated) => {
                let warnings = generated.warnings.clone();
                GenerationResponse::ok(generated, warnings)
            }
            Err(error) => GenerationResponse::failed(vec![error.to_string()], Vec::new()),
        }
    }

    /// The same embedded fallback chain a link mapping of that name gets.
    fn reference(&self, operand: &Operand) -> Vec<LookupCandidate> {
        match operand {
            Operand::Literal(_) => Vec::new(),
            Operand::Reference(name) => {
                let ranked = rank_candidates(&LinkMapping::new(name.as_str(), 0), self.context);
                embedded(&ranked).to_vec()
            }
        }
    }
}

/// Insert `content` at `path`, dropping a leading segment that names the root.
fn place(root: &mut OutputNode, path: &str, content: Content, warnings: &mut Vec<String>) {
    let mut segments = path_segments(path);
    if segments.len() > 1 && sanitize_name(segments[0]).eq_ignore_ascii_case(&root.name) {
        segments.remove(0);
    }
    if segments.is_empty() {
        warnings.push(format!("empty target path '{path}' skipped"));
        return;
    }
    if !root.insert(&segments, content) {
        warnings.push(format!(
            "target '{path}' already mapped; keeping the first definition"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_model::Rule;

    #[test]
    fn empty_mapping_is_rejected() {
        let generator = TransformGenerator::default();
        let response = generator.generate_response(&Mapping::new("IN", "OUT"), None);
        assert!(!response.success);
        assert_eq!(response.errors.len(), 1);
    }

    #[test]
    fn root_segment_in_path_is_not_duplicated() {
        let mapping = Mapping::new("IN", "OUT")
            .with_link(LinkMapping::new("cUF", 1).with_target("NFe/infNFe/ide/cUF"));
        let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
        assert_eq!(generated.xsl.matches("<NFe").count(), 1);
        assert!(generated.xsl.contains("<infNFe>"));
    }

    #[test]
    fn duplicate_targets_warn() {
        let mapping = Mapping::new("IN", "OUT")
            .with_rule(Rule::new(1, "ide/cUF = GetConfig('UF')"))
            .with_link(LinkMapping::new("cUF", 1).with_target("ide/cUF"));
        let generated = TransformGenerator::default().generate(&mapping, None).unwrap();
        assert_eq!(
            generated.warnings,
            ["target 'ide/cUF' already mapped; keeping the first definition"]
        );
        assert!(generated.xsl.contains("<!-- config: UF -->"));
    }

    #[test]
    fn configured_batch_wrapper_uses_placeholders() {
        let options = TransformOptions {
            batch_wrapper_root: Some("enviNFe".to_string()),
            ..TransformOptions::default()
        };
        let mapping = Mapping::new("IN", "OUT").with_link(LinkMapping::new("cUF", 1));
        let generated = TransformGenerator::new(options).generate(&mapping, None).unwrap();
        assert_eq!(generated.batch_root.as_deref(), Some("enviNFe"));
        assert!(generated.xsl.contains("<!-- config: idLote -->"));
        // The document root inherits the wrapper namespace.
        assert!(generated.xsl.contains("<NFe>"));
    }
}
