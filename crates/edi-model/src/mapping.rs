//! Mapping definitions: how one layout's fields populate another layout's
//! output elements.

use serde::{Deserialize, Serialize};

use crate::error::StructureError;

/// A derived-value rule.
///
/// `expression` holds one or more pseudo-assignment statements of the form
/// `target/path = Function(args...)`, optionally wrapped in begin/end markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sequence: u32,
    pub expression: String,
}

impl Rule {
    pub fn new(sequence: u32, expression: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            sequence,
            expression: expression.into(),
        }
    }
}

/// A direct copy from an input field to an output element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMapping {
    /// Source field name as declared in the mapping catalogue.
    pub name: String,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub input_layout_id: String,
    #[serde(default)]
    pub target_layout_id: String,
    /// Output element path (`/`-separated); defaults to `name`.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default = "default_allow_empty")]
    pub allow_empty: bool,
}

fn default_allow_empty() -> bool {
    true
}

impl LinkMapping {
    pub fn new(name: impl Into<String>, sequence: u32) -> Self {
        Self {
            name: name.into(),
            sequence,
            input_layout_id: String::new(),
            target_layout_id: String::new(),
            target: None,
            default_value: None,
            allow_empty: true,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    /// Output element path.
    pub fn target_path(&self) -> &str {
        self.target
            .as_deref()
            .filter(|target| !target.trim().is_empty())
            .unwrap_or(&self.name)
    }

    /// Last segment of the output path.
    pub fn element_name(&self) -> &str {
        self.target_path()
            .rsplit('/')
            .find(|segment| !segment.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub input_layout_id: String,
    pub target_layout_id: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub link_mappings: Vec<LinkMapping>,
}

impl Mapping {
    pub fn new(input_layout_id: impl Into<String>, target_layout_id: impl Into<String>) -> Self {
        Self {
            input_layout_id: input_layout_id.into(),
            target_layout_id: target_layout_id.into(),
            rules: Vec::new(),
            link_mappings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: LinkMapping) -> Self {
        self.link_mappings.push(link);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.link_mappings.is_empty()
    }

    pub fn ensure_not_empty(&self) -> Result<(), StructureError> {
        if self.is_empty() {
            return Err(StructureError::EmptyMapping {
                input: self.input_layout_id.clone(),
                target: self.target_layout_id.clone(),
            });
        }
        Ok(())
    }

    /// Rules in ascending declared sequence (stable).
    pub fn ordered_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rules.sort_by_key(|rule| rule.sequence);
        rules
    }

    /// Link mappings in ascending declared sequence (stable).
    pub fn ordered_links(&self) -> Vec<&LinkMapping> {
        let mut links: Vec<&LinkMapping> = self.link_mappings.iter().collect();
        links.sort_by_key(|link| link.sequence);
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_name_is_last_target_segment() {
        let link = LinkMapping::new("CNPJ_EMIT", 1).with_target("infNFe/emit/CNPJ");
        assert_eq!(link.element_name(), "CNPJ");
        let bare = LinkMapping::new("xNome", 2);
        assert_eq!(bare.target_path(), "xNome");
        assert_eq!(bare.element_name(), "xNome");
    }

    #[test]
    fn empty_mapping_is_a_structure_error() {
        let mapping = Mapping::new("IN", "OUT");
        assert!(matches!(
            mapping.ensure_not_empty(),
            Err(StructureError::EmptyMapping { .. })
        ));
    }

    #[test]
    fn links_are_ordered_by_sequence() {
        let mapping = Mapping::new("IN", "OUT")
            .with_link(LinkMapping::new("b", 2))
            .with_link(LinkMapping::new("a", 1));
        let names: Vec<&str> = mapping
            .ordered_links()
            .iter()
            .map(|link| link.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }
}
