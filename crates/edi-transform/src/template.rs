//! Output element tree and XSL emission.

use std::borrow::Cow;
use std::io;

use edi_model::LinkMapping;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

use crate::example::DocumentShape;
use crate::expr::{Expression, Operand};
use crate::lookup::{LookupCandidate, embedded};
use crate::sanitize::{XSI_PREFIX, sanitize_attribute_name, sanitize_name};

pub const XSL_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// What fills an output element or attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Rule {
        expression: Expression,
        /// Embedded lookup candidates of each operand, in operand order;
        /// empty for literals.
        references: Vec<Vec<LookupCandidate>>,
    },
    Link {
        link: LinkMapping,
        candidates: Vec<LookupCandidate>,
    },
}

impl Content {
    /// Omitted entirely when every candidate is blank.
    fn is_optional(&self) -> bool {
        matches!(self, Content::Link { link, .. } if link.default_value.is_none() && link.allow_empty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputNode {
    pub name: String,
    pub attributes: Vec<(String, Content)>,
    pub content: Option<Content>,
    pub children: Vec<OutputNode>,
}

impl OutputNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            content: None,
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut OutputNode {
        let index = match self.children.iter().position(|child| child.name == name) {
            Some(index) => index,
            None => {
                self.children.push(OutputNode::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Place `content` at `segments` below this node.
    ///
    /// A last segment starting with `@` is an attribute of its parent. Returns
    /// `false` when the target is already filled; the first content wins.
    pub fn insert(&mut self, segments: &[&str], content: Content) -> bool {
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        let mut node = self;
        for segment in parents {
            node = node.child_mut(&sanitize_name(segment.trim_start_matches('@')));
        }
        if last.starts_with('@') {
            let name = sanitize_attribute_name(last);
            if node.attributes.iter().any(|(existing, _)| *existing == name) {
                return false;
            }
            node.attributes.push((name, content));
            return true;
        }
        let child = node.child_mut(&sanitize_name(last));
        if child.content.is_some() {
            return false;
        }
        child.content = Some(content);
        true
    }

    pub fn uses_xsi(&self) -> bool {
        self.attributes
            .iter()
            .any(|(name, _)| name.starts_with(XSI_PREFIX))
            || self.children.iter().any(OutputNode::uses_xsi)
    }
}

/// Quote a string as an XPath literal.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn non_blank_test(candidates: &[LookupCandidate]) -> String {
    embedded(candidates)
        .iter()
        .map(|candidate| format!("normalize-space({}) != ''", candidate.to_xpath()))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Attribute with `'` left unescaped so XPath expressions stay readable.
fn attribute<'a>(key: &'a str, value: &str) -> Attribute<'a> {
    let escaped = partial_escape(value).replace('"', "&quot;");
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    }
}

fn comment_text(text: &str) -> String {
    format!(" {} ", text.replace("--", "- -"))
}

type XmlWriter = Writer<Vec<u8>>;

/// Render the stylesheet for `root` with the given document shape.
pub fn render_stylesheet(shape: &DocumentShape, root: &OutputNode) -> io::Result<Vec<u8>> {
    let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut stylesheet = BytesStart::new("xsl:stylesheet");
    stylesheet.push_attribute(attribute("version", "1.0"));
    stylesheet.push_attribute(attribute("xmlns:xsl", XSL_NAMESPACE));
    xml.write_event(Event::Start(stylesheet))?;

    let mut output = BytesStart::new("xsl:output");
    output.push_attribute(attribute("method", "xml"));
    output.push_attribute(attribute("encoding", "UTF-8"));
    output.push_attribute(attribute("indent", "yes"));
    xml.write_event(Event::Empty(output))?;

    let mut template = BytesStart::new("xsl:template");
    template.push_attribute(attribute("match", "/"));
    xml.write_event(Event::Start(template))?;

    if let Some(batch) = &shape.batch {
        let mut wrapper = BytesStart::new(batch.root.as_str());
        wrapper.push_attribute(attribute("xmlns", batch.namespace.as_str()));
        xml.write_event(Event::Start(wrapper))?;
        write_literal_or_placeholder(&mut xml, "idLote", batch.lot.as_deref())?;
        write_literal_or_placeholder(&mut xml, "indSinc", batch.sync.as_deref())?;
        let namespace = (shape.namespace != batch.namespace).then_some(shape.namespace.as_str());
        write_node(&mut xml, root, namespace, 0)?;
        xml.write_event(Event::End(BytesEnd::new(batch.root.as_str())))?;
    } else {
        write_node(&mut xml, root, Some(shape.namespace.as_str()), 0)?;
    }

    xml.write_event(Event::End(BytesEnd::new("xsl:template")))?;
    xml.write_event(Event::End(BytesEnd::new("xsl:stylesheet")))?;
    Ok(xml.into_inner())
}

fn write_literal_or_placeholder(
    xml: &mut XmlWriter,
    name: &str,
    value: Option<&str>,
) -> io::Result<()> {
    xml.write_event(Event::Start(BytesStart::new(name)))?;
    match value {
        Some(value) => xml.write_event(Event::Text(BytesText::new(value)))?,
        None => xml.write_event(Event::Comment(BytesText::new(&comment_text(&format!(
            "config: {name}"
        )))))?,
    }
    xml.write_event(Event::End(BytesEnd::new(name)))
}

/// `depth` is the element depth below the output root; it keeps variable
/// names of nested rules distinct.
fn write_node(
    xml: &mut XmlWriter,
    node: &OutputNode,
    namespace: Option<&str>,
    depth: usize,
) -> io::Result<()> {
    // Only a leaf is dropped when blank: children and attributes carry their
    // own defaults and guards.
    let is_leaf = node.attributes.is_empty() && node.children.is_empty();
    match &node.content {
        Some(content @ Content::Link { candidates, .. }) if is_leaf && content.is_optional() => {
            let mut guard = BytesStart::new("xsl:if");
            guard.push_attribute(attribute("test", non_blank_test(candidates).as_str()));
            xml.write_event(Event::Start(guard))?;
            write_element(xml, node, namespace, depth)?;
            xml.write_event(Event::End(BytesEnd::new("xsl:if")))
        }
        _ => write_element(xml, node, namespace, depth),
    }
}

fn write_element(
    xml: &mut XmlWriter,
    node: &OutputNode,
    namespace: Option<&str>,
    depth: usize,
) -> io::Result<()> {
    let mut start = BytesStart::new(node.name.as_str());
    if let Some(namespace) = namespace {
        start.push_attribute(attribute("xmlns", namespace));
    }
    if node.attributes.is_empty() && node.content.is_none() && node.children.is_empty() {
        return xml.write_event(Event::Empty(start));
    }
    xml.write_event(Event::Start(start))?;
    for (name, content) in &node.attributes {
        write_attribute(xml, name, content, depth)?;
    }
    if let Some(content) = &node.content {
        write_content(xml, content, depth)?;
    }
    for child in &node.children {
        write_node(xml, child, None, depth + 1)?;
    }
    xml.write_event(Event::End(BytesEnd::new(node.name.as_str())))
}

fn write_attribute(
    xml: &mut XmlWriter,
    name: &str,
    content: &Content,
    depth: usize,
) -> io::Result<()> {
    let guarded = match content {
        Content::Link { candidates, .. } if content.is_optional() => {
            let mut guard = BytesStart::new("xsl:if");
            guard.push_attribute(attribute("test", non_blank_test(candidates).as_str()));
            xml.write_event(Event::Start(guard))?;
            true
        }
        _ => false,
    };
    let mut element = BytesStart::new("xsl:attribute");
    element.push_attribute(attribute("name", name));
    xml.write_event(Event::Start(element))?;
    write_content(xml, content, depth)?;
    xml.write_event(Event::End(BytesEnd::new("xsl:attribute")))?;
    if guarded {
        xml.write_event(Event::End(BytesEnd::new("xsl:if")))?;
    }
    Ok(())
}

fn write_content(xml: &mut XmlWriter, content: &Content, depth: usize) -> io::Result<()> {
    match content {
        Content::Rule {
            expression,
            references,
        } => write_rule(xml, expression, references, depth),
        Content::Link { link, candidates } => write_fallback_chain(xml, link, candidates),
    }
}

fn write_rule(
    xml: &mut XmlWriter,
    expression: &Expression,
    references: &[Vec<LookupCandidate>],
    depth: usize,
) -> io::Result<()> {
    match expression {
        Expression::ConfigLookup { key } => xml.write_event(Event::Comment(BytesText::new(
            &comment_text(&format!("config: {key}")),
        ))),
        Expression::Concat(a, b) => {
            let mut operands = Vec::with_capacity(2);
            for (index, operand) in [a, b].into_iter().enumerate() {
                let candidates = references.get(index).map_or(&[][..], Vec::as_slice);
                let value = match operand {
                    Operand::Literal(text) => xpath_literal(text),
                    Operand::Reference(_) if candidates.is_empty() => "''".to_string(),
                    Operand::Reference(_) => {
                        let name = format!("ref{depth}_{index}");
                        let mut variable = BytesStart::new("xsl:variable");
                        variable.push_attribute(attribute("name", name.as_str()));
                        xml.write_event(Event::Start(variable))?;
                        write_choice(xml, candidates, None)?;
                        xml.write_event(Event::End(BytesEnd::new("xsl:variable")))?;
                        format!("${name}")
                    }
                };
                operands.push(value);
            }
            let select = format!("concat({})", operands.join(", "));
            let mut value = BytesStart::new("xsl:value-of");
            value.push_attribute(attribute("select", select.as_str()));
            xml.write_event(Event::Empty(value))
        }
        Expression::Unknown { raw, .. } => xml.write_event(Event::Comment(BytesText::new(
            &comment_text(&format!("unrecognized: {raw}")),
        ))),
    }
}

/// `xsl:choose` over the embedded candidates, first non-blank wins.
fn write_fallback_chain(
    xml: &mut XmlWriter,
    link: &LinkMapping,
    candidates: &[LookupCandidate],
) -> io::Result<()> {
    write_choice(xml, embedded(candidates), link.default_value.as_deref())
}

fn write_choice(
    xml: &mut XmlWriter,
    candidates: &[LookupCandidate],
    default: Option<&str>,
) -> io::Result<()> {
    xml.write_event(Event::Start(BytesStart::new("xsl:choose")))?;
    for candidate in candidates {
        let path = candidate.to_xpath();
        let mut when = BytesStart::new("xsl:when");
        let test = format!("normalize-space({path}) != ''");
        when.push_attribute(attribute("test", test.as_str()));
        xml.write_event(Event::Start(when))?;
        let mut value = BytesStart::new("xsl:value-of");
        value.push_attribute(attribute("select", path.as_str()));
        xml.write_event(Event::Empty(value))?;
        xml.write_event(Event::End(BytesEnd::new("xsl:when")))?;
    }
    if let Some(default) = default {
        xml.write_event(Event::Start(BytesStart::new("xsl:otherwise")))?;
        xml.write_event(Event::Start(BytesStart::new("xsl:text")))?;
        xml.write_event(Event::Text(BytesText::new(default)))?;
        xml.write_event(Event::End(BytesEnd::new("xsl:text")))?;
        xml.write_event(Event::End(BytesEnd::new("xsl:otherwise")))?;
    }
    xml.write_event(Event::End(BytesEnd::new("xsl:choose")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_pick_a_safe_quote() {
        assert_eq!(xpath_literal("abc"), "'abc'");
        assert_eq!(xpath_literal("d'agua"), "\"d'agua\"");
        assert_eq!(xpath_literal("a'b\"c"), "concat('a', \"'\", 'b\"c')");
    }

    #[test]
    fn first_insert_wins_and_attributes_attach_to_parent() {
        let content = |name: &str| Content::Link {
            link: LinkMapping::new(name, 1),
            candidates: Vec::new(),
        };
        let mut root = OutputNode::new("NFe");
        assert!(root.insert(&["infNFe", "ide", "cUF"], content("a")));
        assert!(!root.insert(&["infNFe", "ide", "cUF"], content("b")));
        assert!(root.insert(&["infNFe", "@versao"], content("c")));
        assert!(root.insert(&["@xsi:schemaLocation"], content("d")));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].attributes[0].0, "versao");
        assert!(root.uses_xsi());
    }
}
