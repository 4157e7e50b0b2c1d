//! Intermediate record: the line → field tree produced by parsing raw
//! positional text against a layout.

use serde::{Deserialize, Serialize};

/// Element of the intermediate record tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordNode {
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<RecordNode>,
}

impl RecordNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: RecordNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: RecordNode) {
        self.children.push(child);
    }

    /// Concatenated text of this node and its descendants, like XPath `string()`.
    pub fn string_value(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.string_value());
        }
        out
    }

    /// Depth-first iterator over all descendants (not including `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a RecordNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a RecordNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Parsed record: a root node whose children are line occurrences, each
/// holding one child per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateRecord {
    pub root: RecordNode,
}

/// Root element name of intermediate records.
pub const RECORD_ROOT: &str = "Registro";

impl IntermediateRecord {
    pub fn new() -> Self {
        Self {
            root: RecordNode::new(RECORD_ROOT),
        }
    }

    pub fn push_line(&mut self, line: RecordNode) {
        self.root.push(line);
    }

    pub fn lines(&self) -> &[RecordNode] {
        &self.root.children
    }
}

impl Default for IntermediateRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_are_document_ordered() {
        let root = RecordNode::new("r")
            .with_child(RecordNode::new("a").with_child(RecordNode::leaf("a1", "x")))
            .with_child(RecordNode::leaf("b", "y"));
        let names: Vec<&str> = root.descendants().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "a1", "b"]);
        assert_eq!(root.string_value(), "xy");
    }
}
