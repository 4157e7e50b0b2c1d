//! Output document shape, optionally inferred from an example document.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::TransformError;

pub const DEFAULT_ROOT: &str = "NFe";
pub const DEFAULT_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";

const LOT_ELEMENT: &str = "idLote";
const SYNC_ELEMENT: &str = "indSinc";

/// Batch-lot wrapper around the output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWrapper {
    pub root: String,
    pub namespace: String,
    /// Literal `idLote` value; `None` emits a config placeholder.
    pub lot: Option<String>,
    /// Literal `indSinc` value; `None` emits a config placeholder.
    pub sync: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentShape {
    pub root: String,
    pub namespace: String,
    pub batch: Option<BatchWrapper>,
}

impl Default for DocumentShape {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            batch: None,
        }
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn default_namespace(start: &BytesStart<'_>) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"xmlns")
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

struct Child {
    name: String,
    namespace: Option<String>,
    text: String,
}

/// Infer root name, namespace and batch wrapper from an example document.
///
/// When the root's children include `idLote` or `indSinc`, the root is the
/// batch wrapper and the first other child is the document root.
pub fn inspect_example(xml: &str) -> Result<DocumentShape, TransformError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut root: Option<(String, Option<String>)> = None;
    let mut children: Vec<Child> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                match depth {
                    0 if root.is_none() => root = Some((local_name(e), default_namespace(e))),
                    1 => children.push(Child {
                        name: local_name(e),
                        namespace: default_namespace(e),
                        text: String::new(),
                    }),
                    _ => {}
                }
                depth += 1;
            }
            Event::Empty(ref e) => match depth {
                0 if root.is_none() => root = Some((local_name(e), default_namespace(e))),
                1 => children.push(Child {
                    name: local_name(e),
                    namespace: default_namespace(e),
                    text: String::new(),
                }),
                _ => {}
            },
            Event::Text(ref e) if depth == 2 => {
                if let Some(child) = children.last_mut() {
                    child.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let Some((root_name, root_namespace)) = root else {
        return Err(TransformError::Example("document has no root element".to_string()));
    };
    let namespace = root_namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let batch_marker = |child: &Child| child.name == LOT_ELEMENT || child.name == SYNC_ELEMENT;
    if !children.iter().any(batch_marker) {
        return Ok(DocumentShape {
            root: root_name,
            namespace,
            batch: None,
        });
    }

    let text_of = |name: &str| {
        children
            .iter()
            .find(|child| child.name == name)
            .map(|child| child.text.trim().to_string())
    };
    let document = children.iter().find(|child| !batch_marker(*child));
    Ok(DocumentShape {
        root: document.map_or_else(|| DEFAULT_ROOT.to_string(), |child| child.name.clone()),
        namespace: document
            .and_then(|child| child.namespace.clone())
            .unwrap_or_else(|| namespace.clone()),
        batch: Some(BatchWrapper {
            root: root_name,
            namespace,
            lot: text_of(LOT_ELEMENT),
            sync: text_of(SYNC_ELEMENT),
        }),
    })
}
