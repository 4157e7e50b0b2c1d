//! Intermediate XML rendering.

use edi_model::{IntermediateRecord, RecordNode};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;

type XmlWriter = Writer<Vec<u8>>;

/// Render `record` as the intermediate document the generated transforms read.
pub fn render_intermediate_xml(record: &IntermediateRecord) -> Result<String> {
    let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_node(&mut xml, &record.root)?;
    let mut text = String::from_utf8_lossy(&xml.into_inner()).into_owned();
    text.push('\n');
    Ok(text)
}

fn write_node(xml: &mut XmlWriter, node: &RecordNode) -> Result<()> {
    let name = node.name.as_str();
    if node.children.is_empty() && node.text.is_empty() {
        xml.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }
    xml.write_event(Event::Start(BytesStart::new(name)))?;
    if !node.text.is_empty() {
        xml.write_event(Event::Text(BytesText::new(&node.text)))?;
    }
    for child in &node.children {
        write_node(xml, child)?;
    }
    xml.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
