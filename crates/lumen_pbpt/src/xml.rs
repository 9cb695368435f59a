//! A small owned element tree over `quick-xml`.
//!
//! PBPT scene files carry all data in attributes, so text nodes are dropped.
//! Elements the bridge does not understand are kept as [`XmlElement`]s and
//! written back verbatim.

use std::io::Cursor;

use lumen_core::errors::{LumenError, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, treating an empty string as absent.
    #[must_use]
    pub fn non_empty_attr(&self, key: &str) -> Option<&str> {
        self.attr(key).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == tag)
    }

    pub fn children_named<'a, 't>(&'a self, tag: &'t str) -> impl Iterator<Item = &'a XmlElement> + use<'a, 't> {
        self.children.iter().filter(move |child| child.name == tag)
    }

    /// First `<tag name="...">` child with the given `name` attribute.
    #[must_use]
    pub fn named_child(&self, tag: &str, name: &str) -> Option<&XmlElement> {
        self.children_named(tag).find(|child| child.attr("name") == Some(name))
    }
}

fn utf8(bytes: &[u8], origin: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|err| LumenError::parse(origin, format!("invalid UTF-8: {err}")))
}

fn element_from_start(start: &BytesStart<'_>, origin: &str) -> Result<XmlElement> {
    let mut element = XmlElement::new(utf8(start.name().as_ref(), origin)?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| LumenError::parse(origin, err.to_string()))?;
        let key = utf8(attribute.key.as_ref(), origin)?;
        let value = attribute
            .unescape_value()
            .map_err(|err| LumenError::parse(origin, err.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

/// Parses `text` and returns its root element.
pub fn parse_document(text: &str, origin: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| LumenError::parse(origin, format!("XML load error: {err}")))?;
        match event {
            Event::Start(start) => stack.push(element_from_start(&start, origin)?),
            Event::Empty(start) => {
                let element = element_from_start(&start, origin)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(LumenError::parse(origin, "multiple root elements")),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| LumenError::parse(origin, "unbalanced closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(LumenError::parse(origin, "multiple root elements")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(LumenError::parse(origin, "unexpected end of document"));
    }
    root.ok_or_else(|| LumenError::parse(origin, "document has no root element"))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    let io_err = |err: std::io::Error| LumenError::parse("<xml writer>", err.to_string());

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(io_err)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(io_err)?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(io_err)?;
    Ok(())
}

/// Serializes `root` with an XML declaration and two-space indentation.
pub fn to_document_string(root: &XmlElement) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|err| LumenError::parse("<xml writer>", err.to_string()))?;
    write_element(&mut writer, root)?;
    let mut text = utf8(&writer.into_inner().into_inner(), "<xml writer>")?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_and_empty_elements() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
<scene version="0.4.0">
  <!-- comment -->
  <bsdf type="diffuse" id="white"><rgb name="reflectance" value="0.5 0.5 0.5"/></bsdf>
  <shape type="obj"/>
</scene>"#,
            "test",
        )
        .unwrap();
        assert_eq!(root.name, "scene");
        assert_eq!(root.attr("version"), Some("0.4.0"));
        assert_eq!(root.children.len(), 2);
        let bsdf = root.child("bsdf").unwrap();
        assert_eq!(bsdf.named_child("rgb", "reflectance").unwrap().attr("value"), Some("0.5 0.5 0.5"));
    }

    #[test]
    fn escapes_attribute_values_on_write() {
        let root = XmlElement::new("scene").with_child(XmlElement::new("shape").with_attr("id", "a<b&\"c\""));
        let text = to_document_string(&root).unwrap();
        assert!(text.contains("a&lt;b&amp;&quot;c&quot;"));

        let parsed = parse_document(&text, "roundtrip").unwrap();
        assert_eq!(parsed.child("shape").unwrap().attr("id"), Some("a<b&\"c\""));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_document("<scene><shape></scene>", "bad").is_err());
        assert!(parse_document("", "empty").is_err());
    }
}
