//! In-memory XML document tree
//!
//! The mapper walks the dataset by name and attribute rather than as a stream
//! of events, so the extracted document is parsed once into an immutable
//! element tree with simple navigation accessors.

use orgref_common::{OrgRefError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A parsed XML document
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse an XML string into a document tree
    pub fn parse(xml: &str) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Err(e) => {
                    return Err(OrgRefError::Xml(format!(
                        "parse error at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                },
                Ok(Event::Eof) => break,
                Ok(Event::Start(start)) => {
                    stack.push(element_from_start(&start)?);
                },
                Ok(Event::Empty(start)) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                },
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| OrgRefError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                },
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|e| OrgRefError::Xml(format!("bad text content: {}", e)))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.text.push_str(&text);
                    }
                },
                Ok(Event::CData(data)) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                },
                // Declarations, comments, processing instructions and doctype
                // carry nothing the mapper needs
                Ok(_) => {},
            }
        }

        if !stack.is_empty() {
            return Err(OrgRefError::Xml("document ended inside an element".to_string()));
        }

        root.map(|root| Document { root })
            .ok_or_else(|| OrgRefError::Xml("document has no root element".to_string()))
    }

    /// Parse raw XML bytes (must be UTF-8) into a document tree
    pub fn parse_bytes(xml: &[u8]) -> Result<Document> {
        let text = std::str::from_utf8(xml)
            .map_err(|e| OrgRefError::Xml(format!("document is not UTF-8: {}", e)))?;
        Self::parse(text)
    }

    /// The document's root element
    pub fn root(&self) -> &Element {
        &self.root
    }
}

/// One element of a parsed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    /// Qualified element name as written in the document
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element name with any namespace prefix stripped
    pub fn local_name(&self) -> &str {
        match self.name.rsplit(':').next() {
            Some(local) => local,
            None => &self.name,
        }
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text content; None when the element has no text
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All child elements with the given name, in document order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// All child elements, in document order
    pub fn all_children(&self) -> &[Element] {
        &self.children
    }

    /// Descend through a slash-separated path of child names
    /// (e.g. `"Manifest/Version"`), taking the first match at each step
    pub fn find(&self, path: &str) -> Option<&Element> {
        let mut current = self;
        for step in path.split('/') {
            current = current.child(step)?;
        }
        Some(current)
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| OrgRefError::Xml(format!("bad attribute in <{}>: {}", name, e)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| OrgRefError::Xml(format!("bad attribute value in <{}>: {}", name, e)))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(OrgRefError::Xml("document has multiple root elements".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <Root attr="top">
            <Manifest>
                <Version value="1-0-0"/>
                <Version value="shadowed"/>
            </Manifest>
            <Items>
                <Item id="a">first</Item>
                <Item id="b">second</Item>
                <Other/>
            </Items>
        </Root>"#;

    #[test]
    fn test_parse_navigation() {
        let doc = Document::parse(SAMPLE).unwrap();
        let root = doc.root();

        assert_eq!(root.name(), "Root");
        assert_eq!(root.attr("attr"), Some("top"));
        assert_eq!(
            doc.root().find("Manifest/Version").and_then(|v| v.attr("value")),
            Some("1-0-0")
        );
        assert_eq!(root.find("Items/Missing"), None);
    }

    #[test]
    fn test_children_filters_by_name() {
        let doc = Document::parse(SAMPLE).unwrap();
        let items = doc.root().child("Items").unwrap();

        let ids: Vec<_> = items.children("Item").filter_map(|i| i.attr("id")).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(items.all_children().len(), 3);
    }

    #[test]
    fn test_text_content() {
        let doc = Document::parse(SAMPLE).unwrap();
        let items = doc.root().child("Items").unwrap();

        assert_eq!(items.child("Item").unwrap().text(), Some("first"));
        assert_eq!(items.child("Other").unwrap().text(), None);
    }

    #[test]
    fn test_attribute_unescaping() {
        let doc = Document::parse(r#"<a name="Bits &amp; Pieces"/>"#).unwrap();
        assert_eq!(doc.root().attr("name"), Some("Bits & Pieces"));
    }

    #[test]
    fn test_local_name_strips_prefix() {
        let doc = Document::parse(r#"<xs:schema xmlns:xs="x"><xs:element name="e"/></xs:schema>"#)
            .unwrap();
        assert_eq!(doc.root().local_name(), "schema");
        assert_eq!(doc.root().all_children()[0].local_name(), "element");
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        assert!(Document::parse("<a><b></a>").is_err());
        assert!(Document::parse("").is_err());
    }

    #[test]
    fn test_parse_bytes_rejects_non_utf8() {
        let err = Document::parse_bytes(&[0x3c, 0x61, 0xff, 0x3e]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }
}
