//! XML document handling
//!
//! This module parses the three input blobs into a generic labeled tree:
//! a node with a tag, optional text, ordered children, and an ordered
//! attribute list. The schema parser, the linter, and the stylesheet
//! compiler all consume this tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element qualified name, namespace resolved from in-scope declarations
    pub qname: QName,
    /// Element attributes in document order
    pub attributes: Vec<(QName, String)>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an attribute value by local name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Append text content
    pub fn append_text(&mut self, text: &str) {
        match &mut self.text {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Find the first child element by local name
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.local_name() == local_name)
    }
}

/// XML Document representation
#[derive(Debug)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Parse an XML document from a string with default limits
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml, &Limits::default())
    }

    /// Parse an XML document from a string, enforcing the given limits
    pub fn parse(xml: &str, limits: &Limits) -> Result<Self> {
        limits.check_input_size(xml.len())?;

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut root: Option<Element> = None;
        // Each stack entry carries the element plus its in-scope namespaces.
        let mut stack: Vec<(Element, NamespaceContext)> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    limits.check_tree_depth(stack.len() + 1)?;
                    let parent_ns = stack
                        .last()
                        .map(|(_, ns)| ns.clone())
                        .unwrap_or_default();
                    let (element, ns) = parse_element(&e, parent_ns, limits)?;
                    stack.push((element, ns));
                }
                Ok(Event::End(_)) => {
                    if let Some((current, _)) = stack.pop() {
                        if let Some((parent, _)) = stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    limits.check_tree_depth(stack.len() + 1)?;
                    let parent_ns = stack
                        .last()
                        .map(|(_, ns)| ns.clone())
                        .unwrap_or_default();
                    let (element, _) = parse_element(&e, parent_ns, limits)?;
                    if let Some((parent, _)) = stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some((current, _)) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                        if !text.trim().is_empty() {
                            current.append_text(&text);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Ignore comments, processing instructions, etc.
            }
            buf.clear();
        }

        if root.is_none() {
            return Err(Error::Xml("document has no root element".to_string()));
        }

        Ok(Document { root })
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Take ownership of the root element
    pub fn into_root(self) -> Result<Element> {
        self.root
            .ok_or_else(|| Error::Xml("document has no root element".to_string()))
    }
}

/// Parse one element from a BytesStart event, resolving its namespace
/// against the declarations in scope.
fn parse_element(
    start: &BytesStart,
    mut ns: NamespaceContext,
    limits: &Limits,
) -> Result<(Element, NamespaceContext)> {
    let name_bytes = start.name();
    let name = std::str::from_utf8(name_bytes.as_ref())
        .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
        .to_string();

    // First pass over attributes: namespace declarations extend the scope
    // before the element's own name can be resolved.
    let mut plain_attrs: Vec<(String, String)> = Vec::new();
    for attr_result in start.attributes() {
        let attr =
            attr_result.map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;

        let attr_name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?
            .to_string();

        let attr_value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?
            .to_string();

        if attr_name == "xmlns" {
            ns.set_default_namespace(&attr_value);
        } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
            ns.add_prefix(prefix, &attr_value);
        } else {
            plain_attrs.push((attr_name, attr_value));
        }
    }

    limits.check_attributes(plain_attrs.len())?;

    let qname = ns.resolve(&name)?;
    let mut element = Element::new(qname);

    for (attr_name, attr_value) in plain_attrs {
        // Unprefixed attributes carry no namespace; prefixed ones resolve.
        let attr_qname = if attr_name.contains(':') {
            ns.resolve(&attr_name)?
        } else {
            QName::local(&attr_name)
        };
        element.attributes.push((attr_qname, attr_value));
    }

    Ok((element, ns))
}
