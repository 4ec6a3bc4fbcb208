//! Tree addressing for XML scheme descriptors.
//!
//! Scheme descriptors are well-formed XML, so they are fully parsed into a
//! small owned tree (via `xml-rs` events) and written back in the layout the
//! IDE itself uses: three-space indentation, one attribute per line as
//! `name = "value"`, and explicit closing tags for empty elements. Attribute
//! order is kept exactly as read.

use xml::name::OwnedName;
use xml::reader::{EventReader, ParserConfig, XmlEvent};

use crate::error::PatchError;
use super::PatchResult;

const INDENT: &str = "   ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder form of [`Element::set_attr`]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`Element::push_element`]
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_element(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Follow a path of child names, e.g. `["BuildAction", "PreActions"]`
    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |el, name| el.find_child(name))
    }

    /// Return the named child, inserting an empty one at `position` among
    /// the children when absent. The flag is true when it was created.
    pub fn ensure_child(&mut self, name: &str, position: usize) -> (&mut Element, bool) {
        let existing = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name));

        let (index, created) = match existing {
            Some(index) => (index, false),
            None => {
                let index = position.min(self.children.len());
                self.children.insert(index, Node::Element(Element::new(name)));
                (index, true)
            }
        };

        match &mut self.children[index] {
            Node::Element(e) => (e, created),
            _ => unreachable!("index points at an element node"),
        }
    }

    /// Remove child elements matching `pred`; returns how many were removed.
    pub fn remove_elements(&mut self, pred: impl Fn(&Element) -> bool) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if pred(e)));
        before - self.children.len()
    }
}

/// A parsed XML document: declaration fields plus the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub version: String,
    pub encoding: String,
    pub standalone: Option<bool>,
    pub root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        XmlDocument {
            version: "1.0".to_string(),
            encoding: "UTF-8".to_string(),
            standalone: None,
            root,
        }
    }

    pub fn parse(content: &str) -> PatchResult<Self> {
        let config = ParserConfig::new()
            .trim_whitespace(true)
            .ignore_comments(false)
            .coalesce_characters(true)
            .cdata_to_characters(false);
        let reader = EventReader::new_with_config(content.as_bytes(), config);

        let mut version = "1.0".to_string();
        let mut encoding = "UTF-8".to_string();
        let mut standalone = None;
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        for event in reader {
            let event = event.map_err(|e| PatchError::Malformed(format!("XML parse error: {}", e)))?;
            match event {
                XmlEvent::StartDocument {
                    version: v,
                    encoding: enc,
                    standalone: sa,
                } => {
                    version = v.to_string();
                    encoding = enc;
                    standalone = sa;
                }
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    stack.push(Element {
                        name: qualified(&name),
                        attributes: attributes
                            .into_iter()
                            .map(|a| (qualified(&a.name), a.value))
                            .collect(),
                        children: Vec::new(),
                    });
                }
                XmlEvent::EndElement { .. } => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| PatchError::Malformed("unexpected closing tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_element(element),
                        None => root = Some(element),
                    }
                }
                XmlEvent::Characters(text) => {
                    if let Some(parent) = stack.last_mut() {
                        if !text.trim().is_empty() {
                            parent.children.push(Node::Text(text));
                        }
                    }
                }
                XmlEvent::CData(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::CData(text));
                    }
                }
                XmlEvent::Comment(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Comment(text));
                    }
                }
                _ => {}
            }
        }

        let root = root.ok_or_else(|| PatchError::Malformed("document has no root element".to_string()))?;
        Ok(XmlDocument {
            version,
            encoding,
            standalone,
            root,
        })
    }

    pub fn declaration(&self) -> String {
        match self.standalone {
            Some(sa) => format!(
                "<?xml version=\"{}\" encoding=\"{}\" standalone=\"{}\"?>",
                self.version,
                self.encoding,
                if sa { "yes" } else { "no" }
            ),
            None => format!(
                "<?xml version=\"{}\" encoding=\"{}\"?>",
                self.version, self.encoding
            ),
        }
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = self.declaration();
        out.push('\n');
        write_element(&mut out, &self.root, 0);
        out
    }
}

fn qualified(name: &OwnedName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local_name),
        None => name.local_name.clone(),
    }
}

fn write_element(out: &mut String, el: &Element, depth: usize) {
    let indent = INDENT.repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attributes {
        out.push('\n');
        out.push_str(&indent);
        out.push_str(INDENT);
        out.push_str(name);
        out.push_str(" = \"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');

    if let [Node::Text(text)] = el.children.as_slice() {
        out.push_str(&escape_text(text));
        out.push_str("</");
        out.push_str(&el.name);
        out.push_str(">\n");
        return;
    }

    out.push('\n');
    for child in &el.children {
        match child {
            Node::Element(e) => write_element(out, e, depth + 1),
            Node::Text(text) => {
                out.push_str(&indent);
                out.push_str(INDENT);
                out.push_str(&escape_text(text));
                out.push('\n');
            }
            Node::CData(text) => {
                out.push_str(&indent);
                out.push_str(INDENT);
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>\n");
            }
            Node::Comment(text) => {
                out.push_str(&indent);
                out.push_str(INDENT);
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->\n");
            }
        }
    }
    out.push_str(&indent);
    out.push_str("</");
    out.push_str(&el.name);
    out.push_str(">\n");
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
