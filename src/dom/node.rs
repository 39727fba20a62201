//! Arena-backed XML node model.
//!
//! Every node lives in the owning [`XmlDocument`]'s arena and is addressed by a
//! [`NodeId`]. The only owning edge is parent -> children; `parent` is a plain
//! lookup key. A document is built once per text version and never mutated.

use std::ops::Range;
use std::sync::{LazyLock, OnceLock};

use regex::Regex;

use crate::document::detect_line_delimiter;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// A node: shared position fields plus a variant payload.
#[derive(Debug)]
pub struct Node {
    /// Offset of the first character of the node.
    pub start: usize,
    /// Offset just past the last character of the node.
    pub end: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Whether the node's closing construct was found in the source.
    pub closed: bool,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    /// The untagged root container.
    Document,
    Element(Element),
    Attribute(Attribute),
    Text(CharacterData),
    CData(CharacterData),
    Comment(Comment),
    ProcessingInstruction(ProcessingInstruction),
    DocumentType(DocumentType),
    Prolog(Prolog),
}

#[derive(Debug)]
pub struct Element {
    pub tag: String,
    /// Attribute nodes in declaration order.
    pub attributes: Vec<NodeId>,
    /// Offset of the `>` ending the start tag (the `>` of `/>` when self-closed).
    pub start_tag_close: Option<usize>,
    /// Offset of the `<` starting the end tag.
    pub end_tag_start: Option<usize>,
    pub self_closed: bool,
}

#[derive(Debug)]
pub struct Attribute {
    pub name: String,
    /// Offset just past the name.
    pub name_end: usize,
    /// Raw value including any quotes, with its span.
    pub raw_value: Option<(String, Range<usize>)>,
}

impl Attribute {
    /// The value without its delimiting quotes.
    pub fn value(&self) -> Option<&str> {
        let (raw, _) = self.raw_value.as_ref()?;
        Some(unquote(raw))
    }

    /// The quote character the source used, if any.
    pub fn quote(&self) -> Option<char> {
        let (raw, _) = self.raw_value.as_ref()?;
        raw.chars().next().filter(|c| *c == '"' || *c == '\'')
    }

    /// Whether the value can be written back between canonical quotes: it
    /// is quoted and terminated, or unquoted without any quote character.
    pub fn is_requotable(&self) -> bool {
        let Some((raw, _)) = self.raw_value.as_ref() else {
            return true;
        };
        match self.quote() {
            Some(q) => raw.len() >= 2 && raw.ends_with(q),
            None => !raw.contains(['"', '\'']),
        }
    }

    /// Whether `offset` lies over the attribute's name or its value.
    pub fn contains(&self, start: usize, offset: usize) -> bool {
        if start <= offset && offset <= self.name_end {
            return true;
        }
        matches!(&self.raw_value, Some((_, span)) if span.start <= offset && offset <= span.end)
    }
}

fn unquote(raw: &str) -> &str {
    let mut chars = raw.chars();
    match chars.next() {
        Some(q @ ('"' | '\'')) => {
            let inner = &raw[1..];
            inner.strip_suffix(q).unwrap_or(inner)
        }
        _ => raw,
    }
}

/// Payload shared by Text, CDATA and Comment nodes.
#[derive(Debug)]
pub struct CharacterData {
    pub content_start: usize,
    pub content_end: usize,
    data: OnceLock<String>,
    normalized_data: OnceLock<String>,
}

impl CharacterData {
    pub fn new(content_start: usize, content_end: usize) -> Self {
        Self {
            content_start,
            content_end,
            data: OnceLock::new(),
            normalized_data: OnceLock::new(),
        }
    }

    /// The raw content between the delimiters, sliced from `text` on first use.
    pub fn data(&self, text: &str) -> &str {
        self.data
            .get_or_init(|| text[self.content_start..self.content_end].to_string())
    }

    /// The content with whitespace runs collapsed to one space and trimmed.
    pub fn normalized_data(&self, text: &str) -> &str {
        self.normalized_data.get_or_init(|| {
            WHITESPACE_RUN
                .replace_all(self.data(text), " ")
                .trim()
                .to_string()
        })
    }

    pub fn has_data(&self, text: &str) -> bool {
        !self.data(text).is_empty()
    }

    /// Whether the content contains `delimiter`.
    pub fn has_multi_line(&self, text: &str, delimiter: &str) -> bool {
        self.data(text).contains(delimiter)
    }

    /// The content without the whitespace around it.
    ///
    /// Content spanning several lines keeps the indentation of its first
    /// line, so inner lines stay aligned with it.
    pub fn content(&self, text: &str) -> &str {
        let data = self.data(text);
        let body = data.trim();
        if !body.contains(['\r', '\n']) {
            return body;
        }
        let leading = &data[..data.len() - data.trim_start().len()];
        let start = leading.rfind(['\r', '\n']).map_or(0, |i| i + 1);
        data[start..].trim_end()
    }
}

#[derive(Debug)]
pub struct Comment {
    pub data: CharacterData,
    /// The comment starts on the line of the end tag just before it.
    pub same_line_end_tag: bool,
}

#[derive(Debug)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: CharacterData,
}

#[derive(Debug)]
pub struct DocumentType {
    pub content_start: usize,
    pub content_end: usize,
}

#[derive(Debug)]
pub struct Prolog {
    pub attributes: Vec<NodeId>,
}

/// A parsed XML document: the source text and its node arena.
#[derive(Debug)]
pub struct XmlDocument {
    text: String,
    nodes: Vec<Node>,
    line_delimiter: &'static str,
}

impl XmlDocument {
    pub(crate) fn from_parts(text: String, nodes: Vec<Node>) -> Self {
        let line_delimiter = detect_line_delimiter(&text);
        Self {
            text,
            nodes,
            line_delimiter,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The root container node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// The detected line break sequence of the source text.
    pub fn line_delimiter(&self) -> &str {
        self.line_delimiter
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Tag name for elements, processing instructions and the prolog.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element(element) => Some(&element.tag),
            NodeKind::ProcessingInstruction(pi) => Some(&pi.target),
            NodeKind::Prolog(_) => Some("xml"),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element(_))
    }

    pub fn is_attribute(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Attribute(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Comment(_))
    }

    pub fn is_cdata(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::CData(_))
    }

    pub fn is_processing_instruction(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::ProcessingInstruction(_))
    }

    pub fn is_prolog(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Prolog(_))
    }

    pub fn is_doctype(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::DocumentType(_))
    }

    pub fn character_data(&self, id: NodeId) -> Option<&CharacterData> {
        match &self.node(id).kind {
            NodeKind::Text(data) | NodeKind::CData(data) => Some(data),
            NodeKind::Comment(comment) => Some(&comment.data),
            NodeKind::ProcessingInstruction(pi) => Some(&pi.data),
            _ => None,
        }
    }

    pub fn is_character_data(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).kind,
            NodeKind::Text(_)
                | NodeKind::CData(_)
                | NodeKind::Comment(_)
                | NodeKind::ProcessingInstruction(_)
        )
    }

    /// Raw content of a character data node.
    pub fn data(&self, id: NodeId) -> Option<&str> {
        self.character_data(id).map(|data| data.data(&self.text))
    }

    pub fn normalized_data(&self, id: NodeId) -> Option<&str> {
        self.character_data(id)
            .map(|data| data.normalized_data(&self.text))
    }

    /// Whether a character data node spans more than one line.
    pub fn has_multi_line(&self, id: NodeId) -> bool {
        self.character_data(id)
            .is_some_and(|data| data.has_multi_line(&self.text, self.line_delimiter))
    }

    pub fn attribute(&self, id: NodeId) -> Option<&Attribute> {
        match &self.node(id).kind {
            NodeKind::Attribute(attr) => Some(attr),
            _ => None,
        }
    }

    /// Attribute nodes of an element or the prolog.
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Element(element) => &element.attributes,
            NodeKind::Prolog(prolog) => &prolog.attributes,
            _ => &[],
        }
    }

    /// Unquoted value of the first attribute called `name`.
    pub fn attribute_value(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .filter_map(|&attr| self.attribute(attr))
            .find(|attr| attr.name == name)
            .and_then(Attribute::value)
    }

    /// Innermost node whose span contains `offset`.
    ///
    /// Spans are inclusive at both ends; when two siblings share a boundary
    /// the earlier one wins. Falls back to the root.
    pub fn find_node_at(&self, offset: usize) -> NodeId {
        let mut current = self.root();
        loop {
            let next = self.children(current).iter().copied().find(|&child| {
                let node = self.node(child);
                node.start <= offset && offset <= node.end
            });
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// The attribute of `element` whose name or value lies over `offset`.
    pub fn find_attr_at(&self, element: NodeId, offset: usize) -> Option<NodeId> {
        if !self.is_element(element) {
            return None;
        }
        self.attributes(element).iter().copied().find(|&id| {
            let start = self.node(id).start;
            self.attribute(id)
                .is_some_and(|attr| attr.contains(start, offset))
        })
    }
}
