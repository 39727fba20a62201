//! Tolerant XML tree builder.
//!
//! Never rejects input: truncated constructs become nodes with
//! `closed = false`, stray markup is kept as text, and every byte of
//! non-whitespace source text ends up inside some node.

use super::node::{
    Attribute, CharacterData, Comment, DocumentType, Element, Node, NodeId, NodeKind,
    ProcessingInstruction, Prolog, XmlDocument,
};

/// Build a tree from `text`.
pub fn parse(text: &str) -> XmlDocument {
    let mut builder = TreeBuilder::new(text);
    builder.run();
    builder.finish()
}

struct TreeBuilder<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    nodes: Vec<Node>,
    /// Open elements, root first.
    stack: Vec<NodeId>,
    /// Offset just past the most recent end tag or `/>`.
    last_end_tag: Option<usize>,
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

impl<'a> TreeBuilder<'a> {
    fn new(text: &'a str) -> Self {
        let root = Node {
            start: 0,
            end: text.len(),
            parent: None,
            children: Vec::new(),
            closed: true,
            kind: NodeKind::Document,
        };
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            nodes: vec![root],
            stack: vec![NodeId(0)],
            last_end_tag: None,
        }
    }

    fn finish(mut self) -> XmlDocument {
        let len = self.text.len();
        for id in self.stack.drain(1..) {
            let node = &mut self.nodes[id.0];
            node.end = len;
            node.closed = false;
        }
        XmlDocument::from_parts(self.text.to_string(), self.nodes)
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(NodeId(0))
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    /// Offset of the next `<` at or after `from`, or the end of input.
    fn next_markup(&self, from: usize) -> usize {
        self.text[from..]
            .find('<')
            .map_or(self.text.len(), |i| from + i)
    }

    fn push_node(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    fn push_child(&mut self, start: usize, end: usize, closed: bool, kind: NodeKind) -> NodeId {
        let parent = self.current();
        self.push_node(
            parent,
            Node {
                start,
                end,
                parent: Some(parent),
                children: Vec::new(),
                closed,
                kind,
            },
        )
    }

    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment();
            } else if rest.starts_with("<![CDATA[") {
                self.cdata();
            } else if rest.len() >= 9 && rest.as_bytes()[..9].eq_ignore_ascii_case(b"<!DOCTYPE") {
                self.doctype();
            } else if rest.starts_with("<?") && self.peek_at(2).is_some_and(is_name_start) {
                self.processing_instruction();
            } else if rest.starts_with("</") {
                self.end_tag();
            } else if rest.starts_with('<') && self.peek_at(1).is_some_and(is_name_start) {
                self.start_tag();
            } else {
                self.text_run();
            }
        }
    }

    fn text_run(&mut self) {
        let start = self.pos;
        let from = if self.bytes[start] == b'<' {
            start + 1
        } else {
            start
        };
        let end = self.next_markup(from);
        self.pos = end;
        self.push_text(start, end);
    }

    /// Add a text span, extending an adjacent preceding text node.
    fn push_text(&mut self, start: usize, end: usize) {
        let parent = self.current();
        if let Some(&last) = self.nodes[parent.0].children.last() {
            let node = &mut self.nodes[last.0];
            let extended = match &node.kind {
                NodeKind::Text(data) if node.end == start => Some(data.content_start),
                _ => None,
            };
            if let Some(content_start) = extended {
                node.end = end;
                node.kind = NodeKind::Text(CharacterData::new(content_start, end));
                return;
            }
        }
        if self.text[start..end].bytes().all(is_space) {
            return;
        }
        self.push_child(start, end, true, NodeKind::Text(CharacterData::new(start, end)));
    }

    /// Scan a construct delimited by `open` and `close`, returning the
    /// content span, the node end, and whether `close` was found.
    fn delimited(&mut self, open: &str, close: &str) -> (usize, usize, usize, bool) {
        let content_start = self.pos + open.len();
        match self.text[content_start..].find(close) {
            Some(i) => {
                let content_end = content_start + i;
                self.pos = content_end + close.len();
                (content_start, content_end, self.pos, true)
            }
            None => {
                self.pos = self.text.len();
                (content_start, self.pos, self.pos, false)
            }
        }
    }

    fn comment(&mut self) {
        let start = self.pos;
        let same_line_end_tag = self.last_end_tag.is_some_and(|close| {
            close <= start && self.text[close..start].bytes().all(|b| b == b' ' || b == b'\t')
        });
        let (content_start, content_end, end, closed) = self.delimited("<!--", "-->");
        self.push_child(
            start,
            end,
            closed,
            NodeKind::Comment(Comment {
                data: CharacterData::new(content_start, content_end),
                same_line_end_tag,
            }),
        );
    }

    fn cdata(&mut self) {
        let start = self.pos;
        let (content_start, content_end, end, closed) = self.delimited("<![CDATA[", "]]>");
        self.push_child(
            start,
            end,
            closed,
            NodeKind::CData(CharacterData::new(content_start, content_end)),
        );
    }

    fn doctype(&mut self) {
        let start = self.pos;
        let content_start = start + "<!DOCTYPE".len();
        self.pos = content_start;

        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut closed = false;
        while let Some(b) = self.peek() {
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => {
                    closed = true;
                    break;
                }
                (None, b'<') if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }

        let content_end = self.pos;
        if closed {
            self.pos += 1;
        }
        self.push_child(
            start,
            self.pos,
            closed,
            NodeKind::DocumentType(DocumentType {
                content_start,
                content_end,
            }),
        );
    }

    fn processing_instruction(&mut self) {
        let start = self.pos;
        self.pos += 2;
        let target = self.read_name();

        if target == "xml" {
            let id = self.push_child(
                start,
                self.pos,
                false,
                NodeKind::Prolog(Prolog {
                    attributes: Vec::new(),
                }),
            );
            let attributes = self.attributes(id, true);
            let closed = self.rest().starts_with("?>");
            if closed {
                self.pos += 2;
            }
            let node = &mut self.nodes[id.0];
            node.end = self.pos;
            node.closed = closed;
            if let NodeKind::Prolog(prolog) = &mut node.kind {
                prolog.attributes = attributes;
            }
            return;
        }

        let content_start = self.pos;
        let (content_end, closed) = match self.text[content_start..].find("?>") {
            Some(i) => (content_start + i, true),
            None => (self.next_markup(content_start), false),
        };
        self.pos = if closed { content_end + 2 } else { content_end };
        self.push_child(
            start,
            self.pos,
            closed,
            NodeKind::ProcessingInstruction(ProcessingInstruction {
                target: target.to_string(),
                data: CharacterData::new(content_start, content_end),
            }),
        );
    }

    fn start_tag(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let tag = self.read_name().to_string();
        let id = self.push_child(
            start,
            self.pos,
            false,
            NodeKind::Element(Element {
                tag,
                attributes: Vec::new(),
                start_tag_close: None,
                end_tag_start: None,
                self_closed: false,
            }),
        );

        let attributes = self.attributes(id, false);
        let mut start_tag_close = None;
        let mut self_closed = false;
        let mut open = false;
        if self.rest().starts_with("/>") {
            start_tag_close = Some(self.pos + 1);
            self_closed = true;
            self.pos += 2;
            self.last_end_tag = Some(self.pos);
        } else if self.peek() == Some(b'>') {
            start_tag_close = Some(self.pos);
            self.pos += 1;
            open = true;
        }

        let node = &mut self.nodes[id.0];
        node.end = self.pos;
        node.closed = self_closed;
        if let NodeKind::Element(element) = &mut node.kind {
            element.attributes = attributes;
            element.start_tag_close = start_tag_close;
            element.self_closed = self_closed;
        }
        if open {
            self.stack.push(id);
        }
    }

    /// Parse attributes up to the end of a start tag or prolog.
    fn attributes(&mut self, owner: NodeId, in_prolog: bool) -> Vec<NodeId> {
        let mut attributes = Vec::new();
        loop {
            self.skip_spaces();
            let Some(b) = self.peek() else { break };
            let next = self.peek_at(1);
            match b {
                b'>' | b'<' => break,
                b'/' if next == Some(b'>') => break,
                b'?' if in_prolog && next == Some(b'>') => break,
                _ => {}
            }

            let start = self.pos;
            while self.peek().is_some_and(|b| {
                !is_space(b)
                    && !matches!(b, b'=' | b'>' | b'<' | b'/')
                    && !(in_prolog && b == b'?')
            }) {
                self.pos += 1;
            }
            if self.pos == start {
                // stray '=', '/' or '?'
                self.pos += 1;
                continue;
            }
            let name_end = self.pos;
            let name = self.text[start..name_end].to_string();

            let before_equals = self.pos;
            self.skip_spaces();
            let raw_value = if self.peek() == Some(b'=') {
                self.pos += 1;
                self.skip_spaces();
                self.attribute_value(in_prolog)
            } else {
                self.pos = before_equals;
                None
            };

            let end = raw_value.as_ref().map_or(name_end, |(_, span)| span.end);
            let id = NodeId(self.nodes.len());
            self.nodes.push(Node {
                start,
                end,
                parent: Some(owner),
                children: Vec::new(),
                closed: true,
                kind: NodeKind::Attribute(Attribute {
                    name,
                    name_end,
                    raw_value,
                }),
            });
            attributes.push(id);
        }
        attributes
    }

    fn attribute_value(&mut self, in_prolog: bool) -> Option<(String, std::ops::Range<usize>)> {
        let start = self.pos;
        match self.peek()? {
            b'>' | b'<' => return None,
            q @ (b'"' | b'\'') => {
                let quote = char::from(q);
                self.pos = match self.text[start + 1..].find(quote) {
                    Some(i) => start + 1 + i + 1,
                    None => self.next_markup(start + 1),
                };
            }
            _ => {
                while let Some(b) = self.peek() {
                    let next = self.peek_at(1);
                    let at_tag_end = (b == b'/' || (in_prolog && b == b'?')) && next == Some(b'>');
                    if is_space(b) || b == b'>' || b == b'<' || at_tag_end {
                        break;
                    }
                    self.pos += 1;
                }
            }
        }
        Some((self.text[start..self.pos].to_string(), start..self.pos))
    }

    fn end_tag(&mut self) {
        let start = self.pos;
        self.pos += 2;
        let name = self.read_name();
        self.skip_spaces();
        if self.peek() == Some(b'>') {
            self.pos += 1;
        }

        let matching = if name.is_empty() {
            None
        } else {
            self.stack.iter().rposition(|id| {
                matches!(&self.nodes[id.0].kind, NodeKind::Element(element) if element.tag == name)
            })
        };

        let Some(index) = matching.filter(|&i| i > 0) else {
            self.push_text(start, self.pos);
            return;
        };

        for id in self.stack.drain(index + 1..) {
            let node = &mut self.nodes[id.0];
            node.end = start;
            node.closed = false;
        }
        if let Some(id) = self.stack.pop() {
            let node = &mut self.nodes[id.0];
            node.end = self.pos;
            node.closed = true;
            if let NodeKind::Element(element) = &mut node.kind {
                element.end_tag_start = Some(start);
            }
        }
        self.last_end_tag = Some(self.pos);
    }
}
