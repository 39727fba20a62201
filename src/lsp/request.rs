//! Position-based feature requests.
//!
//! A request resolves the client position to the innermost node once, so
//! every feature handler starts from the same context.

use tower_lsp::lsp_types::{MarkupKind, Position, Range};

use crate::document::TextDocument;
use crate::dom::{NodeId, XmlDocument};
use crate::error::DocumentError;
use crate::settings::HoverSettings;

/// Resolve `offset` to the innermost node, preferring an attribute of the
/// enclosing element when the offset lies over one.
pub fn find_node_at(document: &XmlDocument, offset: usize) -> NodeId {
    let node = document.find_node_at(offset);
    document.find_attr_at(node, offset).unwrap_or(node)
}

/// Context handed to a hover handler.
#[derive(Debug)]
pub struct HoverRequest<'a> {
    document: &'a XmlDocument,
    node: NodeId,
    position: Position,
    offset: usize,
    settings: Option<&'a HoverSettings>,
    tag_range: Option<Range>,
    open: bool,
}

impl<'a> HoverRequest<'a> {
    /// Resolve `position` against `document`.
    ///
    /// Fails when the position is outside the text.
    pub fn new(
        text_document: &TextDocument,
        document: &'a XmlDocument,
        position: Position,
        settings: Option<&'a HoverSettings>,
    ) -> Result<Self, DocumentError> {
        let offset = text_document.offset_at(position)?;
        Ok(Self {
            document,
            node: find_node_at(document, offset),
            position,
            offset,
            settings,
            tag_range: None,
            open: false,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn document(&self) -> &'a XmlDocument {
        self.document
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn tag_range(&self) -> Option<Range> {
        self.tag_range
    }

    pub fn set_tag_range(&mut self, tag_range: Range) {
        self.tag_range = Some(tag_range);
    }

    /// Whether the position is on a start tag rather than an end tag.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    /// True only when the client declared hover content formats and `kind`
    /// is among them.
    pub fn can_support_markup_kind(&self, kind: MarkupKind) -> bool {
        self.settings
            .and_then(|settings| settings.capabilities.as_ref())
            .and_then(|capabilities| capabilities.content_format.as_ref())
            .is_some_and(|formats| formats.contains(&kind))
    }
}
