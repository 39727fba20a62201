//! Hover information for XML documents.

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};
use tracing::warn;

use crate::document::DocumentState;
use crate::dom::NodeKind;
use crate::settings::HoverSettings;

use super::request::HoverRequest;

/// Compute the tag range and open flag for the resolved node.
///
/// Returns false when the node has no tag to describe.
fn attach_tag_context(request: &mut HoverRequest<'_>, state: &DocumentState) -> bool {
    let document = request.document();
    let node = document.node(request.node());
    let offset = request.offset();

    let (span, open) = match &node.kind {
        NodeKind::Element(element) => match element.end_tag_start {
            Some(end_tag) if offset >= end_tag => {
                let name_start = end_tag + 2;
                (name_start..name_start + element.tag.len(), false)
            }
            _ => (node.start + 1..node.start + 1 + element.tag.len(), true),
        },
        NodeKind::Attribute(attribute) => (node.start..attribute.name_end, true),
        _ => return false,
    };

    request.set_tag_range(state.text_document.span_to_range(&span));
    request.set_open(open);
    true
}

fn describe(request: &HoverRequest<'_>, markdown: bool) -> Option<String> {
    let document = request.document();
    let id = request.node();
    let code = |s: &str| if markdown { format!("`{s}`") } else { s.to_string() };

    match &document.node(id).kind {
        NodeKind::Element(element) => {
            let which = if request.is_open() { "Start tag" } else { "End tag" };
            let mut description = format!("{which} {}", code(element.tag.as_str()));
            if !document.node(id).closed {
                description.push_str("\n\nThis element is not closed.");
            }
            Some(description)
        }
        NodeKind::Attribute(attribute) => {
            let owner = document
                .parent(id)
                .and_then(|parent| document.tag_name(parent))
                .unwrap_or_default();
            let mut description = format!(
                "Attribute {} of {}",
                code(attribute.name.as_str()),
                code(owner)
            );
            if let Some(value) = attribute.value() {
                description.push_str(&format!("\n\nValue: {}", code(value)));
            }
            Some(description)
        }
        _ => None,
    }
}

/// Hover for the element or attribute under `position`.
pub fn hover_at_position(
    state: &DocumentState,
    position: Position,
    settings: Option<&HoverSettings>,
) -> Option<Hover> {
    let mut request = match HoverRequest::new(&state.text_document, &state.dom, position, settings)
    {
        Ok(request) => request,
        Err(e) => {
            warn!(?position, "hover failed: {}", e);
            return None;
        }
    };

    if !attach_tag_context(&mut request, state) {
        return None;
    }

    let markdown = request.can_support_markup_kind(MarkupKind::Markdown);
    let value = describe(&request, markdown)?;
    let kind = if markdown {
        MarkupKind::Markdown
    } else {
        MarkupKind::PlainText
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent { kind, value }),
        range: request.tag_range(),
    })
}
