//! Structural XML formatter.
//!
//! The requested range is re-parsed on its own and re-serialized depth first;
//! the result replaces exactly that range as a single edit.

use tower_lsp::lsp_types::{Range, TextEdit};
use tracing::{debug, error};

use crate::document::TextDocument;
use crate::dom::{parse, Attribute, CharacterData, Element, NodeId, NodeKind, XmlDocument};
use crate::error::DocumentError;
use crate::settings::FormattingOptions;

use super::builder::XmlBuilder;

/// Prolog pseudo-attributes, in the order they are written.
const PROLOG_ATTRIBUTES: [&str; 3] = ["version", "encoding", "standalone"];

/// Format `range` of `document`, or the whole text when `range` is `None`.
///
/// Returns one edit replacing the range, or no edits when the range does not
/// fit the document.
pub fn format(
    document: &TextDocument,
    range: Option<Range>,
    options: &FormattingOptions,
) -> Vec<TextEdit> {
    match try_format(document, range, options) {
        Ok(edit) => vec![edit],
        Err(e) => {
            error!(?range, "formatting failed: {}", e);
            Vec::new()
        }
    }
}

fn try_format(
    document: &TextDocument,
    range: Option<Range>,
    options: &FormattingOptions,
) -> Result<TextEdit, DocumentError> {
    let text = document.text();
    let (start, end) = match range {
        None => (0, text.len()),
        Some(range) => {
            let start = document.offset_at(range.start)?;
            let end = document.offset_at(range.end)?;
            (start.min(end), start.max(end))
        }
    };
    let start_position = document.position_at(start);
    let end_position = document.position_at(end);
    let delimiter = document
        .line_delimiter(start_position.line)?
        .unwrap_or_else(|| document.default_line_delimiter());
    debug!(start, end, "formatting");

    let fragment = parse(&text[start..end]);
    let mut xml = XmlBuilder::new(options, delimiter);
    Formatter::new(&fragment, fragment.text().len(), &mut xml).format_node(fragment.root(), 0);
    if range.is_none() && options.insert_final_newline {
        xml.ensure_final_linefeed();
    }

    Ok(TextEdit::new(
        Range::new(start_position, end_position),
        xml.into_string(),
    ))
}

/// Format a parsed document in full, writing line breaks as `delimiter`.
pub fn format_document(
    document: &XmlDocument,
    options: &FormattingOptions,
    delimiter: &str,
) -> String {
    let mut xml = XmlBuilder::new(options, delimiter);
    Formatter::new(document, document.text().len(), &mut xml).format_node(document.root(), 0);
    xml.into_string()
}

struct Formatter<'d, 'x, 'o> {
    document: &'d XmlDocument,
    /// End tags starting past this offset are not written.
    boundary: usize,
    xml: &'x mut XmlBuilder<'o>,
}

impl<'d, 'x, 'o> Formatter<'d, 'x, 'o> {
    fn new(document: &'d XmlDocument, boundary: usize, xml: &'x mut XmlBuilder<'o>) -> Self {
        Self {
            document,
            boundary,
            xml,
        }
    }

    fn format_node(&mut self, id: NodeId, depth: usize) {
        let document = self.document;
        let node = document.node(id);
        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.format_node(child, depth);
                }
                return;
            }
            // written by the owning element
            NodeKind::Attribute(_) => return,
            NodeKind::Text(data) => {
                self.text(data);
                return;
            }
            _ => {}
        }

        let same_line_comment =
            matches!(&node.kind, NodeKind::Comment(comment) if comment.same_line_end_tag);
        if depth > 0 && !same_line_comment {
            self.xml.linefeed();
            self.xml.indent(depth);
        }

        let text = document.text();
        match &node.kind {
            NodeKind::CData(data) => {
                self.xml.append("<![CDATA[");
                self.xml.append(data.data(text));
                if node.closed {
                    self.xml.append("]]>");
                }
            }
            NodeKind::Comment(comment) => {
                self.xml.append("<!--");
                self.xml.append(comment.data.data(text));
                if node.closed {
                    self.xml.append("-->");
                }
                if depth == 0 {
                    self.xml.linefeed();
                }
            }
            NodeKind::ProcessingInstruction(pi) => {
                self.xml.append("<?");
                self.xml.append(&pi.target);
                self.xml.append(pi.data.data(text));
                if node.closed {
                    self.xml.append("?>");
                }
                if depth == 0 {
                    self.xml.linefeed();
                }
            }
            NodeKind::Prolog(_) => {
                self.xml.append("<?xml");
                for name in PROLOG_ATTRIBUTES {
                    if let Some(value) = document.attribute_value(id, name) {
                        self.xml.add_prolog_attribute(name, value);
                    }
                }
                if node.closed {
                    self.xml.append("?>");
                }
                self.xml.linefeed();
            }
            NodeKind::DocumentType(doctype) => {
                self.xml.append("<!DOCTYPE");
                self.xml
                    .append(&text[doctype.content_start..doctype.content_end]);
                if node.closed {
                    self.xml.append(">");
                }
                self.xml.linefeed();
            }
            NodeKind::Element(element) => self.element(id, element, depth),
            NodeKind::Document | NodeKind::Attribute(_) | NodeKind::Text(_) => {}
        }
    }

    fn text(&mut self, data: &CharacterData) {
        let text = self.document.text();
        if !data.has_data(text) {
            return;
        }
        if self.xml.is_join_content_lines() {
            self.xml.append(data.normalized_data(text));
            return;
        }
        let content = data.content(text);
        if content.is_empty() {
            return;
        }
        if content.contains(self.document.line_delimiter()) {
            self.xml.linefeed();
        }
        self.xml.append(content);
    }

    /// Whether a text child spans lines once its surrounding blank lines
    /// are dropped.
    fn is_multi_line_text(&self, id: NodeId) -> bool {
        let document = self.document;
        match &document.node(id).kind {
            NodeKind::Text(data) => data
                .content(document.text())
                .contains(document.line_delimiter()),
            _ => false,
        }
    }

    fn element(&mut self, id: NodeId, element: &Element, depth: usize) {
        let document = self.document;
        let node = document.node(id);

        let attributes: Vec<&Attribute> = element
            .attributes
            .iter()
            .filter_map(|&attr| document.attribute(attr))
            .collect();
        let wrap = self.wrap_attributes(&element.tag, &attributes);

        self.xml.start_element(&element.tag);
        for (index, attribute) in attributes.iter().enumerate() {
            self.xml.add_attribute(attribute, wrap && index > 0, depth);
        }

        let mut has_elements = false;
        let mut start_closed = false;
        if !node.children.is_empty() {
            self.xml.close_start_element();
            start_closed = true;
            let several = node.children.len() > 1;
            for &child in &node.children {
                let joined =
                    document.is_character_data(child) && self.xml.is_join_content_lines();
                let visible = !joined
                    && (!document.is_text(child) || self.is_multi_line_text(child) || several);
                has_elements |= visible;
                self.format_node(child, depth + 1);
            }
        }

        if node.closed {
            let end_tag_in_range = element
                .end_tag_start
                .is_some_and(|offset| offset <= self.boundary);
            if element.self_closed {
                self.xml.self_close_element();
            } else if end_tag_in_range {
                if has_elements {
                    self.xml.linefeed();
                    self.xml.indent(depth);
                }
                if !start_closed {
                    self.xml.close_start_element();
                }
                self.xml.end_element(&element.tag);
            } else if !start_closed {
                self.xml.close_start_element();
            }
        } else if element.start_tag_close.is_some() && !start_closed {
            self.xml.close_start_element();
        }
    }

    /// Whether attributes after the first go on their own lines.
    fn wrap_attributes(&self, tag: &str, attributes: &[&Attribute]) -> bool {
        if attributes.len() < 2 {
            return false;
        }
        let options = self.xml.options();
        if options.split_attributes {
            return true;
        }
        if options
            .max_inline_attributes
            .is_some_and(|max| attributes.len() > max)
        {
            return true;
        }
        options.max_line_width.is_some_and(|max_width| {
            let attributes_width: usize = attributes
                .iter()
                .map(|attr| 1 + attribute_width(attr))
                .sum();
            let inline_width =
                self.xml.current_line_width() + 1 + tag.chars().count() + attributes_width + 1;
            inline_width > max_width
        })
    }
}

fn attribute_width(attribute: &Attribute) -> usize {
    let value_width = match (&attribute.raw_value, attribute.value()) {
        (Some(_), Some(value)) if attribute.is_requotable() => value.chars().count() + 3,
        (Some((raw, _)), _) => raw.chars().count() + 1,
        (None, _) => 0,
    };
    attribute.name.chars().count() + value_width
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Position;

    fn fmt(source: &str) -> String {
        fmt_with(source, &FormattingOptions::default())
    }

    fn fmt_with(source: &str, options: &FormattingOptions) -> String {
        let document = TextDocument::new(source.to_string());
        let edits = format(&document, None, options);
        assert_eq!(edits.len(), 1);
        edits.into_iter().next().map(|e| e.new_text).unwrap_or_default()
    }

    /// Inputs of the single-pass tests below; formatting any of them twice
    /// must give the same text as formatting once.
    const SAMPLES: &[&str] = &[
        "<a><b><c/></b></a>",
        "<a>  <b>text</b>  </a>",
        "<a>x<b/></a>",
        "<a><b/>tail</a>",
        "<a>x  <b/>  y<c/>z</a>",
        "<a></a>",
        "<a><b>",
        "<a x=\"1\"",
        "<a x=a\"b/>",
        "<?xml standalone=\"yes\" version=\"1.0\"?>",
        "<!DOCTYPE a><!-- c --><a/>",
        "<a><![CDATA[ x\n   y ]]><!--  z\n  --></a>",
        "<a><b/> <!-- note --></a>",
        "<a><b/>x<!-- note --></a>",
        "<a><?pi data?></a>",
        "<a>one\ntwo</a>",
        "<a>\n   one\n     two   \n</a>",
        "<a><b>\n  one\n  two\n</b>x</a>",
        "<a>\r\n<b/></a>\r\n",
    ];

    #[test]
    fn formatting_is_stable() {
        for sample in SAMPLES {
            let once = fmt(sample);
            assert_eq!(fmt(&once), once, "reformatting {sample:?}");
        }
    }

    #[test]
    fn nested_elements_are_indented() {
        assert_eq!(fmt("<a><b><c/></b></a>"), "<a>\n  <b>\n    <c/>\n  </b>\n</a>");
    }

    #[test]
    fn single_text_child_stays_inline() {
        assert_eq!(fmt("<a>  <b>text</b>  </a>"), "<a>\n  <b>text</b>\n</a>");
    }

    #[test]
    fn mixed_content_breaks_before_end_tag() {
        assert_eq!(fmt("<a>x<b/></a>"), "<a>x\n  <b/>\n</a>");
    }

    #[test]
    fn mixed_content_keeps_text_beside_tags() {
        assert_eq!(fmt("<a><b/>tail</a>"), "<a>\n  <b/>tail\n</a>");
        assert_eq!(fmt("<a>x\n  <b/>\n</a>"), "<a>x\n  <b/>\n</a>");
    }

    #[test]
    fn empty_element_keeps_end_tag() {
        assert_eq!(fmt("<a></a>"), "<a></a>");
    }

    #[test]
    fn unclosed_elements_are_not_fabricated() {
        assert_eq!(fmt("<a><b>"), "<a>\n  <b>");
    }

    #[test]
    fn start_tag_without_close_is_left_open() {
        assert_eq!(fmt("<a x=\"1\""), "<a x=\"1\"");
    }

    #[test]
    fn malformed_attribute_values_are_left_as_found() {
        assert_eq!(fmt("<a x=\"1"), "<a x=\"1");
        assert_eq!(fmt("<a x=a\"b/>"), "<a x=a\"b/>");
        assert_eq!(fmt("<a x=b/>"), "<a x=\"b\"/>");
    }

    #[test]
    fn end_tag_past_boundary_is_not_written() {
        let render = |source: &str, boundary: usize| {
            let doc = parse(source);
            let options = FormattingOptions::default();
            let mut xml = XmlBuilder::new(&options, "\n");
            Formatter::new(&doc, boundary, &mut xml).format_node(doc.root(), 0);
            xml.into_string()
        };
        assert_eq!(render("<a><b/></a>", 6), "<a>\n  <b/>");
        assert_eq!(render("<a><b/></a>", 7), "<a>\n  <b/>\n</a>");
        assert_eq!(render("<a></a>", 2), "<a>");
        assert_eq!(render("<a/>", 0), "<a/>");
    }

    #[test]
    fn prolog_attributes_in_fixed_order() {
        assert_eq!(
            fmt(r#"<?xml standalone="yes" version="1.0"?>"#),
            "<?xml version=\"1.0\" standalone=\"yes\"?>\n"
        );
    }

    #[test]
    fn doctype_and_top_level_comment_get_trailing_break() {
        assert_eq!(
            fmt("<!DOCTYPE a><!-- c --><a/>"),
            "<!DOCTYPE a>\n<!-- c -->\n<a/>"
        );
    }

    #[test]
    fn cdata_and_comment_content_is_verbatim() {
        assert_eq!(
            fmt("<a><![CDATA[ x\n   y ]]><!--  z\n  --></a>"),
            "<a>\n  <![CDATA[ x\n   y ]]>\n  <!--  z\n  -->\n</a>"
        );
    }

    #[test]
    fn comment_after_end_tag_on_same_line() {
        assert_eq!(
            fmt("<a><b/> <!-- note --></a>"),
            "<a>\n  <b/><!-- note -->\n</a>"
        );
    }

    #[test]
    fn processing_instruction_inside_element() {
        assert_eq!(fmt("<a><?pi data?></a>"), "<a>\n  <?pi data?>\n</a>");
    }

    #[test]
    fn multi_line_text_starts_on_its_own_line() {
        assert_eq!(fmt("<a>one\ntwo</a>"), "<a>\none\ntwo\n</a>");
    }

    #[test]
    fn multi_line_text_keeps_relative_indentation() {
        assert_eq!(
            fmt("<a>\n   one\n     two   \n</a>"),
            "<a>\n   one\n     two\n</a>"
        );
        assert_eq!(fmt("<a>\n  x\n</a>"), "<a>x</a>");
    }

    #[test]
    fn join_content_lines_normalizes_text() {
        let options = FormattingOptions {
            join_content_lines: true,
            ..Default::default()
        };
        assert_eq!(fmt_with("<a>one\n   two</a>", &options), "<a>one two</a>");
    }

    #[test]
    fn split_attributes_wraps_all_but_first() {
        let options = FormattingOptions {
            split_attributes: true,
            ..Default::default()
        };
        assert_eq!(
            fmt_with(r#"<a><b x="1" y="2"/></a>"#, &options),
            "<a>\n  <b x=\"1\"\n      y=\"2\"/>\n</a>"
        );
    }

    #[test]
    fn attribute_count_threshold() {
        let options = FormattingOptions {
            max_inline_attributes: Some(2),
            split_attributes_indent: 1,
            ..Default::default()
        };
        assert_eq!(fmt_with(r#"<a x="1" y="2"/>"#, &options), r#"<a x="1" y="2"/>"#);
        assert_eq!(
            fmt_with(r#"<a x="1" y="2" z="3"/>"#, &options),
            "<a x=\"1\"\n  y=\"2\"\n  z=\"3\"/>"
        );
    }

    #[test]
    fn line_width_threshold() {
        let options = FormattingOptions {
            max_line_width: Some(20),
            split_attributes_indent: 1,
            ..Default::default()
        };
        assert_eq!(fmt_with(r#"<a x="1" y="2"/>"#, &options), r#"<a x="1" y="2"/>"#);
        assert_eq!(
            fmt_with(r#"<a first="1" second="2"/>"#, &options),
            "<a first=\"1\"\n  second=\"2\"/>"
        );
    }

    #[test]
    fn line_width_counts_nesting_depth() {
        let options = FormattingOptions {
            max_line_width: Some(28),
            ..Default::default()
        };
        let item = r#"<item first="1" second="2"/>"#;
        assert_eq!(fmt_with(item, &options), item);
        assert_eq!(
            fmt_with(&format!("<root>{item}</root>"), &options),
            "<root>\n  <item first=\"1\"\n      second=\"2\"/>\n</root>"
        );
    }

    #[test]
    fn insert_final_newline_for_whole_document() {
        let options = FormattingOptions {
            insert_final_newline: true,
            ..Default::default()
        };
        assert_eq!(fmt_with("<a/>", &options), "<a/>\n");
        assert_eq!(fmt_with("<!-- c -->", &options), "<!-- c -->\n");
    }

    #[test]
    fn crlf_documents_keep_crlf() {
        assert_eq!(fmt("<a>\r\n<b/></a>\r\n"), "<a>\r\n  <b/>\r\n</a>");
    }

    #[test]
    fn bad_range_yields_no_edits() {
        let document = TextDocument::new("<a/>".to_string());
        let range = Range::new(Position::new(0, 0), Position::new(9, 0));
        assert!(format(&document, Some(range), &FormattingOptions::default()).is_empty());
    }

    #[test]
    fn range_is_formatted_as_standalone_document() {
        let source = "<r>\n<a><b/></a>\n</r>";
        let document = TextDocument::new(source.to_string());
        let range = Range::new(Position::new(1, 0), Position::new(1, 11));
        let edits = format(&document, Some(range), &FormattingOptions::default());
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range, range);
        assert_eq!(edits[0].new_text, "<a>\n  <b/>\n</a>");
    }

    #[test]
    fn format_document_uses_given_delimiter() {
        let doc = parse("<a><b/></a>");
        assert_eq!(
            format_document(&doc, &FormattingOptions::default(), "\r\n"),
            "<a>\r\n  <b/>\r\n</a>"
        );
    }
}
