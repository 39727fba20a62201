//! Output buffer for the formatter.

use crate::dom::Attribute;
use crate::settings::FormattingOptions;

/// Accumulates formatted XML text.
#[derive(Debug)]
pub struct XmlBuilder<'o> {
    options: &'o FormattingOptions,
    indent_unit: String,
    delimiter: String,
    out: String,
}

impl<'o> XmlBuilder<'o> {
    pub fn new(options: &'o FormattingOptions, delimiter: &str) -> Self {
        Self {
            options,
            indent_unit: options.indent_unit(),
            delimiter: delimiter.to_string(),
            out: String::new(),
        }
    }

    pub fn options(&self) -> &FormattingOptions {
        self.options
    }

    pub fn is_join_content_lines(&self) -> bool {
        self.options.join_content_lines
    }

    /// Number of characters on the line being written.
    pub fn current_line_width(&self) -> usize {
        let line_start = self.out.rfind('\n').map_or(0, |i| i + 1);
        self.out[line_start..].chars().count()
    }

    pub fn linefeed(&mut self) {
        self.out.push_str(&self.delimiter);
    }

    /// Append a line break unless the output is empty or already ends with one.
    pub fn ensure_final_linefeed(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with(&self.delimiter) {
            self.linefeed();
        }
    }

    pub fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(&self.indent_unit);
        }
    }

    pub fn start_element(&mut self, tag: &str) {
        self.out.push('<');
        self.out.push_str(tag);
    }

    /// Append an attribute, on its own line when `wrap` is set.
    pub fn add_attribute(&mut self, attribute: &Attribute, wrap: bool, level: usize) {
        if wrap {
            self.linefeed();
            self.indent(level + self.options.split_attributes_indent);
        } else {
            self.out.push(' ');
        }
        self.out.push_str(&attribute.name);
        let Some((raw, _)) = &attribute.raw_value else {
            return;
        };
        self.out.push('=');
        match attribute.value().filter(|_| attribute.is_requotable()) {
            Some(value) => {
                let quote = match attribute.quote() {
                    Some('\'') if value.contains('"') => '\'',
                    _ => '"',
                };
                self.out.push(quote);
                self.out.push_str(value);
                self.out.push(quote);
            }
            // unterminated or stray quotes are written as found
            None => self.out.push_str(raw),
        }
    }

    pub fn add_prolog_attribute(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(value);
        self.out.push('"');
    }

    pub fn close_start_element(&mut self) {
        self.out.push('>');
    }

    pub fn self_close_element(&mut self) {
        self.out.push_str("/>");
    }

    pub fn end_element(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    /// Append raw text unchanged.
    pub fn append(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn into_string(self) -> String {
        self.out
    }
}
