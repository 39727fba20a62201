//! Text utilities for position conversion.
//!
//! Provides byte offset <-> LSP position conversion with proper UTF-16 handling,
//! plus line delimiter detection used by the formatter and the DOM.

use tower_lsp::lsp_types::{Position, Range};

use crate::error::DocumentError;

/// Line delimiter used when the text carries none of its own.
pub const DEFAULT_LINE_DELIMITER: &str = "\n";

/// A text buffer with a pre-computed line index.
///
/// LSP positions use line/column where column is in UTF-16 code units.
/// Line start offsets are computed once so lookups are O(log n).
#[derive(Debug, Clone)]
pub struct TextDocument {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    text: String,
}

impl TextDocument {
    /// Build a text document from source text.
    pub fn new(text: String) -> Self {
        let mut line_starts = vec![0];

        for (i, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }

        Self { line_starts, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of a line's content, excluding its delimiter.
    fn line_content(&self, line: usize) -> (usize, usize) {
        let start = self.line_starts[line];
        let end = match self.line_starts.get(line + 1) {
            Some(&next) => {
                let without_lf = next - 1;
                if without_lf > start && self.text.as_bytes()[without_lf - 1] == b'\r' {
                    without_lf - 1
                } else {
                    without_lf
                }
            }
            None => self.text.len(),
        };
        (start, end)
    }

    /// Convert a byte offset to an LSP position.
    ///
    /// Offsets past the end of the text are clamped to the end.
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let (line_start, line_end) = self.line_content(line);

        let mut col = 0u32;
        for (i, c) in self.text[line_start..line_end].char_indices() {
            if line_start + i >= offset {
                break;
            }
            col += c.len_utf16() as u32;
        }

        Position::new(line as u32, col)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Fails when the line does not exist or the column lies past the end of
    /// the line's content.
    pub fn offset_at(&self, position: Position) -> Result<usize, DocumentError> {
        let bad_location = || DocumentError::BadLocation {
            line: position.line,
            character: position.character,
        };

        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return Err(bad_location());
        }

        let (line_start, line_end) = self.line_content(line);

        let mut utf16_col = 0u32;
        for (i, c) in self.text[line_start..line_end].char_indices() {
            if utf16_col >= position.character {
                return Ok(line_start + i);
            }
            utf16_col += c.len_utf16() as u32;
        }

        if utf16_col == position.character {
            Ok(line_end)
        } else {
            Err(bad_location())
        }
    }

    /// The delimiter terminating `line`, or `None` for the last line.
    pub fn line_delimiter(&self, line: u32) -> Result<Option<&str>, DocumentError> {
        let line_index = line as usize;
        if line_index >= self.line_starts.len() {
            return Err(DocumentError::BadLocation { line, character: 0 });
        }
        if line_index + 1 == self.line_starts.len() {
            return Ok(None);
        }
        let (_, content_end) = self.line_content(line_index);
        Ok(Some(&self.text[content_end..self.line_starts[line_index + 1]]))
    }

    /// Delimiter of the first terminated line, falling back to `"\n"`.
    pub fn default_line_delimiter(&self) -> &str {
        detect_line_delimiter(&self.text)
    }

    /// Convert a byte span to an LSP range.
    pub fn span_to_range(&self, span: &std::ops::Range<usize>) -> Range {
        Range::new(self.position_at(span.start), self.position_at(span.end))
    }
}

/// Detect the line break sequence used by `text`.
pub fn detect_line_delimiter(text: &str) -> &'static str {
    match text.find('\n') {
        Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => "\r\n",
        Some(_) => "\n",
        None => DEFAULT_LINE_DELIMITER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let doc = TextDocument::new("hello world".to_string());
        assert_eq!(doc.position_at(0), Position::new(0, 0));
        assert_eq!(doc.position_at(5), Position::new(0, 5));
        assert_eq!(doc.position_at(11), Position::new(0, 11));
    }

    #[test]
    fn multi_line() {
        let doc = TextDocument::new("hello\nworld\ntest".to_string());
        assert_eq!(doc.position_at(5), Position::new(0, 5));
        assert_eq!(doc.position_at(6), Position::new(1, 0));
        assert_eq!(doc.position_at(11), Position::new(1, 5));
        assert_eq!(doc.position_at(12), Position::new(2, 0));
    }

    #[test]
    fn offset_at_multi_line() {
        let doc = TextDocument::new("hello\nworld".to_string());
        assert_eq!(doc.offset_at(Position::new(0, 0)), Ok(0));
        assert_eq!(doc.offset_at(Position::new(0, 5)), Ok(5));
        assert_eq!(doc.offset_at(Position::new(1, 0)), Ok(6));
        assert_eq!(doc.offset_at(Position::new(1, 5)), Ok(11));
    }

    #[test]
    fn crlf_lines() {
        let doc = TextDocument::new("ab\r\ncd".to_string());
        assert_eq!(doc.offset_at(Position::new(0, 2)), Ok(2));
        assert_eq!(doc.offset_at(Position::new(1, 1)), Ok(5));
        assert_eq!(doc.position_at(4), Position::new(1, 0));
        assert_eq!(doc.line_delimiter(0), Ok(Some("\r\n")));
        assert_eq!(doc.line_delimiter(1), Ok(None));
        assert_eq!(doc.default_line_delimiter(), "\r\n");
    }

    #[test]
    fn utf16_handling() {
        // U+1F600 is 4 bytes in UTF-8 but 2 code units in UTF-16
        let doc = TextDocument::new("a\u{1F600}b".to_string());
        assert_eq!(doc.position_at(1), Position::new(0, 1));
        assert_eq!(doc.position_at(5), Position::new(0, 3));
        assert_eq!(doc.offset_at(Position::new(0, 3)), Ok(5));
    }

    #[test]
    fn out_of_bounds() {
        let doc = TextDocument::new("hello".to_string());
        assert_eq!(
            doc.offset_at(Position::new(5, 0)),
            Err(DocumentError::BadLocation {
                line: 5,
                character: 0
            })
        );
        assert!(doc.offset_at(Position::new(0, 6)).is_err());
        assert!(doc.line_delimiter(3).is_err());
    }

    #[test]
    fn default_delimiter_without_breaks() {
        let doc = TextDocument::new("<a/>".to_string());
        assert_eq!(doc.default_line_delimiter(), "\n");
    }

    #[test]
    fn span_to_range() {
        let doc = TextDocument::new("hello\nworld".to_string());
        let range = doc.span_to_range(&(6..11));
        assert_eq!(range.start, Position::new(1, 0));
        assert_eq!(range.end, Position::new(1, 5));
    }
}
