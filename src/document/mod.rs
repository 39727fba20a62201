//! Document state management and text utilities.
//!
//! This module provides:
//! - `TextDocument` for byte offset <-> LSP position conversion
//! - `DocumentState` and `DocumentStore` for document lifecycle management

mod state;
mod text;

pub use state::{DocumentState, DocumentStore};
pub use text::{detect_line_delimiter, TextDocument, DEFAULT_LINE_DELIMITER};
