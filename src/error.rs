//! Errors raised while mapping editor coordinates onto a document.

use thiserror::Error;

/// The only failure recognized at this layer: a position that does not
/// exist in the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("bad location: line {line}, character {character} is outside the document")]
    BadLocation { line: u32, character: u32 },
}
