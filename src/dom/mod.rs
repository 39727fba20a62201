//! Tolerant XML document object model.
//!
//! - `XmlDocument`, `NodeId` and the node variants in `node`
//! - `parse`, the tolerant tree builder

mod node;
mod parser;

pub use node::{
    Attribute, CharacterData, Comment, DocumentType, Element, Node, NodeId, NodeKind,
    ProcessingInstruction, Prolog, XmlDocument,
};
pub use parser::parse;
