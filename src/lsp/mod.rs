//! LSP protocol feature implementations.
//!
//! This module provides implementations for LSP features:
//! - Position-based feature requests resolving the node under the cursor
//! - Hover information for elements and attributes
//! - Structural formatting of whole documents and ranges

mod builder;
mod formatting;
mod hover;
mod request;

pub use builder::XmlBuilder;
pub use formatting::{format, format_document};
pub use hover::hover_at_position;
pub use request::{find_node_at, HoverRequest};
