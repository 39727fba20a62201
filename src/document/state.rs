//! Document state management for the XML LSP.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;
use tracing::debug;

use crate::dom::{parse, XmlDocument};

use super::text::TextDocument;

/// State for a single document version.
///
/// Built once per version and never mutated; a change produces a new state.
#[derive(Debug)]
pub struct DocumentState {
    /// Text with its line index for position conversion.
    pub text_document: TextDocument,
    /// The tolerant tree of the text.
    pub dom: XmlDocument,
    /// Document version from the client.
    pub version: i32,
}

impl DocumentState {
    /// Create a new document state by parsing the source.
    pub fn new(source: String, version: i32) -> Self {
        let dom = parse(&source);
        Self {
            text_document: TextDocument::new(source),
            dom,
            version,
        }
    }
}

/// Thread-safe storage for open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<DocumentState>>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open or replace a document with the given source text.
    pub fn open(&self, uri: Url, source: String, version: i32) -> Arc<DocumentState> {
        debug!(%uri, version, "document updated");
        let state = Arc::new(DocumentState::new(source, version));
        self.documents.insert(uri, Arc::clone(&state));
        state
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) {
        debug!(%uri, "document closed");
        self.documents.remove(uri);
    }

    /// Get a document's state.
    pub fn get(&self, uri: &Url) -> Option<Arc<DocumentState>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_replaces_previous_version() {
        let store = DocumentStore::new();
        let uri = Url::parse("file:///a.xml").unwrap();
        let first = store.open(uri.clone(), "<a/>".to_string(), 1);
        store.open(uri.clone(), "<b/>".to_string(), 2);

        let current = store.get(&uri).unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.dom.tag_name(current.dom.children(current.dom.root())[0]), Some("b"));
        // earlier snapshots stay readable
        assert_eq!(first.dom.tag_name(first.dom.children(first.dom.root())[0]), Some("a"));
    }

    #[test]
    fn close_removes_document() {
        let store = DocumentStore::new();
        let uri = Url::parse("file:///a.xml").unwrap();
        store.open(uri.clone(), "<a/>".to_string(), 1);
        store.close(&uri);
        assert!(store.get(&uri).is_none());
    }
}
