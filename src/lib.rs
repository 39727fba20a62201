//! XML Language Server implementation.

use std::sync::OnceLock;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{self, *};
use tower_lsp::{Client, LanguageServer, LspService};
use tracing::{debug, info};

mod document;
mod dom;
mod error;
mod lsp;
pub(crate) mod settings;

pub use document::{DocumentState, DocumentStore, TextDocument};
pub use dom::{
    parse, Attribute, CharacterData, Comment, DocumentType, Element, Node, NodeId, NodeKind,
    ProcessingInstruction, Prolog, XmlDocument,
};
pub use error::DocumentError;
pub use lsp::{find_node_at, format, format_document, hover_at_position, HoverRequest, XmlBuilder};
pub use settings::{discover_settings, load_settings, FormattingOptions, HoverSettings, Settings};

pub struct Backend {
    client: Client,
    documents: DocumentStore,
    formatting: OnceLock<FormattingOptions>,
    hover_settings: OnceLock<HoverSettings>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            formatting: OnceLock::new(),
            hover_settings: OnceLock::new(),
        }
    }

    /// Formatting options for a request: workspace settings overlaid with the
    /// request's own options.
    fn formatting_options(&self, request: &lsp_types::FormattingOptions) -> FormattingOptions {
        self.formatting
            .get()
            .cloned()
            .unwrap_or_default()
            .with_request_options(request)
    }

    fn format_edits(
        &self,
        uri: &Url,
        range: Option<Range>,
        options: &lsp_types::FormattingOptions,
    ) -> Option<Vec<TextEdit>> {
        let Some(doc) = self.documents.get(uri) else {
            debug!(%uri, "format requested for unknown document");
            return None;
        };
        let edits = lsp::format(&doc.text_document, range, &self.formatting_options(options));
        Some(edits)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let _ = self
            .hover_settings
            .set(HoverSettings::from_client_capabilities(&params.capabilities));

        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            let (settings, settings_dir) = settings::discover_settings(&root);
            info!(dir = %settings_dir.display(), "workspace settings loaded");
            let _ = self.formatting.set(settings.format.unwrap_or_default());
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_range_formatting_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "xmlsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "XML language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.documents.open(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so the last change carries the full text
        if let Some(change) = params.content_changes.into_iter().last() {
            self.documents.open(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            );
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(doc) = self.documents.get(uri) else {
            return Ok(None);
        };

        Ok(lsp::hover_at_position(
            &doc,
            position,
            self.hover_settings.get(),
        ))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        Ok(self.format_edits(&params.text_document.uri, None, &params.options))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        Ok(self.format_edits(
            &params.text_document.uri,
            Some(params.range),
            &params.options,
        ))
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_can_be_created() {
        let (_service, _socket) = create_service();
    }
}
