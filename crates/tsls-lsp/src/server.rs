//! The tower-lsp service: one instance per connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};
use tracing::{info, warn};

use tsls_vfs::{LocalFileSystem, RemoteFileSystem};

use crate::ext::{
    DependencyReference, PackageInformation, ReferenceInformation, SymbolLocationInformation,
    WorkspaceReferencesParams, WorkspaceSymbolQuery,
};
use crate::handlers;
use crate::remote::ClientFileSystem;
use crate::state::{InitializationOptions, ServerOptions, ServerState};

pub struct TsLanguageServer {
    client: Client,
    state: Arc<ServerState>,
}

fn invalid_params(message: impl Into<String>) -> tower_lsp::jsonrpc::Error {
    tower_lsp::jsonrpc::Error {
        code: tower_lsp::jsonrpc::ErrorCode::InvalidParams,
        message: message.into().into(),
        data: None,
    }
}

impl TsLanguageServer {
    pub fn new(client: Client, options: ServerOptions) -> Self {
        Self {
            client,
            state: Arc::new(ServerState::new(options)),
        }
    }

    /// Builds the routed service with the cross-repository extension
    /// methods registered beside the standard ones.
    pub fn service(options: ServerOptions) -> (LspService<Self>, tower_lsp::ClientSocket) {
        LspService::build(move |client| Self::new(client, options.clone()))
            .custom_method("textDocument/xdefinition", Self::x_definition)
            .custom_method("workspace/xreferences", Self::x_references)
            .custom_method("workspace/xdependencies", Self::x_dependencies)
            .custom_method("workspace/xpackages", Self::x_packages)
            .custom_method("workspace/xsymbol", Self::x_symbol)
            .finish()
    }

    async fn x_definition(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Vec<SymbolLocationInformation>> {
        handlers::features::x_definition(
            &self.state,
            params.text_document.uri,
            params.position,
        )
        .await
    }

    async fn x_references(
        &self,
        params: WorkspaceReferencesParams,
    ) -> Result<Vec<ReferenceInformation>> {
        handlers::workspace::x_references(&self.state, params).await
    }

    async fn x_dependencies(&self) -> Result<Vec<DependencyReference>> {
        handlers::workspace::x_dependencies(&self.state).await
    }

    async fn x_packages(&self) -> Result<Vec<PackageInformation>> {
        handlers::workspace::x_packages(&self.state).await
    }

    async fn x_symbol(&self, params: WorkspaceSymbolQuery) -> Result<Vec<SymbolInformation>> {
        handlers::workspace::symbol_query(&self.state, params).await
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for TsLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let root = params
            .root_uri
            .clone()
            .or_else(|| {
                params
                    .workspace_folders
                    .as_ref()
                    .and_then(|folders| folders.first())
                    .map(|folder| folder.uri.clone())
            })
            .ok_or_else(|| invalid_params("initialize requires a workspace root URI"))?;
        info!("initializing workspace {root}");

        let init: InitializationOptions = params
            .initialization_options
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        let remote: Arc<dyn RemoteFileSystem> = if self.state.options.strict {
            Arc::new(ClientFileSystem::new(self.client.clone()))
        } else {
            Arc::new(LocalFileSystem::new(&root).map_err(|err| {
                warn!("cannot serve {root} from disk: {err}");
                invalid_params(err.to_string())
            })?)
        };

        let workspace = self.state.initialize(root, remote, init);

        // Module structure is warmed in the background; requests that
        // arrive earlier run the same single-flight ensure themselves.
        let manager = Arc::clone(&workspace.manager);
        tokio::spawn(async move {
            let token = CancellationToken::new();
            if let Err(err) = manager.ensure_module_structure(&token).await {
                warn!("background structure ensure failed: {err}");
            }
        });

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        ".".to_string(),
                        "\"".to_string(),
                        "'".to_string(),
                        "/".to_string(),
                    ]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "tsls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!("client finished initialization");
    }

    async fn shutdown(&self) -> Result<()> {
        info!("shutting down");
        if let Some(workspace) = self.state.workspace_opt() {
            workspace.manager.dispose();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handlers::sync::did_open(&self.client, &self.state, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handlers::sync::did_change(&self.client, &self.state, params).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        handlers::sync::did_save(&self.client, &self.state, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handlers::sync::did_close(&self.client, &self.state, params).await;
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        handlers::features::goto_definition(&self.state, params).await
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        handlers::features::hover(&self.state, params).await
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        handlers::features::references(&self.state, params).await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        handlers::features::document_symbol(&self.state, params).await
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        handlers::features::completion(&self.state, params).await
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        handlers::workspace::symbol(&self.state, params).await
    }
}
