//! Server state: options at startup, one workspace after `initialize`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::Url;

use tsls_backend::{bundled_libraries, BackendFactory};
use tsls_project::plugins::ApplyProxy;
use tsls_project::{PluginLoader, PluginSettings, PluginSupport, ProjectManager};
use tsls_vfs::{FileSystemUpdater, InMemoryFileSystem, RemoteFileSystem};

use crate::handlers::diagnostics::DiagnosticsPublisher;

/// LSP `ServerNotInitialized`.
const SERVER_NOT_INITIALIZED: i64 = -32002;

#[derive(Clone)]
pub struct ServerOptions {
    /// Remote-FS mode: workspace content comes from the client.
    pub strict: bool,
    pub factory: Arc<dyn BackendFactory>,
    /// Hook that wraps the language service around resolved plugins.
    pub apply_plugin: Option<Arc<ApplyProxy>>,
}

/// Initialization options the client may pass with `initialize`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializationOptions {
    /// Inline tsconfig used instead of discovery for the root project.
    pub configuration: Option<Value>,
    #[serde(flatten)]
    pub plugins: PluginSettings,
}

/// Everything tied to one initialized workspace root.
pub struct Workspace {
    pub root: Url,
    pub fs: Arc<InMemoryFileSystem>,
    pub updater: Arc<FileSystemUpdater>,
    pub manager: Arc<ProjectManager>,
    pub publisher: DiagnosticsPublisher,
}

pub struct ServerState {
    pub options: ServerOptions,
    workspace: RwLock<Option<Arc<Workspace>>>,
}

impl ServerState {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            workspace: RwLock::new(None),
        }
    }

    /// Builds the workspace; called once from the `initialize` handler.
    pub fn initialize(
        &self,
        root: Url,
        remote: Arc<dyn RemoteFileSystem>,
        init: InitializationOptions,
    ) -> Arc<Workspace> {
        let libraries = Arc::new(bundled_libraries());
        let fs = Arc::new(InMemoryFileSystem::new(root.clone(), libraries));
        let updater = Arc::new(FileSystemUpdater::new(Arc::clone(&fs), remote));
        let plugins = self.options.apply_plugin.as_ref().map(|apply| PluginSupport {
            loader: Arc::new(PluginLoader::new(root.clone(), init.plugins.clone())),
            apply: Arc::clone(apply),
        });
        let manager = ProjectManager::new(
            root.clone(),
            Arc::clone(&fs),
            Arc::clone(&updater),
            Arc::clone(&self.options.factory),
            plugins,
            init.configuration,
        );
        let workspace = Arc::new(Workspace {
            root,
            fs,
            updater,
            manager,
            publisher: DiagnosticsPublisher::new(),
        });
        *self.workspace.write() = Some(Arc::clone(&workspace));
        workspace
    }

    /// The workspace, or the `ServerNotInitialized` JSON-RPC error.
    pub fn workspace(&self) -> jsonrpc::Result<Arc<Workspace>> {
        self.workspace.read().clone().ok_or_else(|| jsonrpc::Error {
            code: jsonrpc::ErrorCode::ServerError(SERVER_NOT_INITIALIZED),
            message: "server is not initialized".into(),
            data: None,
        })
    }

    /// Like [`Self::workspace`], for notification handlers that can only
    /// log the problem.
    pub fn workspace_opt(&self) -> Option<Arc<Workspace>> {
        self.workspace.read().clone()
    }
}
