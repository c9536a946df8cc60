//! The project manager: the gate to all compiler work.
//!
//! Handlers never touch the updater or a configuration directly. They
//! call the ensure level their request needs, and the manager pulls the
//! right slice of the workspace into the IMFS, partitions it, and routes
//! the request to the configuration that governs the file.
//!
//! Every ensure level is memoized as a shared future: concurrent callers
//! ride one underlying run, a failed run is forgotten so the next caller
//! retries, and a cancelled waiter stops waiting without aborting the run
//! for everyone else.

use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use tsls_backend::BackendFactory;
use tsls_vfs::{path, FileSystemUpdater, InMemoryFileSystem};

use crate::configuration::ProjectConfiguration;
use crate::files;
use crate::partition;
use crate::plugins::PluginSupport;
use crate::resolver::ReferencedFilesResolver;
use crate::{ProjectError, Result};

/// Transitive reference chains longer than this are cut off silently.
pub const MAX_REFERENCE_DEPTH: u32 = 30;

type SharedEnsure = Shared<BoxFuture<'static, Result<()>>>;

pub struct ProjectManager {
    root: Url,
    fs: Arc<InMemoryFileSystem>,
    updater: Arc<FileSystemUpdater>,
    factory: Arc<dyn BackendFactory>,
    plugins: Option<PluginSupport>,
    inline_config: Option<Value>,
    configs: RwLock<FxHashMap<String, Arc<ProjectConfiguration>>>,
    resolver: ReferencedFilesResolver,
    structure: Mutex<Option<SharedEnsure>>,
    workspace_symbol: Mutex<Option<SharedEnsure>>,
    all_files: Mutex<Option<SharedEnsure>>,
    hover: Mutex<FxHashMap<Url, SharedEnsure>>,
    shutdown: CancellationToken,
}

impl ProjectManager {
    pub fn new(
        root: Url,
        fs: Arc<InMemoryFileSystem>,
        updater: Arc<FileSystemUpdater>,
        factory: Arc<dyn BackendFactory>,
        plugins: Option<PluginSupport>,
        inline_config: Option<Value>,
    ) -> Arc<Self> {
        Arc::new(Self {
            root: path::normalize(&root),
            fs,
            updater,
            factory,
            plugins,
            inline_config,
            configs: RwLock::new(FxHashMap::default()),
            resolver: ReferencedFilesResolver::new(),
            structure: Mutex::new(None),
            workspace_symbol: Mutex::new(None),
            all_files: Mutex::new(None),
            hover: Mutex::new(FxHashMap::default()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn fs(&self) -> &Arc<InMemoryFileSystem> {
        &self.fs
    }

    pub fn updater(&self) -> &Arc<FileSystemUpdater> {
        &self.updater
    }

    /// All configurations, deepest root first.
    pub fn configurations(&self) -> Vec<Arc<ProjectConfiguration>> {
        let configs = self.configs.read();
        let mut keyed: Vec<_> = configs.iter().collect();
        keyed.sort_by(|a, b| {
            let depth_a = a.0.matches('/').count();
            let depth_b = b.0.matches('/').count();
            depth_b.cmp(&depth_a).then_with(|| a.0.cmp(b.0))
        });
        keyed.into_iter().map(|(_, config)| Arc::clone(config)).collect()
    }

    /// The configuration whose directory is the deepest proper prefix of
    /// the URI, with the workspace-root fallback behind it.
    pub fn configuration_for(&self, uri: &Url) -> Result<Arc<ProjectConfiguration>> {
        let configs = self.configs.read();
        if configs.is_empty() {
            return Err(ProjectError::NoConfiguration(uri.clone()));
        }
        let mut dir = path::dirname(uri);
        loop {
            if let Ok(key) = path::uri_to_path(&dir) {
                if let Some(config) = configs.get(&key) {
                    return Ok(Arc::clone(config));
                }
            }
            let parent = path::dirname(&dir);
            if parent.path() == dir.path() {
                break;
            }
            dir = parent;
        }
        path::uri_to_path(&self.root)
            .ok()
            .and_then(|root_key| configs.get(&root_key).cloned())
            .ok_or_else(|| ProjectError::NoConfiguration(uri.clone()))
    }

    fn check(&self, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() || self.shutdown.is_cancelled() {
            return Err(ProjectError::Cancelled);
        }
        Ok(())
    }

    async fn guard<F>(&self, token: &CancellationToken, work: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        self.check(token)?;
        tokio::select! {
            () = token.cancelled() => Err(ProjectError::Cancelled),
            () = self.shutdown.cancelled() => Err(ProjectError::Cancelled),
            result = work => result,
        }
    }

    // ------------------------------------------------------------------
    // Ensure levels
    // ------------------------------------------------------------------

    /// Workspace structure, configuration/package/global-declaration file
    /// contents, and a fresh configuration arena. Single-flight.
    pub async fn ensure_module_structure(
        self: &Arc<Self>,
        token: &CancellationToken,
    ) -> Result<()> {
        let this = Arc::clone(self);
        self.guard(token, async move { this.structure_result().await })
            .await
    }

    /// Everything a workspace-wide symbol query needs: every JS/TS,
    /// config and package file outside `node_modules/`.
    pub async fn ensure_files_for_workspace_symbol(
        self: &Arc<Self>,
        token: &CancellationToken,
    ) -> Result<()> {
        let this = Arc::clone(self);
        self.guard(token, async move { this.workspace_symbol_result().await })
            .await
    }

    /// Every JS/TS file, dependencies included.
    pub async fn ensure_all_files(self: &Arc<Self>, token: &CancellationToken) -> Result<()> {
        let this = Arc::clone(self);
        self.guard(token, async move { this.all_files_result().await })
            .await
    }

    /// References inside a dependency only need the symbol-scope set;
    /// references to project code require the full project.
    pub async fn ensure_files_for_references(
        self: &Arc<Self>,
        uri: &Url,
        token: &CancellationToken,
    ) -> Result<()> {
        if files::is_dependency_file(uri) {
            self.ensure_files_for_workspace_symbol(token).await
        } else {
            self.ensure_all_files(token).await
        }
    }

    /// The file itself, its transitive references, and an initialized
    /// configuration with the basic declaration files registered.
    pub async fn ensure_files_for_hover(
        self: &Arc<Self>,
        uri: &Url,
        token: &CancellationToken,
    ) -> Result<()> {
        let this = Arc::clone(self);
        let uri = path::normalize(uri);
        self.guard(token, async move { this.hover_result(uri).await })
            .await
    }

    /// Fetches the file and its reference closure up to `max_depth`.
    /// Individual failures are logged and skipped.
    pub async fn ensure_referenced_files(
        self: &Arc<Self>,
        uri: &Url,
        max_depth: u32,
        token: &CancellationToken,
    ) -> Result<()> {
        let this = Arc::clone(self);
        let uri = path::normalize(uri);
        self.guard(token, async move {
            this.reference_closure(uri, max_depth).await;
            Ok(())
        })
        .await
    }

    fn structure_shared(self: &Arc<Self>) -> SharedEnsure {
        let mut cell = self.structure.lock();
        if let Some(shared) = cell.as_ref() {
            return shared.clone();
        }
        let manager = Arc::clone(self);
        let shared = async move {
            manager.updater.ensure_structure().await?;
            let metadata: Vec<Url> = manager
                .fs
                .uris()
                .into_iter()
                .filter(|uri| {
                    files::is_config_file(uri)
                        || files::is_package_json(uri)
                        || files::is_global_declaration(uri)
                })
                .collect();
            fetch_all(&manager.updater, metadata).await;
            manager.create_configurations();
            for config in manager.configurations() {
                config.reset();
            }
            manager.resolver.invalidate(None);
            debug!("module structure ensured");
            Ok(())
        }
        .boxed()
        .shared();
        *cell = Some(shared.clone());
        shared
    }

    async fn structure_result(self: &Arc<Self>) -> Result<()> {
        let shared = self.structure_shared();
        let result = shared.await;
        if result.is_err() {
            *self.structure.lock() = None;
        }
        result
    }

    fn workspace_symbol_shared(self: &Arc<Self>) -> SharedEnsure {
        let mut cell = self.workspace_symbol.lock();
        if let Some(shared) = cell.as_ref() {
            return shared.clone();
        }
        let manager = Arc::clone(self);
        let shared = async move {
            manager.structure_result().await?;
            let wanted: Vec<Url> = manager
                .fs
                .uris()
                .into_iter()
                .filter(|uri| !files::is_dependency_file(uri))
                .filter(|uri| {
                    files::is_js_ts_file(uri)
                        || files::is_config_file(uri)
                        || files::is_package_json(uri)
                })
                .collect();
            fetch_all(&manager.updater, wanted).await;
            manager.create_configurations();
            Ok(())
        }
        .boxed()
        .shared();
        *cell = Some(shared.clone());
        shared
    }

    async fn workspace_symbol_result(self: &Arc<Self>) -> Result<()> {
        let shared = self.workspace_symbol_shared();
        let result = shared.await;
        if result.is_err() {
            *self.workspace_symbol.lock() = None;
        }
        result
    }

    fn all_files_shared(self: &Arc<Self>) -> SharedEnsure {
        let mut cell = self.all_files.lock();
        if let Some(shared) = cell.as_ref() {
            return shared.clone();
        }
        let manager = Arc::clone(self);
        let shared = async move {
            manager.structure_result().await?;
            let wanted: Vec<Url> = manager
                .fs
                .uris()
                .into_iter()
                .filter(|uri| {
                    files::is_js_ts_file(uri)
                        || files::is_config_file(uri)
                        || files::is_package_json(uri)
                })
                .collect();
            fetch_all(&manager.updater, wanted).await;
            manager.create_configurations();
            Ok(())
        }
        .boxed()
        .shared();
        *cell = Some(shared.clone());
        shared
    }

    async fn all_files_result(self: &Arc<Self>) -> Result<()> {
        let shared = self.all_files_shared();
        let result = shared.await;
        if result.is_err() {
            *self.all_files.lock() = None;
        }
        result
    }

    fn hover_shared(self: &Arc<Self>, uri: Url) -> SharedEnsure {
        let mut cell = self.hover.lock();
        if let Some(shared) = cell.get(&uri) {
            return shared.clone();
        }
        let manager = Arc::clone(self);
        let target = uri.clone();
        let shared = async move {
            manager.structure_result().await?;
            let closure = manager
                .reference_closure(target.clone(), MAX_REFERENCE_DEPTH)
                .await;
            let config = manager.configuration_for(&target)?;
            config.ensure_basic_files()?;
            for file in &closure {
                config.add_file(file)?;
            }
            Ok(())
        }
        .boxed()
        .shared();
        cell.insert(uri, shared.clone());
        shared
    }

    async fn hover_result(self: &Arc<Self>, uri: Url) -> Result<()> {
        let shared = self.hover_shared(uri.clone());
        let result = shared.await;
        if result.is_err() {
            self.hover.lock().remove(&uri);
        }
        result
    }

    /// Breadth-first walk over the reference graph. Returns every URI it
    /// visited, the start included.
    async fn reference_closure(self: &Arc<Self>, start: Url, max_depth: u32) -> FxHashSet<Url> {
        let mut seen = FxHashSet::default();
        seen.insert(start.clone());
        let mut queue = vec![(start, 0u32)];
        while let Some((uri, depth)) = queue.pop() {
            if let Err(error) = self.updater.ensure(&uri).await {
                warn!("failed to ensure {uri}: {error}");
                continue;
            }
            if depth >= max_depth {
                continue;
            }
            let Ok(config) = self.configuration_for(&uri) else {
                continue;
            };
            match self.resolver.referenced_files(&self.fs, &config, &uri) {
                Ok(references) => {
                    for target in references.iter() {
                        if seen.insert(target.clone()) {
                            queue.push((target.clone(), depth + 1));
                        }
                    }
                }
                Err(error) => debug!("could not resolve references of {uri}: {error}"),
            }
        }
        seen
    }

    // ------------------------------------------------------------------
    // Partitioning
    // ------------------------------------------------------------------

    fn create_configurations(&self) {
        let found = partition::config_file_directories(&self.fs);
        let mut configs = self.configs.write();
        for (key, config_uri) in found {
            let root = path::dirname(&config_uri);
            configs.entry(key).or_insert_with(|| {
                Arc::new(ProjectConfiguration::new(
                    Arc::clone(&self.fs),
                    Arc::clone(&self.factory),
                    self.plugins.clone(),
                    root,
                    Some(config_uri),
                    None,
                ))
            });
        }
        if configs.is_empty() {
            if let Ok(root_key) = path::uri_to_path(&self.root) {
                configs.insert(
                    root_key,
                    Arc::new(ProjectConfiguration::new(
                        Arc::clone(&self.fs),
                        Arc::clone(&self.factory),
                        self.plugins.clone(),
                        self.root.clone(),
                        None,
                        self.inline_config.clone(),
                    )),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Document synchronization
    // ------------------------------------------------------------------

    pub fn did_open(&self, uri: &Url, text: &str) -> Result<()> {
        let uri = path::normalize(uri);
        self.fs.did_open(&uri, text);
        self.resolver.invalidate(Some(&uri));
        self.hover.lock().remove(&uri);
        let config = self.configuration_for(&uri)?;
        config.init()?;
        config.add_file(&uri)?;
        config.inc_project_version();
        Ok(())
    }

    pub fn did_change(&self, uri: &Url, text: &str) -> Result<()> {
        let uri = path::normalize(uri);
        self.fs.did_change(&uri, text);
        self.resolver.invalidate(Some(&uri));
        self.hover.lock().remove(&uri);
        if files::is_config_file(&uri) || files::is_package_json(&uri) {
            self.invalidate_module_structure();
        }
        let config = self.configuration_for(&uri)?;
        config.inc_project_version();
        Ok(())
    }

    pub fn did_save(&self, uri: &Url) {
        self.fs.did_save(&path::normalize(uri));
    }

    pub fn did_close(&self, uri: &Url) -> Result<()> {
        let uri = path::normalize(uri);
        self.fs.did_close(&uri);
        self.resolver.invalidate(Some(&uri));
        self.hover.lock().remove(&uri);
        let config = self.configuration_for(&uri)?;
        config.inc_project_version();
        Ok(())
    }

    /// Forgets every memoized ensure so structure is rebuilt on demand.
    pub fn invalidate_module_structure(&self) {
        *self.structure.lock() = None;
        *self.workspace_symbol.lock() = None;
        *self.all_files.lock() = None;
        self.hover.lock().clear();
        self.updater.invalidate_structure();
    }

    /// Cancels every outstanding ensure and forgets the memos.
    pub fn dispose(&self) {
        self.shutdown.cancel();
        self.invalidate_module_structure();
    }
}

async fn fetch_all(updater: &FileSystemUpdater, uris: Vec<Url>) {
    let results = futures::future::join_all(uris.iter().map(|uri| updater.ensure(uri))).await;
    for (uri, result) in uris.iter().zip(results) {
        if let Err(error) = result {
            warn!("failed to fetch {uri}: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tsls_backend::testing::{Script, ScriptedBackendFactory};
    use tsls_vfs::{FileSystemError, LibrarySet, RemoteFileSystem};

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    struct MapRemote {
        files: FxHashMap<Url, String>,
        listings: AtomicUsize,
        reads: AtomicUsize,
    }

    impl MapRemote {
        fn new(files: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                files: files
                    .iter()
                    .map(|(path, text)| (uri(path), (*text).to_string()))
                    .collect(),
                listings: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteFileSystem for MapRemote {
        async fn read_file(&self, uri: &Url) -> tsls_vfs::Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(uri)
                .cloned()
                .ok_or_else(|| FileSystemError::Remote(format!("no such file {uri}")))
        }

        async fn workspace_files(&self, _base: Option<&Url>) -> tsls_vfs::Result<Vec<Url>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            Ok(self.files.keys().cloned().collect())
        }
    }

    fn manager_over(files: &[(&str, &str)]) -> (Arc<ProjectManager>, Arc<MapRemote>) {
        let fs = Arc::new(InMemoryFileSystem::new(
            uri("file:///work"),
            Arc::new(LibrarySet::new("5.4.5")),
        ));
        let remote = MapRemote::new(files);
        let updater = Arc::new(FileSystemUpdater::new(
            Arc::clone(&fs),
            Arc::clone(&remote) as Arc<dyn RemoteFileSystem>,
        ));
        let manager = ProjectManager::new(
            uri("file:///work"),
            fs,
            updater,
            Arc::new(ScriptedBackendFactory::new(Script::default())),
            None,
            None,
        );
        (manager, remote)
    }

    #[tokio::test]
    async fn module_structure_creates_configurations_and_is_single_flight() {
        let (manager, remote) = manager_over(&[
            ("file:///work/tsconfig.json", "{}"),
            ("file:///work/packages/app/tsconfig.json", "{}"),
            ("file:///work/packages/app/src/main.ts", "const x = 1;"),
            ("file:///work/package.json", r#"{"name": "root"}"#),
        ]);
        let token = CancellationToken::new();
        manager.ensure_module_structure(&token).await.unwrap();
        manager.ensure_module_structure(&token).await.unwrap();
        assert_eq!(remote.listings.load(Ordering::SeqCst), 1);

        // Config and package files have content, plain sources do not.
        assert!(manager.fs().has_content(&uri("file:///work/tsconfig.json")));
        assert!(manager.fs().has_content(&uri("file:///work/package.json")));
        assert!(!manager
            .fs()
            .has_content(&uri("file:///work/packages/app/src/main.ts")));

        assert_eq!(manager.configurations().len(), 2);
    }

    #[tokio::test]
    async fn configuration_routing_prefers_the_deepest_prefix() {
        let (manager, _remote) = manager_over(&[
            ("file:///work/tsconfig.json", "{}"),
            ("file:///work/packages/app/tsconfig.json", "{}"),
        ]);
        let token = CancellationToken::new();
        manager.ensure_module_structure(&token).await.unwrap();

        let nested = manager
            .configuration_for(&uri("file:///work/packages/app/src/deep/a.ts"))
            .unwrap();
        assert_eq!(nested.root(), &uri("file:///work/packages/app"));

        let top = manager
            .configuration_for(&uri("file:///work/other/b.ts"))
            .unwrap();
        assert_eq!(top.root(), &uri("file:///work"));

        // Two paths below the same directory share one instance.
        let sibling = manager
            .configuration_for(&uri("file:///work/packages/app/src/other.ts"))
            .unwrap();
        assert!(Arc::ptr_eq(&nested, &sibling));
    }

    #[tokio::test]
    async fn a_workspace_without_configs_gets_the_root_fallback() {
        let (manager, _remote) = manager_over(&[("file:///work/app.js", "var x = 1;")]);
        let token = CancellationToken::new();
        manager.ensure_module_structure(&token).await.unwrap();
        let config = manager
            .configuration_for(&uri("file:///work/app.js"))
            .unwrap();
        assert_eq!(config.root(), &uri("file:///work"));
        assert!(config.config_uri().is_none());
    }

    #[tokio::test]
    async fn workspace_symbol_scope_skips_dependencies_and_all_files_does_not() {
        let (manager, _remote) = manager_over(&[
            ("file:///work/tsconfig.json", "{}"),
            ("file:///work/src/a.ts", "const a = 1;"),
            ("file:///work/node_modules/dep/index.ts", "export const d = 1;"),
        ]);
        let token = CancellationToken::new();
        manager
            .ensure_files_for_workspace_symbol(&token)
            .await
            .unwrap();
        assert!(manager.fs().has_content(&uri("file:///work/src/a.ts")));
        assert!(!manager
            .fs()
            .has_content(&uri("file:///work/node_modules/dep/index.ts")));

        manager.ensure_all_files(&token).await.unwrap();
        assert!(manager
            .fs()
            .has_content(&uri("file:///work/node_modules/dep/index.ts")));
    }

    #[tokio::test]
    async fn hover_scope_pulls_the_reference_closure() {
        let (manager, _remote) = manager_over(&[
            ("file:///work/tsconfig.json", "{}"),
            ("file:///work/src/c.ts", "import {Foo} from './b';"),
            ("file:///work/src/b.ts", "import './a';\nexport class Foo {}"),
            ("file:///work/src/a.ts", "import './b';"),
        ]);
        let token = CancellationToken::new();
        manager
            .ensure_files_for_hover(&uri("file:///work/src/c.ts"), &token)
            .await
            .unwrap();
        for file in ["c.ts", "b.ts", "a.ts"] {
            let target = uri(&format!("file:///work/src/{file}"));
            assert!(manager.fs().has_content(&target), "{file} should be ensured");
        }
        let config = manager
            .configuration_for(&uri("file:///work/src/c.ts"))
            .unwrap();
        let program = config.service().unwrap().program_files();
        assert!(program.contains(&uri("file:///work/src/b.ts")));
    }

    #[tokio::test]
    async fn cancelled_tokens_short_circuit() {
        let (manager, remote) = manager_over(&[("file:///work/a.ts", "")]);
        let token = CancellationToken::new();
        token.cancel();
        let result = manager.ensure_module_structure(&token).await;
        assert!(matches!(result, Err(ProjectError::Cancelled)));
        assert_eq!(remote.listings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispose_cancels_later_ensures() {
        let (manager, _remote) = manager_over(&[("file:///work/a.ts", "")]);
        manager.dispose();
        let token = CancellationToken::new();
        let result = manager.ensure_module_structure(&token).await;
        assert!(matches!(result, Err(ProjectError::Cancelled)));
    }

    #[tokio::test]
    async fn document_sync_updates_overlay_and_versions() {
        let (manager, _remote) = manager_over(&[
            ("file:///work/tsconfig.json", "{}"),
            ("file:///work/src/a.ts", "const a = 1;"),
        ]);
        let token = CancellationToken::new();
        manager.ensure_module_structure(&token).await.unwrap();
        let a = uri("file:///work/src/a.ts");

        manager.did_open(&a, "const a = 2;").unwrap();
        assert_eq!(&*manager.fs().get_content(&a).unwrap(), "const a = 2;");
        let open_version = manager.fs().version(&a);

        manager.did_change(&a, "const a = 3;").unwrap();
        assert!(manager.fs().version(&a) > open_version);
        manager.did_save(&a);
        manager.did_close(&a).unwrap();
        // After close, the last saved content wins.
        assert_eq!(&*manager.fs().get_content(&a).unwrap(), "const a = 3;");
    }

    #[tokio::test]
    async fn config_file_edits_invalidate_the_structure_memo() {
        let (manager, remote) = manager_over(&[("file:///work/tsconfig.json", "{}")]);
        let token = CancellationToken::new();
        manager.ensure_module_structure(&token).await.unwrap();
        manager
            .did_change(&uri("file:///work/tsconfig.json"), "{\"include\": []}")
            .unwrap();
        manager.ensure_module_structure(&token).await.unwrap();
        assert_eq!(remote.listings.load(Ordering::SeqCst), 2);
    }
}
