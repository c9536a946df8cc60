//! Per-sub-project configuration lifecycle.
//!
//! A configuration owns one backend instance and the file list it was
//! seeded with. Initialization is lazy and staged: `Uninit → Parsed →
//! BasicReady → AllReady`, each transition idempotent, and `reset`
//! returns to the start whenever the structure beneath the configuration
//! may have changed.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;
use url::Url;

use tsls_backend::{
    BackendFactory, CompilerOptions, LanguageService, LanguageServiceHost, PackageDescriptor,
};
use tsls_vfs::{path, InMemoryFileSystem};

use crate::files;
use crate::packages::PackageJson;
use crate::plugins::PluginSupport;
use crate::tsconfig;
use crate::{ProjectError, Result};

/// tsc's default excludes for `include`-driven file lists.
const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitState {
    Uninit,
    Parsed,
    BasicReady,
    AllReady,
}

struct ConfigState {
    init: InitState,
    options: CompilerOptions,
    expected_files: Vec<Url>,
    host: Option<Arc<ProjectHost>>,
    service: Option<Arc<dyn LanguageService>>,
    package: Option<PackageDescriptor>,
}

impl ConfigState {
    fn fresh() -> Self {
        Self {
            init: InitState::Uninit,
            options: CompilerOptions::default(),
            expected_files: Vec::new(),
            host: None,
            service: None,
            package: None,
        }
    }
}

pub struct ProjectConfiguration {
    fs: Arc<InMemoryFileSystem>,
    factory: Arc<dyn BackendFactory>,
    plugins: Option<PluginSupport>,
    /// Directory the configuration governs.
    root: Url,
    /// The config file; `None` for the synthetic workspace-root fallback.
    config_uri: Option<Url>,
    /// Inline configuration from initialization options, used instead of
    /// a config file when present.
    inline: Option<Value>,
    state: Mutex<ConfigState>,
}

impl ProjectConfiguration {
    pub fn new(
        fs: Arc<InMemoryFileSystem>,
        factory: Arc<dyn BackendFactory>,
        plugins: Option<PluginSupport>,
        root: Url,
        config_uri: Option<Url>,
        inline: Option<Value>,
    ) -> Self {
        Self {
            fs,
            factory,
            plugins,
            root,
            config_uri,
            inline,
            state: Mutex::new(ConfigState::fresh()),
        }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn config_uri(&self) -> Option<&Url> {
        self.config_uri.as_ref()
    }

    pub fn init_state(&self) -> InitState {
        self.state.lock().init
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        self.state.lock().options.clone()
    }

    pub fn expected_files(&self) -> Vec<Url> {
        self.state.lock().expected_files.clone()
    }

    /// The descriptor of the `package.json` beside the config, if any.
    pub fn package_descriptor(&self) -> Option<PackageDescriptor> {
        self.state.lock().package.clone()
    }

    pub fn package_name(&self) -> Option<String> {
        self.state.lock().package.as_ref().and_then(|p| p.name.clone())
    }

    /// Drops the backend, file list and init state.
    pub fn reset(&self) {
        *self.state.lock() = ConfigState::fresh();
    }

    /// Parses the configuration and seeds the expected file list.
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.init >= InitState::Parsed {
            return Ok(());
        }

        let parsed = self.parse_config()?;
        let mut options = parsed.compiler_options;
        if self
            .config_uri
            .as_ref()
            .is_some_and(|uri| path::basename(uri) == "jsconfig.json")
        {
            options.allow_js = Some(true);
        }

        let mut expected = self.expected_file_list(&parsed.files, &parsed.include, &parsed.exclude, &options);
        // Globally-scoped declaration files from dependencies join every
        // program regardless of include patterns.
        for uri in self.fs.uris() {
            if files::is_global_declaration(&uri)
                && path::relative_to(&self.root, &uri).is_some()
                && !expected.contains(&uri)
            {
                expected.push(uri);
            }
        }
        expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        expected.dedup();

        state.package = self.read_package();
        state.host = Some(Arc::new(ProjectHost::new(
            Arc::clone(&self.fs),
            self.root.clone(),
            options.clone(),
        )));
        state.options = options;
        state.expected_files = expected;
        state.init = InitState::Parsed;
        debug!(
            "initialized configuration at {} with {} expected files",
            self.root,
            state.expected_files.len()
        );
        Ok(())
    }

    fn parse_config(&self) -> Result<tsconfig::TsConfig> {
        if let Some(inline) = &self.inline {
            return tsconfig::from_value(inline).map_err(|message| ProjectError::ConfigParse {
                uri: self.root.clone(),
                message,
            });
        }
        let Some(config_uri) = &self.config_uri else {
            return Ok(tsconfig::TsConfig {
                compiler_options: CompilerOptions::common_js_defaults(),
                ..tsconfig::TsConfig::default()
            });
        };
        let text = self.fs.get_content(config_uri)?;
        tsconfig::parse(&text).map_err(|message| ProjectError::ConfigParse {
            uri: config_uri.clone(),
            message,
        })
    }

    fn expected_file_list(
        &self,
        explicit: &Option<Vec<String>>,
        include: &Option<Vec<String>>,
        exclude: &Option<Vec<String>>,
        options: &CompilerOptions,
    ) -> Vec<Url> {
        let mut expected = Vec::new();
        if let Some(files) = explicit {
            for file in files {
                if let Some(uri) = path::resolve(&dir_with_slash(&self.root), file) {
                    expected.push(uri);
                }
            }
        }
        if explicit.is_none() || include.is_some() {
            let mut extensions: Vec<&str> = vec![".ts", ".tsx", ".d.ts"];
            if options.allows_js() {
                extensions.extend([".js", ".jsx"]);
            }
            let excludes: Vec<String> = match exclude {
                Some(exclude) => exclude.clone(),
                None => DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            };
            let includes = include.clone().unwrap_or_default();
            let Ok(root_path) = path::uri_to_path(&self.root) else {
                return expected;
            };
            for found in self
                .fs
                .read_directory(&root_path, &extensions, &excludes, &includes)
            {
                if let Ok(uri) = path::path_to_uri(&found) {
                    expected.push(uri);
                }
            }
        }
        expected
    }

    fn read_package(&self) -> Option<PackageDescriptor> {
        let manifest = path::resolve(&dir_with_slash(&self.root), "package.json")?;
        let text = self.fs.get_content(&manifest).ok()?;
        PackageJson::parse(&text).map(|package| package.descriptor())
    }

    /// Registers the globally-visible declaration files with the host.
    pub fn ensure_basic_files(&self) -> Result<()> {
        self.init()?;
        let mut state = self.state.lock();
        if state.init >= InitState::BasicReady {
            return Ok(());
        }
        let host = state.host.clone().expect("host exists once parsed");
        let mut added = false;
        for uri in &state.expected_files {
            let global = files::is_global_declaration(uri);
            let local_declaration =
                files::is_declaration_file(uri) && !files::is_dependency_file(uri);
            if global || local_declaration {
                added |= host.add_file(uri.clone());
            }
        }
        if added {
            host.inc_project_version();
        }
        state.init = InitState::BasicReady;
        Ok(())
    }

    /// Registers every expected file with the host.
    pub fn ensure_all_files(&self) -> Result<()> {
        self.ensure_basic_files()?;
        let mut state = self.state.lock();
        if state.init >= InitState::AllReady {
            return Ok(());
        }
        let host = state.host.clone().expect("host exists once parsed");
        let mut added = false;
        for uri in &state.expected_files {
            added |= host.add_file(uri.clone());
        }
        if added {
            host.inc_project_version();
        }
        state.init = InitState::AllReady;
        Ok(())
    }

    /// Adds a single file (plus-version) outside the staged transitions;
    /// used for opened documents and their reference closures.
    pub fn add_file(&self, uri: &Url) -> Result<()> {
        self.init()?;
        let state = self.state.lock();
        let host = state.host.clone().expect("host exists once parsed");
        if host.add_file(uri.clone()) {
            host.inc_project_version();
        }
        Ok(())
    }

    pub fn inc_project_version(&self) {
        if let Some(host) = self.state.lock().host.clone() {
            host.inc_project_version();
        }
    }

    /// The backend service, created on first use.
    pub fn service(&self) -> Result<Arc<dyn LanguageService>> {
        self.init()?;
        let mut state = self.state.lock();
        if let Some(service) = &state.service {
            return Ok(Arc::clone(service));
        }
        let host: Arc<dyn LanguageServiceHost> =
            state.host.clone().expect("host exists once parsed");
        let mut service = self.factory.create(host)?;
        if let Some(plugins) = &self.plugins {
            service = plugins.loader.wrap(service, plugins.apply.as_ref());
        }
        state.service = Some(Arc::clone(&service));
        Ok(service)
    }

    /// True when this configuration's directory is a prefix of the URI.
    pub fn governs(&self, uri: &Url) -> bool {
        path::relative_to(&self.root, uri).is_some()
    }
}

fn dir_with_slash(uri: &Url) -> Url {
    if uri.path().ends_with('/') {
        return uri.clone();
    }
    let mut out = uri.clone();
    let new_path = format!("{}/", uri.path());
    out.set_path(&new_path);
    out
}

/// The compiler host for one configuration, answering from the IMFS.
pub struct ProjectHost {
    fs: Arc<InMemoryFileSystem>,
    root: Url,
    options: CompilerOptions,
    script_files: RwLock<IndexSet<Url>>,
    project_version: AtomicI64,
}

impl ProjectHost {
    pub fn new(fs: Arc<InMemoryFileSystem>, root: Url, options: CompilerOptions) -> Self {
        Self {
            fs,
            root,
            options,
            script_files: RwLock::new(IndexSet::new()),
            project_version: AtomicI64::new(1),
        }
    }

    /// Returns true when the file was not registered before.
    pub fn add_file(&self, uri: Url) -> bool {
        self.script_files.write().insert(uri)
    }

    pub fn inc_project_version(&self) {
        self.project_version.fetch_add(1, Ordering::SeqCst);
    }
}

impl LanguageServiceHost for ProjectHost {
    fn script_file_names(&self) -> Vec<Url> {
        self.script_files.read().iter().cloned().collect()
    }

    fn script_version(&self, uri: &Url) -> i64 {
        self.fs.version(uri)
    }

    fn script_snapshot(&self, uri: &Url) -> Option<Arc<str>> {
        match self.fs.get_content(uri) {
            Ok(content) => Some(content),
            Err(err) => {
                debug!("snapshot unavailable: {err}");
                None
            }
        }
    }

    fn file_exists(&self, uri: &Url) -> bool {
        self.fs.has(uri)
    }

    fn compilation_settings(&self) -> CompilerOptions {
        self.options.clone()
    }

    fn current_directory(&self) -> Url {
        self.root.clone()
    }

    fn default_lib_file_name(&self) -> Url {
        self.fs.libraries().default_lib_uri()
    }

    fn project_version(&self) -> i64 {
        self.project_version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsls_backend::testing::{Script, ScriptedBackendFactory};
    use tsls_vfs::LibrarySet;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn fs_with(files: &[(&str, &str)]) -> Arc<InMemoryFileSystem> {
        let fs = Arc::new(InMemoryFileSystem::new(
            uri("file:///work"),
            Arc::new(LibrarySet::new("5.4.5")),
        ));
        for (path, text) in files {
            fs.add(&uri(path), Some((*text).to_string()));
        }
        fs
    }

    fn configuration(
        fs: &Arc<InMemoryFileSystem>,
        config_uri: Option<&str>,
    ) -> ProjectConfiguration {
        ProjectConfiguration::new(
            Arc::clone(fs),
            Arc::new(ScriptedBackendFactory::new(Script::default())),
            None,
            uri("file:///work"),
            config_uri.map(uri),
            None,
        )
    }

    #[test]
    fn init_parses_options_and_seeds_expected_files() {
        let fs = fs_with(&[
            (
                "file:///work/tsconfig.json",
                r#"{"compilerOptions": {"module": "commonjs"}, "include": ["src/**/*"]}"#,
            ),
            ("file:///work/src/a.ts", "const a = 1;"),
            ("file:///work/other/b.ts", "const b = 2;"),
        ]);
        let config = configuration(&fs, Some("file:///work/tsconfig.json"));
        config.init().unwrap();
        assert_eq!(config.init_state(), InitState::Parsed);
        assert_eq!(
            config.compiler_options().module.as_deref(),
            Some("commonjs")
        );
        assert_eq!(config.expected_files(), vec![uri("file:///work/src/a.ts")]);
    }

    #[test]
    fn init_is_idempotent_and_reset_returns_to_uninit() {
        let fs = fs_with(&[("file:///work/tsconfig.json", "{}")]);
        let config = configuration(&fs, Some("file:///work/tsconfig.json"));
        config.init().unwrap();
        config.init().unwrap();
        assert_eq!(config.init_state(), InitState::Parsed);
        config.reset();
        assert_eq!(config.init_state(), InitState::Uninit);
    }

    #[test]
    fn jsconfig_implies_allow_js() {
        let fs = fs_with(&[
            ("file:///work/jsconfig.json", "{}"),
            ("file:///work/app.js", "var x = 1;"),
        ]);
        let config = configuration(&fs, Some("file:///work/jsconfig.json"));
        config.init().unwrap();
        assert!(config.compiler_options().allows_js());
        assert_eq!(config.expected_files(), vec![uri("file:///work/app.js")]);
    }

    #[test]
    fn broken_config_fails_with_config_parse() {
        let fs = fs_with(&[("file:///work/tsconfig.json", "{\"files\": [")]);
        let config = configuration(&fs, Some("file:///work/tsconfig.json"));
        match config.init() {
            Err(ProjectError::ConfigParse { uri: failed, .. }) => {
                assert_eq!(failed, uri("file:///work/tsconfig.json"));
            }
            other => panic!("expected ConfigParse, got {other:?}"),
        }
        assert_eq!(config.init_state(), InitState::Uninit);
    }

    #[test]
    fn global_declarations_join_the_expected_set() {
        let fs = fs_with(&[
            ("file:///work/tsconfig.json", r#"{"include": ["src/**/*"]}"#),
            ("file:///work/src/a.ts", "const a = 1;"),
            (
                "file:///work/node_modules/@types/node/index.d.ts",
                "declare var process: any;",
            ),
            (
                "file:///work/node_modules/lib/index.d.ts",
                "export declare const x: number;",
            ),
        ]);
        let config = configuration(&fs, Some("file:///work/tsconfig.json"));
        config.init().unwrap();
        let expected = config.expected_files();
        assert!(expected.contains(&uri("file:///work/node_modules/@types/node/index.d.ts")));
        assert!(!expected.contains(&uri("file:///work/node_modules/lib/index.d.ts")));
    }

    #[test]
    fn basic_files_register_declarations_only() {
        let fs = fs_with(&[
            ("file:///work/tsconfig.json", "{}"),
            ("file:///work/src/a.ts", "const a = 1;"),
            ("file:///work/src/ambient.d.ts", "declare var g: any;"),
            (
                "file:///work/node_modules/@types/node/index.d.ts",
                "declare var process: any;",
            ),
        ]);
        let config = configuration(&fs, Some("file:///work/tsconfig.json"));
        config.ensure_basic_files().unwrap();
        assert_eq!(config.init_state(), InitState::BasicReady);
        let service = config.service().unwrap();
        let program = service.program_files();
        assert!(program.contains(&uri("file:///work/src/ambient.d.ts")));
        assert!(program.contains(&uri("file:///work/node_modules/@types/node/index.d.ts")));
        assert!(!program.contains(&uri("file:///work/src/a.ts")));

        config.ensure_all_files().unwrap();
        assert_eq!(config.init_state(), InitState::AllReady);
        assert!(config
            .service()
            .unwrap()
            .program_files()
            .contains(&uri("file:///work/src/a.ts")));
    }

    #[test]
    fn package_descriptor_comes_from_the_sibling_manifest() {
        let fs = fs_with(&[
            ("file:///work/tsconfig.json", "{}"),
            (
                "file:///work/package.json",
                r#"{"name": "mypkg", "version": "0.1.0"}"#,
            ),
        ]);
        let config = configuration(&fs, Some("file:///work/tsconfig.json"));
        config.init().unwrap();
        assert_eq!(config.package_name().as_deref(), Some("mypkg"));
    }

    #[test]
    fn fallback_configuration_uses_commonjs_defaults() {
        let fs = fs_with(&[("file:///work/app.js", "var x = 1;")]);
        let config = configuration(&fs, None);
        config.init().unwrap();
        let options = config.compiler_options();
        assert_eq!(options.module.as_deref(), Some("commonjs"));
        assert!(options.allows_js());
        assert_eq!(config.expected_files(), vec![uri("file:///work/app.js")]);
    }
}
