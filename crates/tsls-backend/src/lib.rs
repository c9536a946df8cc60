//! `tsls-backend` - the analysis-backend contract for tsls.
//!
//! The project model drives a type checker through two narrow interfaces:
//! a [`LanguageServiceHost`] the backend pulls scripts and settings from,
//! and a [`LanguageService`] the request handlers query. Anything that
//! honors the pair can be substituted; this crate ships a lexical
//! [`ScannerBackend`] as the default and a scripted backend for tests.

pub mod lex;
pub mod libs;
pub mod resolve;
pub mod scanner;
pub mod testing;
pub mod types;

use std::sync::Arc;

use url::Url;

pub use libs::{bundled_libraries, TYPESCRIPT_VERSION};
pub use scanner::{ScannerBackend, ScannerBackendFactory};
pub use types::{
    CompilerOptions, CompletionEntry, DefinitionSpan, DiagnosticCategory, DiagnosticItem,
    IdentifierOccurrence, NavigateToItem, NavigationTree, PackageDescriptor, PreProcessedFile,
    QuickInfo, ReferenceEntry, SymbolDescriptor, TextSpan,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("no source file for {0}")]
    UnknownFile(Url),
    #[error("analysis backend failure: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// What the backend may ask of its surroundings.
///
/// One host exists per project configuration; it answers from the IMFS
/// and the configuration's file list, never from disk.
pub trait LanguageServiceHost: Send + Sync {
    /// The scripts currently part of the program.
    fn script_file_names(&self) -> Vec<Url>;

    /// Monotonically increasing per-file version.
    fn script_version(&self, uri: &Url) -> i64;

    /// The current text of a script, if its content is available.
    fn script_snapshot(&self, uri: &Url) -> Option<Arc<str>>;

    /// Whether a file is known to exist (content need not be fetched).
    fn file_exists(&self, uri: &Url) -> bool {
        self.script_snapshot(uri).is_some()
    }

    fn compilation_settings(&self) -> CompilerOptions;

    /// The configuration's root directory URI.
    fn current_directory(&self) -> Url;

    fn default_lib_file_name(&self) -> Url;

    /// Bumped whenever the set of files may have changed.
    fn project_version(&self) -> i64;
}

/// The queries the request handlers are built on.
///
/// All methods are synchronous: the host has already been populated by the
/// time a service is consulted, and implementations run to completion
/// without yielding.
pub trait LanguageService: Send + Sync {
    fn definitions_at(&self, uri: &Url, offset: u32) -> Result<Vec<DefinitionSpan>>;

    fn quick_info_at(&self, uri: &Url, offset: u32) -> Result<Option<QuickInfo>>;

    fn references_at(&self, uri: &Url, offset: u32) -> Result<Vec<ReferenceEntry>>;

    fn navigation_tree(&self, uri: &Url) -> Result<NavigationTree>;

    fn navigate_to(&self, query: &str, limit: usize) -> Result<Vec<NavigateToItem>>;

    fn completions_at(&self, uri: &Url, offset: u32) -> Result<Vec<CompletionEntry>>;

    fn diagnostics_for(&self, uri: &Url) -> Result<Vec<DiagnosticItem>>;

    /// Every file the current program consists of.
    fn program_files(&self) -> Vec<Url>;

    /// All identifier occurrences of a file, in source order. This is the
    /// walk `workspace/xreferences` is built on.
    fn identifiers_in(&self, uri: &Url) -> Result<Vec<IdentifierOccurrence>>;

    /// The descriptor of the symbol defined at the given position, if any.
    fn symbol_at(&self, uri: &Url, offset: u32) -> Result<Option<SymbolDescriptor>>;

    /// Imports, requires and triple-slash references of a source text.
    fn pre_process(&self, text: &str) -> PreProcessedFile;

    /// Node-style module resolution against the host.
    fn resolve_module_name(&self, specifier: &str, containing: &Url) -> Option<Url>;
}

/// Creates one [`LanguageService`] per project configuration.
pub trait BackendFactory: Send + Sync {
    fn create(&self, host: Arc<dyn LanguageServiceHost>) -> Result<Arc<dyn LanguageService>>;
}
