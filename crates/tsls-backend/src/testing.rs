//! Test doubles for the backend contract.
//!
//! [`MapHost`] is a host over a plain URI→text map. [`ScriptedBackend`]
//! answers queries from canned responses, which lets handler and project
//! tests pin exact results where a real type checker would be needed.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use url::Url;

use crate::lex::{self, TokenKind};
use crate::scanner::pre_process_text;
use crate::types::{
    CompilerOptions, CompletionEntry, DefinitionSpan, DiagnosticItem, IdentifierOccurrence,
    NavigateToItem, NavigationTree, PreProcessedFile, QuickInfo, ReferenceEntry, SymbolDescriptor,
    TextSpan,
};
use crate::{
    BackendError, BackendFactory, LanguageService, LanguageServiceHost, Result,
};

/// A language-service host over an in-memory map. Test-only.
pub struct MapHost {
    root: Url,
    files: FxHashMap<Url, Arc<str>>,
    versions: FxHashMap<Url, i64>,
}

impl MapHost {
    pub fn new(root: &str) -> Self {
        Self {
            root: Url::parse(root).expect("valid root URI"),
            files: FxHashMap::default(),
            versions: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, uri: &str, text: &str) {
        let uri = Url::parse(uri).expect("valid file URI");
        *self.versions.entry(uri.clone()).or_insert(0) += 1;
        self.files.insert(uri, Arc::from(text));
    }
}

impl LanguageServiceHost for MapHost {
    fn script_file_names(&self) -> Vec<Url> {
        self.files.keys().cloned().collect()
    }

    fn script_version(&self, uri: &Url) -> i64 {
        self.versions.get(uri).copied().unwrap_or(0)
    }

    fn script_snapshot(&self, uri: &Url) -> Option<Arc<str>> {
        self.files.get(uri).cloned()
    }

    fn compilation_settings(&self) -> CompilerOptions {
        CompilerOptions::common_js_defaults()
    }

    fn current_directory(&self) -> Url {
        self.root.clone()
    }

    fn default_lib_file_name(&self) -> Url {
        crate::libs::bundled_libraries().default_lib_uri()
    }

    fn project_version(&self) -> i64 {
        1
    }
}

/// A diagnostic that applies only while a trigger file's current
/// snapshot contains a marker.
///
/// Diagnostics are the one scripted answer that must react to edits:
/// sync tests drive `didOpen`/`didChange` and expect problems to appear
/// and clear with the content, including across files. The trigger is
/// checked against the live snapshot on every query.
pub struct ConditionalDiagnostic {
    /// File whose content decides whether the diagnostic is active.
    pub trigger_uri: Url,
    pub trigger_contains: String,
    /// The diagnostic itself; its `uri` names the file it lands on.
    pub item: DiagnosticItem,
}

/// Canned responses, keyed the way the service is queried.
#[derive(Default)]
pub struct Script {
    pub definitions: FxHashMap<(Url, u32), Vec<DefinitionSpan>>,
    pub quick_infos: FxHashMap<(Url, u32), QuickInfo>,
    pub references: FxHashMap<(Url, u32), Vec<ReferenceEntry>>,
    pub navigation: FxHashMap<Url, NavigationTree>,
    pub navigate_to: Vec<NavigateToItem>,
    pub completions: FxHashMap<(Url, u32), Vec<CompletionEntry>>,
    pub diagnostics: Vec<ConditionalDiagnostic>,
    pub symbols: FxHashMap<(Url, u32), SymbolDescriptor>,
}

/// A backend that replays a [`Script`].
pub struct ScriptedBackend {
    host: Arc<dyn LanguageServiceHost>,
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new(host: Arc<dyn LanguageServiceHost>, script: Arc<Script>) -> Self {
        Self { host, script }
    }
}

impl LanguageService for ScriptedBackend {
    fn definitions_at(&self, uri: &Url, offset: u32) -> Result<Vec<DefinitionSpan>> {
        Ok(self
            .script
            .definitions
            .get(&(uri.clone(), offset))
            .cloned()
            .unwrap_or_default())
    }

    fn quick_info_at(&self, uri: &Url, offset: u32) -> Result<Option<QuickInfo>> {
        Ok(self.script.quick_infos.get(&(uri.clone(), offset)).cloned())
    }

    fn references_at(&self, uri: &Url, offset: u32) -> Result<Vec<ReferenceEntry>> {
        Ok(self
            .script
            .references
            .get(&(uri.clone(), offset))
            .cloned()
            .unwrap_or_default())
    }

    fn navigation_tree(&self, uri: &Url) -> Result<NavigationTree> {
        self.script
            .navigation
            .get(uri)
            .cloned()
            .ok_or_else(|| BackendError::UnknownFile(uri.clone()))
    }

    fn navigate_to(&self, query: &str, limit: usize) -> Result<Vec<NavigateToItem>> {
        Ok(self
            .script
            .navigate_to
            .iter()
            .filter(|item| query.is_empty() || item.name.contains(query))
            .take(limit)
            .cloned()
            .collect())
    }

    fn completions_at(&self, uri: &Url, offset: u32) -> Result<Vec<CompletionEntry>> {
        Ok(self
            .script
            .completions
            .get(&(uri.clone(), offset))
            .cloned()
            .unwrap_or_default())
    }

    fn diagnostics_for(&self, uri: &Url) -> Result<Vec<DiagnosticItem>> {
        Ok(self
            .script
            .diagnostics
            .iter()
            .filter(|entry| entry.item.uri.as_ref() == Some(uri))
            .filter(|entry| {
                self.host
                    .script_snapshot(&entry.trigger_uri)
                    .is_some_and(|text| text.contains(&entry.trigger_contains))
            })
            .map(|entry| entry.item.clone())
            .collect())
    }

    fn program_files(&self) -> Vec<Url> {
        self.host.script_file_names()
    }

    fn identifiers_in(&self, uri: &Url) -> Result<Vec<IdentifierOccurrence>> {
        let text = self
            .host
            .script_snapshot(uri)
            .ok_or_else(|| BackendError::UnknownFile(uri.clone()))?;
        let (tokens, _) = lex::tokenize(&text);
        Ok(tokens
            .into_iter()
            .filter(|token| token.kind == TokenKind::Identifier)
            .map(|token| IdentifierOccurrence {
                text: token.text,
                offset: token.offset,
            })
            .collect())
    }

    fn symbol_at(&self, uri: &Url, offset: u32) -> Result<Option<SymbolDescriptor>> {
        Ok(self.script.symbols.get(&(uri.clone(), offset)).cloned())
    }

    fn pre_process(&self, text: &str) -> PreProcessedFile {
        pre_process_text(text)
    }

    fn resolve_module_name(&self, specifier: &str, containing: &Url) -> Option<Url> {
        crate::resolve::resolve_module_name(
            self.host.as_ref(),
            specifier,
            containing,
            &self.host.compilation_settings(),
        )
    }
}

/// Hands the same script to every created service and records the hosts
/// it was given.
pub struct ScriptedBackendFactory {
    pub script: Arc<Script>,
    pub hosts: Mutex<Vec<Arc<dyn LanguageServiceHost>>>,
}

impl ScriptedBackendFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            hosts: Mutex::new(Vec::new()),
        }
    }
}

impl BackendFactory for ScriptedBackendFactory {
    fn create(&self, host: Arc<dyn LanguageServiceHost>) -> Result<Arc<dyn LanguageService>> {
        self.hosts.lock().push(Arc::clone(&host));
        Ok(Arc::new(ScriptedBackend::new(host, Arc::clone(&self.script))))
    }
}

/// A convenient span helper for scripted fixtures.
pub fn span(start: u32, length: u32) -> TextSpan {
    TextSpan::new(start, length)
}
