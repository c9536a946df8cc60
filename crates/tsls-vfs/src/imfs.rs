//! The in-memory file system.
//!
//! A sparse URI-keyed map of file entries plus an overlay of unsaved
//! editor edits. An entry with no content is a file known to exist whose
//! bytes have not been fetched yet; the updater fills it in on demand.
//! A directory tree is maintained in parallel with the flat map so the
//! compiler host can list directories without touching the remote.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use url::Url;

use crate::libraries::LibrarySet;
use crate::matcher::{self, Usage};
use crate::path;
use crate::{FileSystemError, Result};

type AddListener = Box<dyn Fn(&Url) + Send + Sync>;

#[derive(Debug, Default)]
struct FileEntry {
    content: Option<Arc<str>>,
    version: i64,
}

#[derive(Debug, Default)]
struct DirNode {
    is_file: bool,
    children: BTreeMap<String, DirNode>,
}

/// One directory listing: child names only, not full paths.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirEntries {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

#[derive(Default)]
struct State {
    files: FxHashMap<Url, FileEntry>,
    overlay: FxHashMap<Url, Arc<str>>,
    tree: DirNode,
}

pub struct InMemoryFileSystem {
    root: Url,
    case_sensitive: bool,
    libraries: Arc<LibrarySet>,
    state: RwLock<State>,
    listeners: Mutex<Vec<AddListener>>,
}

impl InMemoryFileSystem {
    pub fn new(root: Url, libraries: Arc<LibrarySet>) -> Self {
        Self::with_case_sensitivity(root, libraries, true)
    }

    pub fn with_case_sensitivity(
        root: Url,
        libraries: Arc<LibrarySet>,
        case_sensitive: bool,
    ) -> Self {
        Self {
            root: path::normalize(&root),
            case_sensitive,
            libraries,
            state: RwLock::new(State::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn libraries(&self) -> &Arc<LibrarySet> {
        &self.libraries
    }

    /// Registers a file, optionally with content.
    ///
    /// Calling `add` again with `None` is a metadata-only registration and
    /// preserves content already present.
    pub fn add(&self, uri: &Url, content: Option<String>) {
        let uri = path::normalize(uri);
        {
            let mut state = self.state.write();
            let entry = state.files.entry(uri.clone()).or_default();
            if let Some(text) = content {
                if entry.content.as_deref() != Some(text.as_str()) {
                    entry.content = Some(Arc::from(text.as_str()));
                    entry.version += 1;
                }
            }
            state.insert_into_tree(&uri);
        }
        for listener in self.listeners.lock().iter() {
            listener(&uri);
        }
    }

    /// Subscribes to `add` events.
    pub fn on_add(&self, listener: impl Fn(&Url) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    /// Whether the URI is known: registered, overlaid, or a library file.
    pub fn has(&self, uri: &Url) -> bool {
        let uri = path::normalize(uri);
        let state = self.state.read();
        state.files.contains_key(&uri)
            || state.overlay.contains_key(&uri)
            || self.libraries.contains(&uri)
    }

    /// Whether content (not just existence) is available for the URI.
    pub fn has_content(&self, uri: &Url) -> bool {
        let uri = path::normalize(uri);
        let state = self.state.read();
        state.overlay.contains_key(&uri)
            || state
                .files
                .get(&uri)
                .is_some_and(|entry| entry.content.is_some())
            || self.libraries.contains(&uri)
    }

    /// Content for a URI: overlay first, then the file entry, then the
    /// bundled library set. Callers are expected to have ensured the file.
    pub fn get_content(&self, uri: &Url) -> Result<Arc<str>> {
        let uri = path::normalize(uri);
        {
            let state = self.state.read();
            if let Some(text) = state.overlay.get(&uri) {
                return Ok(Arc::clone(text));
            }
            if let Some(entry) = state.files.get(&uri) {
                if let Some(content) = &entry.content {
                    return Ok(Arc::clone(content));
                }
            }
        }
        if let Some(text) = self.libraries.get(&uri) {
            return Ok(text);
        }
        Err(FileSystemError::NotAvailable(uri))
    }

    /// The mutation counter for a URI; zero for unknown files.
    pub fn version(&self, uri: &Url) -> i64 {
        let uri = path::normalize(uri);
        self.state
            .read()
            .files
            .get(&uri)
            .map_or(0, |entry| entry.version)
    }

    pub fn file_exists(&self, file_path: &str) -> bool {
        path::path_to_uri(file_path)
            .map(|uri| self.has(&uri))
            .unwrap_or(false)
    }

    pub fn read_file(&self, file_path: &str) -> Result<Arc<str>> {
        let uri = path::path_to_uri(file_path)?;
        self.get_content(&uri)
    }

    /// Places unsaved editor content in the overlay.
    pub fn did_open(&self, uri: &Url, text: &str) {
        self.set_overlay(uri, text);
    }

    /// Full-document replacement of the overlay content.
    pub fn did_change(&self, uri: &Url, text: &str) {
        self.set_overlay(uri, text);
    }

    fn set_overlay(&self, uri: &Url, text: &str) {
        let uri = path::normalize(uri);
        let mut state = self.state.write();
        state.overlay.insert(uri.clone(), Arc::from(text));
        let entry = state.files.entry(uri.clone()).or_default();
        entry.version += 1;
        state.insert_into_tree(&uri);
    }

    /// Promotes the overlay into the file entry.
    pub fn did_save(&self, uri: &Url) {
        let uri = path::normalize(uri);
        let mut state = self.state.write();
        if let Some(text) = state.overlay.get(&uri).cloned() {
            let entry = state.files.entry(uri.clone()).or_default();
            entry.content = Some(text);
            entry.version += 1;
        }
    }

    /// Discards the overlay; reads fall back to the last saved content.
    pub fn did_close(&self, uri: &Url) {
        let uri = path::normalize(uri);
        let mut state = self.state.write();
        state.overlay.remove(&uri);
        if let Some(entry) = state.files.get_mut(&uri) {
            entry.version += 1;
        }
    }

    /// Every known URI, each exactly once, in no particular order.
    pub fn uris(&self) -> Vec<Url> {
        self.state.read().files.keys().cloned().collect()
    }

    /// Lists known files beneath `root_path` that match the include
    /// patterns, are not pruned by the exclude patterns, and carry one of
    /// the extensions. Empty includes mean everything; empty extensions
    /// mean any extension.
    pub fn read_directory(
        &self,
        root_path: &str,
        extensions: &[&str],
        excludes: &[String],
        includes: &[String],
    ) -> Vec<String> {
        let root_path = root_path.trim_end_matches('/');
        let include_patterns: Vec<_> = if includes.is_empty() {
            vec![matcher::compile("**/*", Usage::Include, self.case_sensitive)]
        } else {
            includes
                .iter()
                .map(|pattern| {
                    matcher::compile(
                        &matcher::expand_include(pattern),
                        Usage::Include,
                        self.case_sensitive,
                    )
                })
                .collect()
        };
        let exclude_patterns: Vec<_> = excludes
            .iter()
            .filter_map(|pattern| matcher::compile(pattern, Usage::Exclude, self.case_sensitive))
            .collect();

        let mut matched = Vec::new();
        let state = self.state.read();
        for uri in state.files.keys() {
            if uri.scheme() != "file" {
                continue;
            }
            let Ok(file_path) = path::uri_to_path(uri) else {
                continue;
            };
            let Some(relative) = strip_root(&file_path, root_path) else {
                continue;
            };
            if !self.extension_matches(&file_path, extensions) {
                continue;
            }
            if !include_patterns
                .iter()
                .any(|re| re.as_ref().is_some_and(|re| re.is_match(relative)))
            {
                continue;
            }
            if exclude_patterns.iter().any(|re| re.is_match(relative)) {
                continue;
            }
            matched.push(file_path.clone());
        }
        matched.sort();
        matched
    }

    fn extension_matches(&self, file_path: &str, extensions: &[&str]) -> bool {
        if extensions.is_empty() {
            return true;
        }
        extensions.iter().any(|ext| {
            if self.case_sensitive {
                file_path.ends_with(ext)
            } else {
                file_path.to_lowercase().ends_with(&ext.to_lowercase())
            }
        })
    }

    /// Immediate children of a directory, from the parallel tree.
    pub fn get_entries(&self, dir: &str) -> DirEntries {
        let state = self.state.read();
        let mut node = &state.tree;
        for segment in dir.split('/').filter(|segment| !segment.is_empty()) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return DirEntries::default(),
            }
        }
        let mut entries = DirEntries::default();
        for (name, child) in &node.children {
            if child.is_file {
                entries.files.push(name.clone());
            } else {
                entries.directories.push(name.clone());
            }
        }
        entries
    }
}

impl State {
    fn insert_into_tree(&mut self, uri: &Url) {
        if uri.scheme() != "file" {
            return;
        }
        let Ok(file_path) = path::uri_to_path(uri) else {
            return;
        };
        let mut node = &mut self.tree;
        let segments: Vec<_> = file_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        for (index, segment) in segments.iter().enumerate() {
            node = node.children.entry((*segment).to_string()).or_default();
            if index + 1 == segments.len() {
                node.is_file = true;
            }
        }
    }
}

fn strip_root<'a>(file_path: &'a str, root_path: &str) -> Option<&'a str> {
    if root_path.is_empty() || root_path == "/" {
        return file_path.strip_prefix('/').or(Some(file_path));
    }
    let rest = file_path.strip_prefix(root_path)?;
    rest.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs() -> InMemoryFileSystem {
        InMemoryFileSystem::new(
            Url::parse("file:///work").unwrap(),
            Arc::new(LibrarySet::new("5.4.5")),
        )
    }

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn added_uris_are_known_and_iterated_once() {
        let fs = fs();
        let a = uri("file:///work/a.ts");
        fs.add(&a, Some("const a = 1;".into()));
        fs.add(&a, None);
        assert!(fs.has(&a));
        let uris = fs.uris();
        assert_eq!(uris.iter().filter(|u| **u == a).count(), 1);
    }

    #[test]
    fn metadata_only_add_preserves_content() {
        let fs = fs();
        let a = uri("file:///work/a.ts");
        fs.add(&a, Some("const a = 1;".into()));
        fs.add(&a, None);
        assert_eq!(&*fs.get_content(&a).unwrap(), "const a = 1;");
    }

    #[test]
    fn overlay_masks_the_file_entry() {
        let fs = fs();
        let a = uri("file:///work/a.ts");
        fs.add(&a, Some("saved".into()));
        fs.did_open(&a, "edited");
        assert_eq!(&*fs.get_content(&a).unwrap(), "edited");
        fs.did_close(&a);
        assert_eq!(&*fs.get_content(&a).unwrap(), "saved");
    }

    #[test]
    fn save_promotes_the_overlay() {
        let fs = fs();
        let a = uri("file:///work/a.ts");
        fs.add(&a, Some("saved".into()));
        fs.did_open(&a, "edited");
        fs.did_save(&a);
        fs.did_close(&a);
        assert_eq!(&*fs.get_content(&a).unwrap(), "edited");
    }

    #[test]
    fn versions_increase_with_every_mutation() {
        let fs = fs();
        let a = uri("file:///work/a.ts");
        fs.add(&a, Some("one".into()));
        let v1 = fs.version(&a);
        fs.did_open(&a, "two");
        fs.did_change(&a, "three");
        fs.did_close(&a);
        assert!(fs.version(&a) >= v1 + 3);
    }

    #[test]
    fn content_falls_back_to_libraries() {
        let mut libs = LibrarySet::new("5.4.5");
        libs.insert("lib.d.ts", "declare var console: any;");
        let fs = InMemoryFileSystem::new(uri("file:///work"), Arc::new(libs));
        let lib = fs.libraries().uri_for("lib.d.ts");
        assert!(fs.has(&lib));
        assert_eq!(&*fs.get_content(&lib).unwrap(), "declare var console: any;");
    }

    #[test]
    fn missing_content_is_not_available() {
        let fs = fs();
        let a = uri("file:///work/a.ts");
        fs.add(&a, None);
        assert!(fs.has(&a));
        assert!(matches!(
            fs.get_content(&a),
            Err(FileSystemError::NotAvailable(_))
        ));
    }

    #[test]
    fn read_directory_applies_includes_excludes_and_extensions() {
        let fs = fs();
        for (p, text) in [
            ("file:///work/src/a.ts", "a"),
            ("file:///work/src/sub/b.ts", "b"),
            ("file:///work/src/c.js", "c"),
            ("file:///work/node_modules/d/d.ts", "d"),
            ("file:///work/.hidden/e.ts", "e"),
        ] {
            fs.add(&uri(p), Some(text.into()));
        }
        let found = fs.read_directory(
            "/work",
            &[".ts"],
            &["node_modules".to_string()],
            &["src/**/*".to_string()],
        );
        assert_eq!(found, vec!["/work/src/a.ts", "/work/src/sub/b.ts"]);
    }

    #[test]
    fn get_entries_splits_files_and_directories() {
        let fs = fs();
        fs.add(&uri("file:///work/src/a.ts"), Some("a".into()));
        fs.add(&uri("file:///work/src/sub/b.ts"), Some("b".into()));
        fs.add(&uri("file:///work/readme.md"), Some("r".into()));
        let entries = fs.get_entries("/work");
        assert_eq!(entries.files, vec!["readme.md"]);
        assert_eq!(entries.directories, vec!["src"]);
        let src = fs.get_entries("/work/src");
        assert_eq!(src.files, vec!["a.ts"]);
        assert_eq!(src.directories, vec!["sub"]);
    }

    #[test]
    fn add_listeners_fire() {
        let fs = fs();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        fs.on_add(move |uri| sink.lock().push(uri.clone()));
        let a = uri("file:///work/a.ts");
        fs.add(&a, Some("a".into()));
        assert_eq!(seen.lock().as_slice(), &[a]);
    }
}
