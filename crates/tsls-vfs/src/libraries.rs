//! Bundled standard-library declaration files.
//!
//! Library files ship with the type-system implementation rather than the
//! workspace, so they surface under a stable `git://` URI instead of
//! `file://`. The set is built once at startup and shared immutably with
//! every configuration.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use url::Url;

const LIBRARY_ORIGIN: &str = "git://github.com/Microsoft/TypeScript";
const DEFAULT_LIB: &str = "lib.d.ts";

/// The immutable map of bundled declaration files.
#[derive(Debug, Default)]
pub struct LibrarySet {
    version: String,
    files: FxHashMap<Url, Arc<str>>,
}

impl LibrarySet {
    /// Creates an empty set tagged with the compiler version the files
    /// were bundled from.
    pub fn new(compiler_version: &str) -> Self {
        Self {
            version: compiler_version.to_string(),
            files: FxHashMap::default(),
        }
    }

    /// The URI a bundled file with this basename surfaces under.
    pub fn uri_for(&self, basename: &str) -> Url {
        let raw = format!("{LIBRARY_ORIGIN}?v{}#lib/{basename}", self.version);
        Url::parse(&raw).expect("library URIs are well-formed by construction")
    }

    /// The URI reported as the default library file.
    pub fn default_lib_uri(&self) -> Url {
        self.uri_for(DEFAULT_LIB)
    }

    pub fn insert(&mut self, basename: &str, content: impl Into<Arc<str>>) {
        let uri = self.uri_for(basename);
        self.files.insert(uri, content.into());
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<str>> {
        self.files.get(uri).cloned()
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.files.contains_key(uri)
    }

    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.files.keys()
    }

    /// Whether a URI addresses a bundled library file (of any version).
    pub fn is_library_uri(uri: &Url) -> bool {
        uri.as_str().starts_with(LIBRARY_ORIGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_uris_carry_version_and_basename() {
        let mut libs = LibrarySet::new("5.4.5");
        libs.insert("lib.d.ts", "declare var undefined: undefined;");
        let uri = libs.uri_for("lib.d.ts");
        assert_eq!(
            uri.as_str(),
            "git://github.com/Microsoft/TypeScript?v5.4.5#lib/lib.d.ts"
        );
        assert!(libs.get(&uri).is_some());
        assert!(LibrarySet::is_library_uri(&uri));
        assert!(!LibrarySet::is_library_uri(
            &Url::parse("file:///lib.d.ts").unwrap()
        ));
    }

    #[test]
    fn default_lib_is_lib_d_ts() {
        let libs = LibrarySet::new("5.4.5");
        assert!(libs.default_lib_uri().as_str().ends_with("#lib/lib.d.ts"));
    }
}
