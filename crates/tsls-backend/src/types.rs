//! Records exchanged across the backend boundary.

use serde::{Deserialize, Serialize};
use url::Url;

/// A half-open `[start, start + length)` range of UTF-8 byte offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: u32,
    pub length: u32,
}

impl TextSpan {
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    pub fn from_bounds(start: u32, end: u32) -> Self {
        Self {
            start,
            length: end.saturating_sub(start),
        }
    }

    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end()
    }
}

/// Where a symbol is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSpan {
    pub uri: Url,
    pub span: TextSpan,
}

/// Hover payload.
#[derive(Debug, Clone)]
pub struct QuickInfo {
    pub kind: String,
    pub display: String,
    pub documentation: String,
    pub span: TextSpan,
}

/// Hierarchical symbol outline of one source file.
#[derive(Debug, Clone)]
pub struct NavigationTree {
    pub text: String,
    pub kind: String,
    pub spans: Vec<TextSpan>,
    pub child_items: Vec<NavigationTree>,
}

/// One match from a free-text symbol search.
#[derive(Debug, Clone)]
pub struct NavigateToItem {
    pub name: String,
    pub kind: String,
    pub uri: Url,
    pub span: TextSpan,
    pub container_name: Option<String>,
    pub container_kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionEntry {
    pub name: String,
    pub kind: String,
    pub sort_text: String,
    pub detail: Option<String>,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Message,
    Suggestion,
}

/// A compiler diagnostic before protocol translation.
///
/// `messages` carries the flattened message chain; the publisher joins the
/// parts with newlines. Diagnostics without a file are dropped at the
/// publishing boundary.
#[derive(Debug, Clone)]
pub struct DiagnosticItem {
    pub uri: Option<Url>,
    pub span: TextSpan,
    pub messages: Vec<String>,
    pub category: DiagnosticCategory,
    pub code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub uri: Url,
    pub span: TextSpan,
    pub is_definition: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierOccurrence {
    pub text: String,
    pub offset: u32,
}

/// Imports and references found by scanning a file's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreProcessedFile {
    /// Module specifiers from `import`, `export … from` and `require`.
    pub imported_files: Vec<String>,
    /// Paths from `/// <reference path="…">` directives.
    pub referenced_files: Vec<String>,
}

/// Package coordinates attached to a symbol that crosses repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// A structured symbol identifier that survives across repositories.
///
/// The same shape serves as query and value: unset query fields are
/// wildcards, set fields demand equality. Path-like fields are compared by
/// substring containment, enum-like fields strictly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageDescriptor>,
}

impl SymbolDescriptor {
    /// True when every field the query specifies is satisfied.
    pub fn matches(&self, query: &SymbolDescriptor) -> bool {
        fn strict(candidate: &Option<String>, wanted: &Option<String>) -> bool {
            match wanted {
                None => true,
                Some(wanted) => candidate.as_deref() == Some(wanted.as_str()),
            }
        }
        // file paths differ by workspace root between repositories, so
        // containment is the contract here
        let path_ok = match &query.file_path {
            None => true,
            Some(wanted) => self
                .file_path
                .as_deref()
                .is_some_and(|path| path.contains(wanted.as_str())),
        };
        let package_ok = match &query.package {
            None => true,
            Some(wanted) => match &self.package {
                None => false,
                Some(package) => {
                    (wanted.name.is_none() || package.name == wanted.name)
                        && (wanted.version.is_none() || package.version == wanted.version)
                }
            },
        };
        strict(&self.name, &query.name)
            && strict(&self.kind, &query.kind)
            && strict(&self.container_name, &query.container_name)
            && strict(&self.container_kind, &query.container_kind)
            && path_ok
            && package_ok
    }

    /// Counts how many specified query fields the candidate satisfies.
    pub fn score(&self, query: &SymbolDescriptor) -> u32 {
        fn one(matched: bool) -> u32 {
            u32::from(matched)
        }
        let mut score = 0;
        if let Some(name) = &query.name {
            score += one(self.name.as_deref() == Some(name.as_str()));
        }
        if let Some(kind) = &query.kind {
            score += one(self.kind.as_deref() == Some(kind.as_str()));
        }
        if let Some(container) = &query.container_name {
            score += one(self.container_name.as_deref() == Some(container.as_str()));
        }
        if let Some(container_kind) = &query.container_kind {
            score += one(self.container_kind.as_deref() == Some(container_kind.as_str()));
        }
        if let Some(path) = &query.file_path {
            score += one(
                self.file_path
                    .as_deref()
                    .is_some_and(|candidate| candidate.contains(path.as_str())),
            );
        }
        if let Some(package) = &query.package {
            let candidate = self.package.as_ref();
            score += one(
                package.name.is_some()
                    && candidate.is_some_and(|pkg| pkg.name == package.name),
            );
        }
        score
    }
}

/// The subset of `compilerOptions` the project model interprets.
///
/// Unknown options parse without error and are ignored, which is what tsc
/// does for options it does not understand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub module: Option<String>,
    pub target: Option<String>,
    pub allow_js: Option<bool>,
    pub check_js: Option<bool>,
    pub strict: Option<bool>,
    pub declaration: Option<bool>,
    pub base_url: Option<String>,
    pub jsx: Option<String>,
    pub lib: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
}

impl CompilerOptions {
    /// The defaults used for workspaces without any configuration file.
    pub fn common_js_defaults() -> Self {
        Self {
            module: Some("commonjs".to_string()),
            allow_js: Some(true),
            ..Self::default()
        }
    }

    pub fn allows_js(&self) -> bool {
        self.allow_js.unwrap_or(false) || self.check_js.unwrap_or(false)
    }
}
