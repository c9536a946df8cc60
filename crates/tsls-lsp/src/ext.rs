//! Protocol extensions beyond the LSP baseline.
//!
//! The cross-repository methods (`workspace/xreferences`,
//! `textDocument/xdefinition`, `workspace/xpackages`,
//! `workspace/xdependencies`, `workspace/xsymbol`) and the requests the
//! server sends to the client in strict mode (`textDocument/xcontent`,
//! `workspace/xfiles`).

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::request::Request;
use tower_lsp::lsp_types::{Location, TextDocumentIdentifier, TextDocumentItem};

use tsls_backend::{PackageDescriptor, SymbolDescriptor};

/// Extended symbol query: free text or a structured descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceSymbolQuery {
    pub query: Option<String>,
    pub symbol: Option<SymbolDescriptor>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependee_package_name: Option<String>,
}

/// `workspace/xreferences` input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceReferencesParams {
    pub query: SymbolDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<DependencyHints>,
}

/// One reference to a symbol described by a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceInformation {
    pub reference: Location,
    pub symbol: SymbolDescriptor,
}

/// `textDocument/xdefinition` output element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolLocationInformation {
    pub location: Location,
    pub symbol: SymbolDescriptor,
}

/// One dependency edge read from a `package.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReference {
    pub attributes: DependencyAttributes,
    pub hints: DependencyHints,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Which manifest section declared the dependency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// `workspace/xpackages` output element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInformation {
    pub package: PackageDescriptor,
    pub dependencies: Vec<DependencyReference>,
}

// ---------------------------------------------------------------------
// Server-to-client requests backing the strict-mode file system
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentParams {
    pub text_document: TextDocumentIdentifier,
}

pub enum ContentRequest {}

impl Request for ContentRequest {
    type Params = ContentParams;
    type Result = TextDocumentItem;
    const METHOD: &'static str = "textDocument/xcontent";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

pub enum FilesRequest {}

impl Request for FilesRequest {
    type Params = FilesParams;
    type Result = Vec<TextDocumentIdentifier>;
    const METHOD: &'static str = "workspace/xfiles";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_symbol_query_accepts_both_shapes() {
        let free: WorkspaceSymbolQuery =
            serde_json::from_str(r#"{"query": "Foo", "limit": 10}"#).unwrap();
        assert_eq!(free.query.as_deref(), Some("Foo"));
        assert_eq!(free.limit, Some(10));

        let structured: WorkspaceSymbolQuery = serde_json::from_str(
            r#"{"symbol": {"name": "a", "kind": "class", "package": {"name": "mypkg"}}}"#,
        )
        .unwrap();
        let symbol = structured.symbol.unwrap();
        assert_eq!(symbol.name.as_deref(), Some("a"));
        assert_eq!(
            symbol.package.unwrap().name.as_deref(),
            Some("mypkg")
        );
    }

    #[test]
    fn xreferences_params_parse_hints() {
        let params: WorkspaceReferencesParams = serde_json::from_str(
            r#"{"query": {"name": "getNumber"}, "hints": {"dependeePackageName": "mypkg"}}"#,
        )
        .unwrap();
        assert_eq!(
            params.hints.unwrap().dependee_package_name.as_deref(),
            Some("mypkg")
        );
    }
}
