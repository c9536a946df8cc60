//! Text-document feature handlers.
//!
//! Every handler follows the same shape: resolve the workspace, run the
//! ensure level the request needs, route to the owning configuration's
//! service, and marshal the backend records into protocol types.

use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionParams, CompletionResponse, DocumentSymbolParams,
    DocumentSymbolResponse, GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverContents,
    HoverParams, LanguageString, Location, MarkedString, ReferenceParams, SymbolInformation, Url,
};
use tracing::debug;

use tsls_backend::NavigationTree;

use crate::ext::SymbolLocationInformation;
use crate::state::ServerState;

use super::{lsp_utils, to_rpc_error};

pub async fn goto_definition(
    state: &ServerState,
    params: GotoDefinitionParams,
) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
    let workspace = state.workspace()?;
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;
    debug!("textDocument/definition {uri} {position:?}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_hover(&uri, &token)
        .await
        .map_err(to_rpc_error)?;
    let config = workspace
        .manager
        .configuration_for(&uri)
        .map_err(to_rpc_error)?;
    let service = config.service().map_err(to_rpc_error)?;

    let Ok(content) = workspace.fs.get_content(&uri) else {
        return Ok(None);
    };
    let Some(offset) = lsp_utils::position_to_offset(&content, position) else {
        return Ok(None);
    };
    let definitions = service.definitions_at(&uri, offset).map_err(to_rpc_error)?;
    let locations: Vec<Location> = definitions
        .into_iter()
        .filter_map(|definition| {
            lsp_utils::location_for(&workspace.fs, &definition.uri, definition.span)
        })
        .collect();
    Ok(Some(GotoDefinitionResponse::Array(locations)))
}

/// `textDocument/xdefinition`: definitions plus a symbol descriptor that
/// survives across repositories.
pub async fn x_definition(
    state: &ServerState,
    uri: Url,
    position: tower_lsp::lsp_types::Position,
) -> jsonrpc::Result<Vec<SymbolLocationInformation>> {
    let workspace = state.workspace()?;
    debug!("textDocument/xdefinition {uri} {position:?}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_hover(&uri, &token)
        .await
        .map_err(to_rpc_error)?;
    let config = workspace
        .manager
        .configuration_for(&uri)
        .map_err(to_rpc_error)?;
    let service = config.service().map_err(to_rpc_error)?;

    let Ok(content) = workspace.fs.get_content(&uri) else {
        return Ok(Vec::new());
    };
    let Some(offset) = lsp_utils::position_to_offset(&content, position) else {
        return Ok(Vec::new());
    };
    let mut symbol = service
        .symbol_at(&uri, offset)
        .map_err(to_rpc_error)?
        .unwrap_or_default();
    if symbol.package.is_none() {
        symbol.package = config.package_descriptor();
    }
    let definitions = service.definitions_at(&uri, offset).map_err(to_rpc_error)?;
    Ok(definitions
        .into_iter()
        .filter_map(|definition| {
            let location =
                lsp_utils::location_for(&workspace.fs, &definition.uri, definition.span)?;
            Some(SymbolLocationInformation {
                location,
                symbol: symbol.clone(),
            })
        })
        .collect())
}

pub async fn hover(state: &ServerState, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
    let workspace = state.workspace()?;
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;
    debug!("textDocument/hover {uri} {position:?}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_hover(&uri, &token)
        .await
        .map_err(to_rpc_error)?;
    let config = workspace
        .manager
        .configuration_for(&uri)
        .map_err(to_rpc_error)?;
    let service = config.service().map_err(to_rpc_error)?;

    let Ok(content) = workspace.fs.get_content(&uri) else {
        return Ok(None);
    };
    let Some(offset) = lsp_utils::position_to_offset(&content, position) else {
        return Ok(None);
    };
    let Some(info) = service.quick_info_at(&uri, offset).map_err(to_rpc_error)? else {
        return Ok(None);
    };

    let mut contents = vec![MarkedString::LanguageString(LanguageString {
        language: "typescript".to_string(),
        value: info.display,
    })];
    if !info.documentation.is_empty() {
        contents.push(MarkedString::String(info.documentation));
    }
    Ok(Some(Hover {
        contents: HoverContents::Array(contents),
        range: Some(lsp_utils::span_to_range(&content, info.span)),
    }))
}

pub async fn references(
    state: &ServerState,
    params: ReferenceParams,
) -> jsonrpc::Result<Option<Vec<Location>>> {
    let workspace = state.workspace()?;
    let uri = params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;
    let include_declaration = params.context.include_declaration;
    debug!("textDocument/references {uri} {position:?}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_references(&uri, &token)
        .await
        .map_err(to_rpc_error)?;
    let config = workspace
        .manager
        .configuration_for(&uri)
        .map_err(to_rpc_error)?;
    config.ensure_all_files().map_err(to_rpc_error)?;
    let service = config.service().map_err(to_rpc_error)?;

    let Ok(content) = workspace.fs.get_content(&uri) else {
        return Ok(None);
    };
    let Some(offset) = lsp_utils::position_to_offset(&content, position) else {
        return Ok(None);
    };
    let references = service.references_at(&uri, offset).map_err(to_rpc_error)?;
    let locations: Vec<Location> = references
        .into_iter()
        .filter(|reference| include_declaration || !reference.is_definition)
        .filter_map(|reference| {
            lsp_utils::location_for(&workspace.fs, &reference.uri, reference.span)
        })
        .collect();
    Ok(Some(locations))
}

pub async fn document_symbol(
    state: &ServerState,
    params: DocumentSymbolParams,
) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
    let workspace = state.workspace()?;
    let uri = params.text_document.uri;
    debug!("textDocument/documentSymbol {uri}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_hover(&uri, &token)
        .await
        .map_err(to_rpc_error)?;
    let config = workspace
        .manager
        .configuration_for(&uri)
        .map_err(to_rpc_error)?;
    let service = config.service().map_err(to_rpc_error)?;

    let Ok(content) = workspace.fs.get_content(&uri) else {
        return Ok(None);
    };
    let tree = service.navigation_tree(&uri).map_err(to_rpc_error)?;
    let mut symbols = Vec::new();
    for child in &tree.child_items {
        flatten_tree(&uri, &content, child, None, &mut symbols);
    }
    Ok(Some(DocumentSymbolResponse::Flat(symbols)))
}

/// Flattens a navigation tree into `SymbolInformation` entries with
/// container names, the way the flat document-symbol shape wants them.
#[allow(deprecated)]
fn flatten_tree(
    uri: &Url,
    content: &str,
    node: &NavigationTree,
    container: Option<&str>,
    out: &mut Vec<SymbolInformation>,
) {
    if let Some(span) = node.spans.first() {
        out.push(SymbolInformation {
            name: node.text.clone(),
            kind: lsp_utils::symbol_kind(&node.kind),
            tags: None,
            deprecated: None,
            location: Location {
                uri: uri.clone(),
                range: lsp_utils::span_to_range(content, *span),
            },
            container_name: container.map(str::to_string),
        });
    }
    for child in &node.child_items {
        flatten_tree(uri, content, child, Some(node.text.as_str()), out);
    }
}

pub async fn completion(
    state: &ServerState,
    params: CompletionParams,
) -> jsonrpc::Result<Option<CompletionResponse>> {
    let workspace = state.workspace()?;
    let uri = params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;
    debug!("textDocument/completion {uri} {position:?}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_hover(&uri, &token)
        .await
        .map_err(to_rpc_error)?;
    let config = workspace
        .manager
        .configuration_for(&uri)
        .map_err(to_rpc_error)?;
    let service = config.service().map_err(to_rpc_error)?;

    let Ok(content) = workspace.fs.get_content(&uri) else {
        return Ok(None);
    };
    let Some(offset) = lsp_utils::position_to_offset(&content, position) else {
        return Ok(None);
    };
    let entries = service.completions_at(&uri, offset).map_err(to_rpc_error)?;
    let items: Vec<CompletionItem> = entries
        .into_iter()
        .map(|entry| CompletionItem {
            label: entry.name,
            kind: Some(lsp_utils::completion_kind(&entry.kind)),
            detail: entry.detail,
            documentation: entry
                .documentation
                .map(tower_lsp::lsp_types::Documentation::String),
            sort_text: Some(entry.sort_text),
            ..CompletionItem::default()
        })
        .collect();
    Ok(Some(CompletionResponse::Array(items)))
}
