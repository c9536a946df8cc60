//! Document synchronization handlers.
//!
//! Sync is full-document only: every change carries the whole text.
//! After each mutation the owning program's diagnostics are recomputed
//! and republished.

use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, MessageType,
};
use tracing::{info, warn};

use crate::client::LanguageClient;
use crate::state::ServerState;

use super::diagnostics;

pub async fn did_open(
    client: &dyn LanguageClient,
    state: &ServerState,
    params: DidOpenTextDocumentParams,
) {
    let Some(workspace) = state.workspace_opt() else {
        warn!("didOpen before initialize");
        return;
    };
    let uri = params.text_document.uri;
    info!("document opened: {uri}");

    let token = CancellationToken::new();
    if let Err(err) = workspace.manager.ensure_module_structure(&token).await {
        warn!("module structure unavailable on open of {uri}: {err}");
    }
    if let Err(err) = workspace.manager.did_open(&uri, &params.text_document.text) {
        warn!("didOpen for {uri} failed: {err}");
        return;
    }
    if let Err(err) = workspace.manager.ensure_files_for_hover(&uri, &token).await {
        warn!("hover scope unavailable for {uri}: {err}");
        client
            .log_message(
                MessageType::WARNING,
                format!("could not load dependencies of {uri}: {err}"),
            )
            .await;
    }
    diagnostics::update_for(client, &workspace, &uri).await;
}

pub async fn did_change(
    client: &dyn LanguageClient,
    state: &ServerState,
    params: DidChangeTextDocumentParams,
) {
    let Some(workspace) = state.workspace_opt() else {
        warn!("didChange before initialize");
        return;
    };
    let uri = params.text_document.uri;
    // Full-document sync: the last change wins wholesale.
    let Some(change) = params.content_changes.into_iter().last() else {
        return;
    };
    if change.range.is_some() {
        warn!("ignoring incremental change for {uri}; full sync only");
        return;
    }
    if let Err(err) = workspace.manager.did_change(&uri, &change.text) {
        warn!("didChange for {uri} failed: {err}");
        return;
    }
    diagnostics::update_for(client, &workspace, &uri).await;
}

pub async fn did_save(
    client: &dyn LanguageClient,
    state: &ServerState,
    params: DidSaveTextDocumentParams,
) {
    let Some(workspace) = state.workspace_opt() else {
        return;
    };
    let uri = params.text_document.uri;
    info!("document saved: {uri}");
    workspace.manager.did_save(&uri);
    diagnostics::update_for(client, &workspace, &uri).await;
}

pub async fn did_close(
    client: &dyn LanguageClient,
    state: &ServerState,
    params: DidCloseTextDocumentParams,
) {
    let Some(workspace) = state.workspace_opt() else {
        return;
    };
    let uri = params.text_document.uri;
    info!("document closed: {uri}");
    if let Err(err) = workspace.manager.did_close(&uri) {
        warn!("didClose for {uri} failed: {err}");
    }
    diagnostics::update_for(client, &workspace, &uri).await;
}
