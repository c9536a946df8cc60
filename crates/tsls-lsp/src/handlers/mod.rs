//! LSP request handlers.
//!
//! This module wires handler submodules together and owns the mapping
//! from project-model errors to JSON-RPC errors.

pub mod diagnostics;
pub mod features;
mod lsp_utils;
pub mod sync;
pub mod workspace;

use tower_lsp::jsonrpc;
use tracing::warn;

use tsls_project::ProjectError;

/// LSP `RequestCancelled`.
const REQUEST_CANCELLED: i64 = -32800;

/// Maps a project-model failure onto the wire. Cancellations pass
/// through silently; everything else is logged.
pub(crate) fn to_rpc_error(err: impl Into<ProjectError>) -> jsonrpc::Error {
    match err.into() {
        ProjectError::Cancelled => jsonrpc::Error {
            code: jsonrpc::ErrorCode::ServerError(REQUEST_CANCELLED),
            message: "request cancelled".into(),
            data: None,
        },
        other => {
            warn!("request failed: {other}");
            jsonrpc::Error {
                code: jsonrpc::ErrorCode::InternalError,
                message: other.to_string().into(),
                data: None,
            }
        }
    }
}
