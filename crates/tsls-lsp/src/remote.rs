//! The strict-mode remote file system.
//!
//! In strict mode the client owns the workspace: content comes through
//! `textDocument/xcontent` and the file listing through
//! `workspace/xfiles`. Outside strict mode the local disk serves the same
//! trait (see `tsls_vfs::LocalFileSystem`).

use async_trait::async_trait;
use tower_lsp::lsp_types::{TextDocumentIdentifier, Url};
use tower_lsp::Client;

use tsls_vfs::{FileSystemError, RemoteFileSystem};

use crate::ext::{ContentParams, ContentRequest, FilesParams, FilesRequest};

pub struct ClientFileSystem {
    client: Client,
}

impl ClientFileSystem {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteFileSystem for ClientFileSystem {
    async fn read_file(&self, uri: &Url) -> tsls_vfs::Result<String> {
        let item = self
            .client
            .send_request::<ContentRequest>(ContentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await
            .map_err(|err| FileSystemError::Remote(err.to_string()))?;
        Ok(item.text)
    }

    async fn workspace_files(&self, base: Option<&Url>) -> tsls_vfs::Result<Vec<Url>> {
        let identifiers = self
            .client
            .send_request::<FilesRequest>(FilesParams {
                base: base.map(|uri| uri.to_string()),
            })
            .await
            .map_err(|err| FileSystemError::Remote(err.to_string()))?;
        Ok(identifiers
            .into_iter()
            .map(|identifier| identifier.uri)
            .collect())
    }
}
