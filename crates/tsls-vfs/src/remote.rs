//! The backing store the workspace is synchronized from.
//!
//! In strict mode the client holds the source of truth and the server
//! fetches through LSP extension requests (that implementation lives with
//! the transport). Outside strict mode a [`LocalFileSystem`] serves the
//! same interface straight from disk, relative to the workspace root.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

use crate::path;
use crate::{FileSystemError, Result};

/// Read access to the remote workspace.
#[async_trait]
pub trait RemoteFileSystem: Send + Sync {
    /// Fetches the full text of one file.
    async fn read_file(&self, uri: &Url) -> Result<String>;

    /// Enumerates every file in the workspace, optionally below `base`.
    async fn workspace_files(&self, base: Option<&Url>) -> Result<Vec<Url>>;
}

/// Serves workspace content from the local disk.
pub struct LocalFileSystem {
    root: PathBuf,
    root_uri: Url,
}

impl LocalFileSystem {
    pub fn new(root_uri: &Url) -> Result<Self> {
        let root = PathBuf::from(path::uri_to_path(root_uri)?);
        Ok(Self {
            root,
            root_uri: path::normalize(root_uri),
        })
    }

    fn to_disk_path(&self, uri: &Url) -> Result<PathBuf> {
        let relative = path::relative_to(&self.root_uri, uri)
            .ok_or_else(|| FileSystemError::InvalidPath(uri.to_string()))?;
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RemoteFileSystem for LocalFileSystem {
    async fn read_file(&self, uri: &Url) -> Result<String> {
        let disk_path = self.to_disk_path(uri)?;
        tokio::fs::read_to_string(&disk_path)
            .await
            .map_err(|err| FileSystemError::Remote(format!("{}: {err}", disk_path.display())))
    }

    async fn workspace_files(&self, base: Option<&Url>) -> Result<Vec<Url>> {
        let walk_root = match base {
            Some(base) => self.to_disk_path(base)?,
            None => self.root.clone(),
        };
        let root = self.root.clone();
        let root_uri = self.root_uri.clone();
        tokio::task::spawn_blocking(move || walk(&walk_root, &root, &root_uri))
            .await
            .map_err(|err| FileSystemError::Remote(err.to_string()))?
    }
}

fn walk(walk_root: &Path, root: &Path, root_uri: &Url) -> Result<Vec<Url>> {
    let mut uris = Vec::new();
    let root_path = path::uri_to_path(root_uri)?;
    let walker = walkdir::WalkDir::new(walk_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            // Dot-directories such as .git never reach the project model;
            // node_modules does, because dependency files are ensured
            // through the same path as workspace files.
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.'))
        });
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(relative) = relative.to_str() else {
            continue;
        };
        let mut joined = root_path.trim_end_matches('/').to_string();
        joined.push('/');
        joined.push_str(&relative.replace('\\', "/"));
        if let Ok(uri) = path::path_to_uri(&joined) {
            uris.push(uri);
        }
    }
    Ok(uris)
}
