//! `tsls-vfs` - virtual file system for the tsls language server.
//!
//! The server never reads workspace content from disk directly while
//! answering requests. Everything goes through an [`InMemoryFileSystem`]
//! that is populated lazily from a [`RemoteFileSystem`] by the
//! [`FileSystemUpdater`]. Unsaved editor edits live in an overlay that
//! shadows fetched content until the document is saved or closed.

pub mod imfs;
pub mod libraries;
pub mod matcher;
pub mod path;
pub mod remote;
pub mod updater;

pub use imfs::{DirEntries, InMemoryFileSystem};
pub use libraries::LibrarySet;
pub use remote::{LocalFileSystem, RemoteFileSystem};
pub use updater::FileSystemUpdater;
pub use url::Url;

/// Errors surfaced by the file-system layer.
///
/// `Clone` is deliberate: fetch results are memoized as shared futures and
/// every waiter receives its own copy of the outcome.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FileSystemError {
    /// Content or structure was requested before it was ensured.
    #[error("content for {0} is not available")]
    NotAvailable(Url),
    /// The backing store failed to serve a request.
    #[error("remote file system error: {0}")]
    Remote(String),
    /// A path could not be expressed as a URI (or vice versa).
    #[error("invalid path or URI: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, FileSystemError>;
