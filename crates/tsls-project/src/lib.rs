//! `tsls-project` - the project model and request-fulfillment engine.
//!
//! The [`ProjectManager`] is the gate to all compiler work: it partitions
//! the workspace into sub-projects from `tsconfig.json`/`jsconfig.json`
//! files, lazily materializes content through the file-system updater,
//! and drives one analysis backend per [`ProjectConfiguration`]. Request
//! handlers call an `ensure_*` level, then read through the manager.

pub mod configuration;
pub mod files;
pub mod manager;
pub mod packages;
pub mod partition;
pub mod plugins;
pub mod resolver;
pub mod tsconfig;

pub use configuration::{InitState, ProjectConfiguration, ProjectHost};
pub use manager::ProjectManager;
pub use plugins::{PluginLoader, PluginSettings, PluginSupport};

use url::Url;

/// Errors surfaced by the project model.
///
/// Cloneable because ensure results are fanned out through shared futures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectError {
    /// The request's cancellation token fired; propagated without logging.
    #[error("request was cancelled")]
    Cancelled,
    #[error(transparent)]
    FileSystem(#[from] tsls_vfs::FileSystemError),
    #[error(transparent)]
    Backend(#[from] tsls_backend::BackendError),
    /// The configuration file failed to parse; the configuration stays
    /// uninitialized while its siblings keep serving.
    #[error("failed to parse {uri}: {message}")]
    ConfigParse { uri: Url, message: String },
    #[error("no configuration found for {0}")]
    NoConfiguration(Url),
}

pub type Result<T> = std::result::Result<T, ProjectError>;
