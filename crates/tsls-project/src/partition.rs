//! Workspace partitioning into sub-projects.
//!
//! A sub-project exists wherever a `tsconfig.json` or `jsconfig.json`
//! sits outside `node_modules/`. The partitioner only discovers the
//! roots; the manager owns the configuration arena.

use url::Url;

use tsls_vfs::{path, InMemoryFileSystem};

use crate::files;

/// Every config file in the IMFS with the directory that will key its
/// configuration, deepest directories first.
pub fn config_file_directories(fs: &InMemoryFileSystem) -> Vec<(String, Url)> {
    let mut found: Vec<(String, Url)> = fs
        .uris()
        .into_iter()
        .filter(|uri| files::is_config_file(uri) && !files::is_dependency_file(uri))
        .filter_map(|uri| {
            let dir = path::dirname(&uri);
            let key = path::uri_to_path(&dir).ok()?;
            Some((key, uri))
        })
        .collect();
    // Deepest first, and tsconfig ahead of jsconfig in one directory so
    // the first insert wins.
    found.sort_by(|a, b| {
        let depth_a = a.0.matches('/').count();
        let depth_b = b.0.matches('/').count();
        depth_b
            .cmp(&depth_a)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| b.1.as_str().cmp(a.1.as_str()))
    });
    found
}
