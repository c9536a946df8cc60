//! The referenced-files resolver.
//!
//! For a file, the deduplicated set of URIs it references through
//! imports, requires and triple-slash directives, resolved with the
//! owning configuration's module resolver against the IMFS. Results are
//! memoized per URI; an unresolvable import is logged and omitted, never
//! fatal.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use url::Url;

use tsls_vfs::{path, InMemoryFileSystem};

use crate::configuration::ProjectConfiguration;
use crate::Result;

#[derive(Default)]
pub struct ReferencedFilesResolver {
    cache: Mutex<FxHashMap<Url, Arc<Vec<Url>>>>,
}

impl ReferencedFilesResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn referenced_files(
        &self,
        fs: &InMemoryFileSystem,
        config: &ProjectConfiguration,
        uri: &Url,
    ) -> Result<Arc<Vec<Url>>> {
        if let Some(cached) = self.cache.lock().get(uri) {
            return Ok(Arc::clone(cached));
        }
        let text = fs.get_content(uri)?;
        let service = config.service()?;
        let info = service.pre_process(&text);

        let mut seen = FxHashSet::default();
        let mut references = Vec::new();
        for specifier in &info.imported_files {
            match service.resolve_module_name(specifier, uri) {
                Some(target) => {
                    if seen.insert(target.clone()) {
                        references.push(target);
                    }
                }
                None => debug!("unresolved import {specifier} in {uri}"),
            }
        }
        for reference in &info.referenced_files {
            match path::resolve(uri, reference) {
                Some(target) => {
                    if seen.insert(target.clone()) {
                        references.push(target);
                    }
                }
                None => debug!("unresolvable reference {reference} in {uri}"),
            }
        }

        let references = Arc::new(references);
        self.cache.lock().insert(uri.clone(), Arc::clone(&references));
        Ok(references)
    }

    /// Drops one memoized entry, or all of them.
    pub fn invalidate(&self, uri: Option<&Url>) {
        let mut cache = self.cache.lock();
        match uri {
            Some(uri) => {
                cache.remove(uri);
            }
            None => cache.clear(),
        }
    }
}
