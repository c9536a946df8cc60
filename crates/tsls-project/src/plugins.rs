//! Language-service plugin loading.
//!
//! Plugins are npm modules that wrap the language service. They are
//! resolved with the backend's own Node-style resolver at a fixed probe
//! order; a plugin that fails to resolve is logged and skipped, it never
//! takes the configuration down.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use tsls_backend::LanguageService;
use tsls_vfs::path;

/// Settings carried in the client's initialization options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginSettings {
    pub global_plugins: Vec<String>,
    pub plugin_probe_locations: Vec<String>,
    pub allow_local_plugin_loads: bool,
}

/// Receives the resolved plugin and the current service, returns the
/// wrapped service.
pub type ApplyProxy =
    dyn Fn(Arc<dyn LanguageService>, &serde_json::Value) -> Arc<dyn LanguageService> + Send + Sync;

/// The loader plus the proxy hook, handed to every configuration.
#[derive(Clone)]
pub struct PluginSupport {
    pub loader: Arc<PluginLoader>,
    pub apply: Arc<ApplyProxy>,
}

pub struct PluginLoader {
    root: Url,
    settings: PluginSettings,
}

impl PluginLoader {
    pub fn new(root: Url, settings: PluginSettings) -> Self {
        Self { root, settings }
    }

    /// Wraps a freshly created service with every configured global
    /// plugin that resolves.
    pub fn wrap(
        &self,
        mut service: Arc<dyn LanguageService>,
        apply: &ApplyProxy,
    ) -> Arc<dyn LanguageService> {
        for name in &self.settings.global_plugins {
            match self.resolve_plugin(service.as_ref(), name) {
                Some(module) => {
                    info!("loaded plugin {name} from {module}");
                    let config = json!({ "name": name, "module": module.to_string() });
                    service = apply(service, &config);
                }
                None => warn!("failed to resolve plugin {name}"),
            }
        }
        service
    }

    /// Probe order: configured probe locations first, then the workspace
    /// root when local loads are allowed.
    fn resolve_plugin(&self, service: &dyn LanguageService, name: &str) -> Option<Url> {
        let mut bases: Vec<Url> = self
            .settings
            .plugin_probe_locations
            .iter()
            .filter_map(|location| path::path_to_uri(location).ok())
            .collect();
        if self.settings.allow_local_plugin_loads {
            bases.push(self.root.clone());
        }
        for base in bases {
            // Anchor resolution at a synthetic file inside the probe
            // directory so the node_modules walk starts there.
            let anchor = path::resolve(&with_trailing_slash(&base), "package.json")?;
            if let Some(found) = service.resolve_module_name(name, &anchor) {
                return Some(found);
            }
        }
        None
    }
}

fn with_trailing_slash(uri: &Url) -> Url {
    if uri.path().ends_with('/') {
        return uri.clone();
    }
    let mut out = uri.clone();
    let new_path = format!("{}/", uri.path());
    out.set_path(&new_path);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tsls_backend::testing::{MapHost, Script, ScriptedBackend};

    fn service_with(files: &[&str]) -> Arc<dyn LanguageService> {
        let mut host = MapHost::new("file:///work");
        for file in files {
            host.insert(file, "module.exports = {};");
        }
        Arc::new(ScriptedBackend::new(Arc::new(host), Arc::new(Script::default())))
    }

    #[test]
    fn resolvable_plugins_are_applied_in_order() {
        let service = service_with(&["file:///work/node_modules/ts-plugin/index.js"]);
        let loader = PluginLoader::new(
            Url::parse("file:///work").unwrap(),
            PluginSettings {
                global_plugins: vec!["ts-plugin".to_string(), "missing-plugin".to_string()],
                plugin_probe_locations: Vec::new(),
                allow_local_plugin_loads: true,
            },
        );
        let applied = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&applied);
        let wrapped = loader.wrap(service, &move |service, config| {
            log.lock().push(config["name"].as_str().unwrap().to_string());
            service
        });
        // The missing plugin is skipped, the resolvable one applied.
        assert_eq!(applied.lock().as_slice(), &["ts-plugin".to_string()]);
        let _ = wrapped;
    }

    #[test]
    fn local_loads_can_be_disabled() {
        let service = service_with(&["file:///work/node_modules/ts-plugin/index.js"]);
        let loader = PluginLoader::new(
            Url::parse("file:///work").unwrap(),
            PluginSettings {
                global_plugins: vec!["ts-plugin".to_string()],
                plugin_probe_locations: Vec::new(),
                allow_local_plugin_loads: false,
            },
        );
        let applied = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&applied);
        let _ = loader.wrap(service, &move |service, config| {
            log.lock().push(config["name"].as_str().unwrap().to_string());
            service
        });
        assert!(applied.lock().is_empty());
    }
}
