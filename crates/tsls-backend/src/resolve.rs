//! Node-style module resolution against a language-service host.
//!
//! Resolution never touches disk: existence checks go through the host,
//! which answers from the IMFS. That means a specifier only resolves once
//! the files it lands on have been registered, which is exactly the
//! ordering the ensure pipeline provides.

use serde::Deserialize;
use url::Url;

use tsls_vfs::path;

use crate::types::CompilerOptions;
use crate::LanguageServiceHost;

const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts", ".js", ".jsx"];

pub fn resolve_module_name(
    host: &dyn LanguageServiceHost,
    specifier: &str,
    containing: &Url,
    options: &CompilerOptions,
) -> Option<Url> {
    if specifier.starts_with("./") || specifier.starts_with("../") {
        let candidate = path::resolve(containing, specifier)?;
        return probe(host, &candidate);
    }
    if let Some(absolute) = specifier.strip_prefix('/') {
        let candidate = join(&host.current_directory(), absolute);
        return probe(host, &candidate);
    }
    if let Some(base_url) = &options.base_url {
        let base = join(&host.current_directory(), base_url.trim_matches('/'));
        if let Some(found) = probe(host, &join(&base, specifier)) {
            return Some(found);
        }
    }
    resolve_node_module(host, specifier, containing)
}

fn resolve_node_module(
    host: &dyn LanguageServiceHost,
    specifier: &str,
    containing: &Url,
) -> Option<Url> {
    let mut dir = path::dirname(containing);
    loop {
        let base = join(&dir, &format!("node_modules/{specifier}"));
        if let Some(found) = probe_package(host, &base) {
            return Some(found);
        }
        let types = join(&dir, &format!("node_modules/@types/{specifier}"));
        if let Some(found) = probe_package(host, &types) {
            return Some(found);
        }
        let parent = path::dirname(&dir);
        if parent.path() == dir.path() {
            return None;
        }
        dir = parent;
    }
}

fn probe_package(host: &dyn LanguageServiceHost, base: &Url) -> Option<Url> {
    if let Some(found) = probe_file(host, base) {
        return Some(found);
    }
    let manifest_uri = join(base, "package.json");
    if let Some(text) = host.script_snapshot(&manifest_uri) {
        #[derive(Deserialize)]
        struct Manifest {
            main: Option<String>,
            types: Option<String>,
            typings: Option<String>,
        }
        if let Ok(manifest) = serde_json::from_str::<Manifest>(&text) {
            for entry in [manifest.types, manifest.typings, manifest.main]
                .into_iter()
                .flatten()
            {
                if let Some(entry_uri) = path::resolve(&manifest_uri, &entry) {
                    if let Some(found) = probe_file(host, &entry_uri) {
                        return Some(found);
                    }
                }
            }
        }
    }
    probe_file(host, &join(base, "index"))
}

/// A file probe plus the `<dir>/index.*` directory fallback.
fn probe(host: &dyn LanguageServiceHost, candidate: &Url) -> Option<Url> {
    probe_file(host, candidate).or_else(|| probe_file(host, &join(candidate, "index")))
}

fn probe_file(host: &dyn LanguageServiceHost, candidate: &Url) -> Option<Url> {
    if has_known_extension(candidate) && host.file_exists(candidate) {
        return Some(candidate.clone());
    }
    for extension in EXTENSIONS {
        let with_extension = with_suffix(candidate, extension);
        if host.file_exists(&with_extension) {
            return Some(with_extension);
        }
    }
    None
}

fn has_known_extension(uri: &Url) -> bool {
    let name = path::basename(uri);
    EXTENSIONS.iter().any(|ext| name.ends_with(ext)) || name.ends_with(".json")
}

fn with_suffix(uri: &Url, suffix: &str) -> Url {
    let mut out = uri.clone();
    let new_path = format!("{}{suffix}", uri.path());
    out.set_path(&new_path);
    out
}

fn join(dir: &Url, rest: &str) -> Url {
    let mut out = dir.clone();
    let new_path = format!("{}/{rest}", dir.path().trim_end_matches('/'));
    out.set_path(&new_path);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapHost;

    fn host(files: &[&str]) -> MapHost {
        let mut host = MapHost::new("file:///work");
        for file in files {
            host.insert(file, "");
        }
        host
    }

    fn resolve(host: &MapHost, specifier: &str, containing: &str) -> Option<String> {
        resolve_module_name(
            host,
            specifier,
            &Url::parse(containing).unwrap(),
            &CompilerOptions::default(),
        )
        .map(|uri| uri.to_string())
    }

    #[test]
    fn relative_specifiers_probe_extensions() {
        let host = host(&["file:///work/src/b.ts"]);
        assert_eq!(
            resolve(&host, "./b", "file:///work/src/c.ts").as_deref(),
            Some("file:///work/src/b.ts")
        );
    }

    #[test]
    fn relative_specifiers_fall_back_to_index_files() {
        let host = host(&["file:///work/src/util/index.ts"]);
        assert_eq!(
            resolve(&host, "./util", "file:///work/src/c.ts").as_deref(),
            Some("file:///work/src/util/index.ts")
        );
    }

    #[test]
    fn bare_specifiers_walk_node_modules_upwards() {
        let host = host(&["file:///work/node_modules/left-pad/index.js"]);
        assert_eq!(
            resolve(&host, "left-pad", "file:///work/src/deep/c.ts").as_deref(),
            Some("file:///work/node_modules/left-pad/index.js")
        );
    }

    #[test]
    fn package_json_main_is_honored() {
        let mut host = host(&["file:///work/node_modules/lib/dist/entry.js"]);
        host.insert(
            "file:///work/node_modules/lib/package.json",
            r#"{"name": "lib", "main": "dist/entry.js"}"#,
        );
        assert_eq!(
            resolve(&host, "lib", "file:///work/src/c.ts").as_deref(),
            Some("file:///work/node_modules/lib/dist/entry.js")
        );
    }

    #[test]
    fn at_types_packages_are_probed() {
        let host = host(&["file:///work/node_modules/@types/node/index.d.ts"]);
        assert_eq!(
            resolve(&host, "node", "file:///work/src/c.ts").as_deref(),
            Some("file:///work/node_modules/@types/node/index.d.ts")
        );
    }

    #[test]
    fn unresolved_specifiers_return_none() {
        let host = host(&[]);
        assert_eq!(resolve(&host, "missing", "file:///work/src/c.ts"), None);
    }
}
