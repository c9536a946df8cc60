//! File classification predicates used across the project model.

use url::Url;

use tsls_vfs::path;

pub const CONFIG_FILE_NAMES: &[&str] = &["tsconfig.json", "jsconfig.json"];

const SOURCE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

pub fn is_js_ts_file(uri: &Url) -> bool {
    let name = path::basename(uri);
    SOURCE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

pub fn is_declaration_file(uri: &Url) -> bool {
    path::basename(uri).ends_with(".d.ts")
}

pub fn is_config_file(uri: &Url) -> bool {
    let name = path::basename(uri);
    CONFIG_FILE_NAMES.contains(&name.as_str())
}

pub fn is_package_json(uri: &Url) -> bool {
    path::basename(uri) == "package.json"
}

/// Whether the file lives under a `node_modules/` segment.
pub fn is_dependency_file(uri: &Url) -> bool {
    path::has_segment(uri, "node_modules")
}

/// Declaration files that contribute globals to every program: ambient
/// `globals?.d.ts` files, the tslib shim, typings shipped under
/// `@types/<pkg>/` or `typings/`, and legacy `tsd.d.ts` bundles.
pub fn is_global_declaration(uri: &Url) -> bool {
    let name = path::basename(uri);
    if name == "global.d.ts" || name == "globals.d.ts" || name == "tsd.d.ts" {
        return true;
    }
    if uri.path().ends_with("/tslib/tslib.d.ts") {
        return true;
    }
    if name.ends_with(".d.ts")
        && (path::has_segment(uri, "@types") || path::has_segment(uri, "typings"))
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn source_files_by_extension() {
        assert!(is_js_ts_file(&uri("file:///a/b.ts")));
        assert!(is_js_ts_file(&uri("file:///a/b.tsx")));
        assert!(is_js_ts_file(&uri("file:///a/b.jsx")));
        assert!(!is_js_ts_file(&uri("file:///a/b.json")));
        assert!(is_declaration_file(&uri("file:///a/b.d.ts")));
        assert!(!is_declaration_file(&uri("file:///a/b.ts")));
    }

    #[test]
    fn config_and_package_files() {
        assert!(is_config_file(&uri("file:///a/tsconfig.json")));
        assert!(is_config_file(&uri("file:///a/jsconfig.json")));
        assert!(!is_config_file(&uri("file:///a/tsconfig.base.json")));
        assert!(is_package_json(&uri("file:///a/package.json")));
    }

    #[test]
    fn global_declarations() {
        assert!(is_global_declaration(&uri("file:///a/globals.d.ts")));
        assert!(is_global_declaration(&uri("file:///a/global.d.ts")));
        assert!(is_global_declaration(&uri(
            "file:///a/node_modules/tslib/tslib.d.ts"
        )));
        assert!(is_global_declaration(&uri(
            "file:///a/node_modules/@types/node/index.d.ts"
        )));
        assert!(is_global_declaration(&uri("file:///a/typings/jquery.d.ts")));
        assert!(is_global_declaration(&uri("file:///a/tsd.d.ts")));
        assert!(!is_global_declaration(&uri(
            "file:///a/node_modules/lib/index.d.ts"
        )));
        assert!(!is_global_declaration(&uri("file:///a/src/main.ts")));
    }

    #[test]
    fn dependency_files() {
        assert!(is_dependency_file(&uri("file:///a/node_modules/x/y.ts")));
        assert!(!is_dependency_file(&uri("file:///a/src/y.ts")));
    }
}
