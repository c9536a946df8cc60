//! The bundled standard-library declarations.
//!
//! Trimmed extracts of the compiler's default libraries ship with the
//! binary, are loaded once at startup into an immutable [`LibrarySet`],
//! and are shared by reference with every configuration. They surface
//! under `git://` URIs so they can never collide with workspace paths.

use tsls_vfs::LibrarySet;

/// The compiler version the bundled declarations were extracted from;
/// also the version tag in their URIs.
pub const TYPESCRIPT_VERSION: &str = "5.4.5";

pub fn bundled_libraries() -> LibrarySet {
    let mut libraries = LibrarySet::new(TYPESCRIPT_VERSION);
    libraries.insert("lib.d.ts", include_str!("../assets/lib.d.ts"));
    libraries.insert("lib.dom.d.ts", include_str!("../assets/lib.dom.d.ts"));
    libraries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_default_lib_is_bundled() {
        let libraries = bundled_libraries();
        let content = libraries
            .get(&libraries.default_lib_uri())
            .expect("lib.d.ts ships with the binary");
        assert!(content.contains("declare function parseInt"));
        assert!(libraries
            .default_lib_uri()
            .as_str()
            .contains(TYPESCRIPT_VERSION));
    }

    #[test]
    fn ambient_dom_globals_are_present() {
        let libraries = bundled_libraries();
        let dom = libraries
            .get(&libraries.uri_for("lib.dom.d.ts"))
            .expect("lib.dom.d.ts ships with the binary");
        assert!(dom.contains("declare var console"));
    }
}
