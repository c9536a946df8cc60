//! Path and URI conversions.
//!
//! The wire protocol speaks URIs while compiler hosts and configuration
//! files speak file paths. Conversions are done at this boundary once,
//! never by keeping parallel maps. Two URIs refer to the same resource
//! exactly when their normalized strings are equal: hex escapes are
//! lowercased, separators are forward slashes, and a Windows drive letter
//! is preserved as authored.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::{FileSystemError, Result};

/// Characters escaped inside the path portion of a `file://` URI.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Converts an absolute file path to a `file://` URI.
///
/// Backslashes are normalized to forward slashes and a Windows drive path
/// (`c:\x`) gains the extra leading slash (`file:///c:/x`).
pub fn path_to_uri(path: &str) -> Result<Url> {
    let mut normalized = path.replace('\\', "/");
    if !normalized.starts_with('/') {
        if starts_with_drive_letter(&normalized) {
            normalized.insert(0, '/');
        } else {
            return Err(FileSystemError::InvalidPath(path.to_string()));
        }
    }
    let encoded: String = normalized
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SET).to_string())
        .collect::<Vec<_>>()
        .join("/");
    let raw = format!("file://{}", lowercase_hex_escapes(&encoded));
    Url::parse(&raw).map_err(|_| FileSystemError::InvalidPath(path.to_string()))
}

/// Converts a `file://` URI back to a file path.
///
/// The inverse of [`path_to_uri`]: a `/c:/…` path loses its leading slash
/// so it round-trips as a Windows drive path.
pub fn uri_to_path(uri: &Url) -> Result<String> {
    if uri.scheme() != "file" {
        return Err(FileSystemError::InvalidPath(uri.to_string()));
    }
    let decoded = percent_decode_str(uri.path()).decode_utf8_lossy();
    let path = decoded.as_ref();
    if let Some(stripped) = path.strip_prefix('/') {
        if starts_with_drive_letter(stripped) {
            return Ok(stripped.to_string());
        }
    }
    Ok(path.to_string())
}

/// Lowercases every `%XX` escape so URI equality is plain string equality.
pub fn lowercase_hex_escapes(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = String::with_capacity(uri.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let a = bytes[i + 1];
            let b = bytes[i + 2];
            if a.is_ascii_hexdigit() && b.is_ascii_hexdigit() {
                out.push('%');
                out.push(a.to_ascii_lowercase() as char);
                out.push(b.to_ascii_lowercase() as char);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn starts_with_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Resolves a relative module specifier against the file that contains it.
pub fn resolve(containing_file: &Url, reference: &str) -> Option<Url> {
    containing_file
        .join(reference)
        .ok()
        .map(|url| normalize(&url))
}

/// Re-parses a URI through the normalization rules.
pub fn normalize(uri: &Url) -> Url {
    let lowered = lowercase_hex_escapes(uri.as_str());
    Url::parse(&lowered).unwrap_or_else(|_| uri.clone())
}

/// The directory portion of a URI, without a trailing slash.
pub fn dirname(uri: &Url) -> Url {
    let mut dir = uri.clone();
    {
        let path = dir.path();
        let parent = match path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => path[..idx].to_string(),
        };
        dir.set_path(&parent);
    }
    dir
}

/// The final path segment of a URI.
pub fn basename(uri: &Url) -> String {
    let path = uri.path();
    let name = path.rsplit('/').next().unwrap_or(path);
    percent_decode_str(name).decode_utf8_lossy().into_owned()
}

/// Returns true when any path segment of `uri` equals `segment`.
pub fn has_segment(uri: &Url, segment: &str) -> bool {
    uri.path().split('/').any(|part| part == segment)
}

/// The path of `uri` relative to the directory URI `root`, if `uri` is
/// beneath it.
pub fn relative_to(root: &Url, uri: &Url) -> Option<String> {
    if root.scheme() != uri.scheme() || root.authority() != uri.authority() {
        return None;
    }
    let root_path = root.path().trim_end_matches('/');
    let path = uri.path();
    let rest = path.strip_prefix(root_path)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    rest.strip_prefix('/').map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_to_uri_roundtrip() {
        let uri = path_to_uri("/foo/bar.ts").unwrap();
        assert_eq!(uri.as_str(), "file:///foo/bar.ts");
        assert_eq!(uri_to_path(&uri).unwrap(), "/foo/bar.ts");
    }

    #[test]
    fn path_to_uri_escapes_reserved_characters() {
        let uri = path_to_uri("/dir with space/file #1.ts").unwrap();
        assert_eq!(uri.as_str(), "file:///dir%20with%20space/file%20%231.ts");
        assert_eq!(uri_to_path(&uri).unwrap(), "/dir with space/file #1.ts");
    }

    #[test]
    fn windows_drive_gains_leading_slash() {
        let uri = path_to_uri("c:\\work\\a.ts").unwrap();
        assert_eq!(uri.as_str(), "file:///c:/work/a.ts");
        assert_eq!(uri_to_path(&uri).unwrap(), "c:/work/a.ts");
    }

    #[test]
    fn drive_letter_case_is_preserved() {
        let upper = path_to_uri("C:/work/a.ts").unwrap();
        assert_eq!(upper.as_str(), "file:///C:/work/a.ts");
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(path_to_uri("foo/bar.ts").is_err());
    }

    #[test]
    fn hex_escapes_are_lowercased() {
        assert_eq!(
            lowercase_hex_escapes("file:///a%2Fb%3f"),
            "file:///a%2fb%3f"
        );
    }

    #[test]
    fn resolve_is_relative_to_the_containing_directory() {
        let base = Url::parse("file:///src/foo/c.ts").unwrap();
        let resolved = resolve(&base, "./b").unwrap();
        assert_eq!(resolved.as_str(), "file:///src/foo/b");
        let up = resolve(&base, "../util").unwrap();
        assert_eq!(up.as_str(), "file:///src/util");
    }

    #[test]
    fn dirname_and_basename() {
        let uri = Url::parse("file:///src/foo/c.ts").unwrap();
        assert_eq!(dirname(&uri).as_str(), "file:///src/foo");
        assert_eq!(basename(&uri), "c.ts");
        assert_eq!(dirname(&dirname(&dirname(&uri))).as_str(), "file:///");
    }

    #[test]
    fn has_segment_matches_whole_segments() {
        let uri = Url::parse("file:///a/node_modules/b/c.ts").unwrap();
        assert!(has_segment(&uri, "node_modules"));
        assert!(!has_segment(&uri, "node_module"));
    }

    #[test]
    fn relative_to_strips_the_root() {
        let root = Url::parse("file:///work/project").unwrap();
        let uri = Url::parse("file:///work/project/src/a.ts").unwrap();
        assert_eq!(relative_to(&root, &uri).unwrap(), "src/a.ts");
        let outside = Url::parse("file:///other/a.ts").unwrap();
        assert!(relative_to(&root, &outside).is_none());
    }
}
