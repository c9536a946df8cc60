//! `tsconfig.json` parsing.
//!
//! tsc accepts JSON with comments and trailing commas, so the text is
//! cleaned before it reaches serde. Unknown keys are ignored.

use serde::Deserialize;
use serde_json::Value;

use tsls_backend::CompilerOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TsConfig {
    pub files: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub compiler_options: CompilerOptions,
}

pub fn parse(text: &str) -> Result<TsConfig, String> {
    let cleaned = strip_json_comments(text);
    serde_json::from_str(&cleaned).map_err(|err| err.to_string())
}

pub fn from_value(value: &Value) -> Result<TsConfig, String> {
    serde_json::from_value(value.clone()).map_err(|err| err.to_string())
}

/// Removes `//`/`/* */` comments and trailing commas while leaving string
/// contents untouched.
pub fn strip_json_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    // Only whole ASCII sequences are removed, so working on bytes keeps
    // multi-byte characters intact.
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    let mut in_string = false;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            out.push(b);
            match b {
                b'\\' => {
                    if i + 1 < bytes.len() {
                        out.push(bytes[i + 1]);
                        i += 1;
                    }
                }
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                out.push(b'"');
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b',' => {
                // Drop the comma when the next significant byte closes a
                // container.
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let closes = matches!(bytes.get(j), Some(b'}' | b']'));
                if !closes {
                    out.push(b',');
                }
                i += 1;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_config() {
        let config = parse(
            r#"{
                "compilerOptions": {"module": "commonjs", "allowJs": true},
                "include": ["src/**/*"],
                "exclude": ["dist"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.compiler_options.module.as_deref(), Some("commonjs"));
        assert_eq!(config.include.as_deref(), Some(&["src/**/*".to_string()][..]));
        assert_eq!(config.exclude.as_deref(), Some(&["dist".to_string()][..]));
    }

    #[test]
    fn tolerates_comments_and_trailing_commas() {
        let config = parse(
            "{\n\
               // project files\n\
               \"files\": [\"a.ts\",],\n\
               /* options */\n\
               \"compilerOptions\": {\"strict\": true,},\n\
             }",
        )
        .unwrap();
        assert_eq!(config.files.as_deref(), Some(&["a.ts".to_string()][..]));
        assert_eq!(config.compiler_options.strict, Some(true));
    }

    #[test]
    fn slashes_inside_strings_survive() {
        let config = parse(r#"{"include": ["src//nested/**"]}"#).unwrap();
        assert_eq!(
            config.include.as_deref(),
            Some(&["src//nested/**".to_string()][..])
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse("{\"files\": [").is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert!(parse(r#"{"extends": "./base.json", "compileOnSave": true}"#).is_ok());
    }
}
