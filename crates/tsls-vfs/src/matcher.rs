//! Shell-style file pattern matching for `read_directory`.
//!
//! Patterns follow the tsconfig dialect rather than POSIX globs:
//!
//! - `*` matches any run of characters except `/`, and never a leading `.`
//! - `?` matches one character that is neither `/` nor a leading `.`
//! - `**/` matches any number of path segments that do not begin with `.`;
//!   in an exclude pattern it matches anything
//!
//! Patterns are compiled to anchored regexes once per `read_directory`
//! call and evaluated against root-relative paths.

use regex::{Regex, RegexBuilder};

/// Whether a pattern widens (include) or narrows (exclude) the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Include,
    Exclude,
}

/// Compiles one pattern into an anchored regex.
///
/// Returns `None` for patterns that do not survive compilation; callers
/// skip those the way tsc does.
pub fn compile(pattern: &str, usage: Usage, case_sensitive: bool) -> Option<Regex> {
    let mut source = String::from("^");
    let mut segments = pattern.split('/').peekable();
    let mut pending_separator = false;
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        if segment == "**" {
            if pending_separator {
                source.push('/');
                pending_separator = false;
            }
            if last {
                source.push_str(match usage {
                    Usage::Include => "(?:[^./][^/]*/)*[^./][^/]*",
                    Usage::Exclude => ".*",
                });
            } else {
                // The trailing separator belongs to the repeated group, so
                // the next segment must not add its own.
                match usage {
                    // Any chain of segments not beginning with a dot.
                    Usage::Include => source.push_str("(?:[^./][^/]*/)*"),
                    Usage::Exclude => source.push_str("(?:.*/)?"),
                }
            }
            continue;
        }
        if pending_separator {
            source.push('/');
        }
        push_segment(&mut source, segment);
        pending_separator = true;
    }
    match usage {
        Usage::Include => source.push('$'),
        // An exclude pattern also prunes everything beneath a matched
        // directory.
        Usage::Exclude => source.push_str("(?:$|/)"),
    }
    RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
        .ok()
}

fn push_segment(source: &mut String, segment: &str) {
    let mut at_start = true;
    for ch in segment.chars() {
        match ch {
            '*' => {
                if at_start {
                    source.push_str("(?:[^./][^/]*)?");
                } else {
                    source.push_str("[^/]*");
                }
            }
            '?' => {
                if at_start {
                    source.push_str("[^./]");
                } else {
                    source.push_str("[^/]");
                }
            }
            _ => source.push_str(&regex::escape(&ch.to_string())),
        }
        at_start = false;
    }
}

/// Normalizes an include pattern the way tsconfig does: a pattern naming a
/// directory (no wildcard, no extension) means everything beneath it.
pub fn expand_include(pattern: &str) -> String {
    let trimmed = pattern.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let has_wildcard = trimmed.contains('*') || trimmed.contains('?');
    let has_extension = last.contains('.');
    if !has_wildcard && !has_extension {
        format!("{trimmed}/**/*")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, usage: Usage, path: &str) -> bool {
        compile(pattern, usage, true)
            .map(|re| re.is_match(path))
            .unwrap_or(false)
    }

    #[test]
    fn star_does_not_cross_separators() {
        assert!(matches("src/*.ts", Usage::Include, "src/a.ts"));
        assert!(!matches("src/*.ts", Usage::Include, "src/sub/a.ts"));
    }

    #[test]
    fn star_does_not_match_leading_dot() {
        assert!(!matches("src/*.ts", Usage::Include, "src/.hidden.ts"));
        assert!(matches("src/a*.ts", Usage::Include, "src/a.b.ts"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        assert!(matches("?.ts", Usage::Include, "a.ts"));
        assert!(!matches("?.ts", Usage::Include, "ab.ts"));
        assert!(!matches("?.ts", Usage::Include, ".ts"));
    }

    #[test]
    fn double_star_spans_segments() {
        assert!(matches("**/*.ts", Usage::Include, "a.ts"));
        assert!(matches("**/*.ts", Usage::Include, "a/b/c.ts"));
        assert!(!matches("**/*.ts", Usage::Include, "a/.cache/c.ts"));
    }

    #[test]
    fn double_star_in_excludes_matches_dotted_segments() {
        assert!(matches("**/tmp", Usage::Exclude, "a/.cache/tmp"));
        assert!(matches("**/tmp", Usage::Exclude, "tmp"));
    }

    #[test]
    fn exclude_prunes_subtrees() {
        assert!(matches("node_modules", Usage::Exclude, "node_modules/a/b.ts"));
        assert!(!matches("node_modules", Usage::Exclude, "src/a.ts"));
    }

    #[test]
    fn case_sensitivity_is_a_flag() {
        assert!(!matches("SRC/*.ts", Usage::Include, "src/a.ts"));
        let re = compile("SRC/*.ts", Usage::Include, false).unwrap();
        assert!(re.is_match("src/a.ts"));
    }

    #[test]
    fn directory_includes_expand_recursively() {
        assert_eq!(expand_include("src"), "src/**/*");
        assert_eq!(expand_include("src/*.ts"), "src/*.ts");
        assert_eq!(expand_include("lib/main.ts"), "lib/main.ts");
    }
}
