//! LSP conversion helpers.

use tower_lsp::lsp_types::{
    CompletionItemKind, DiagnosticSeverity, Location, Position, Range, SymbolKind, Url,
};

use tsls_backend::{DiagnosticCategory, TextSpan};
use tsls_vfs::InMemoryFileSystem;

/// Byte offset to line/character, walking whole lines rather than
/// individual characters. An offset on a newline maps to the end of its
/// line; an offset past the text maps to the end of the text.
pub(crate) fn offset_to_position(content: &str, offset: u32) -> Position {
    let mut target = (offset as usize).min(content.len());
    while target > 0 && !content.is_char_boundary(target) {
        target -= 1;
    }
    let mut line_start = 0usize;
    let mut line = 0u32;
    for row in content.split_inclusive('\n') {
        let line_end = line_start + row.len();
        let in_row = target < line_end || (!row.ends_with('\n') && target == line_end);
        if in_row {
            let character = content[line_start..target].chars().count() as u32;
            return Position { line, character };
        }
        line += 1;
        line_start = line_end;
    }
    // Past a trailing newline (or the text is empty): a fresh line.
    Position { line, character: 0 }
}

/// Line/character back to a byte offset. A character past the end of its
/// line clamps to the line end; a line past the text is `None`.
pub(crate) fn position_to_offset(content: &str, position: Position) -> Option<u32> {
    let mut line_start = 0usize;
    let mut line = 0u32;
    for row in content.split_inclusive('\n') {
        if line == position.line {
            let text = row.strip_suffix('\n').unwrap_or(row);
            let within = text
                .char_indices()
                .nth(position.character as usize)
                .map_or(text.len(), |(idx, _)| idx);
            return Some((line_start + within) as u32);
        }
        line += 1;
        line_start += row.len();
    }
    // The line after a trailing newline addresses the end of the text.
    if line == position.line && (content.is_empty() || content.ends_with('\n')) {
        return Some(content.len() as u32);
    }
    None
}

pub(crate) fn span_to_range(content: &str, span: TextSpan) -> Range {
    Range {
        start: offset_to_position(content, span.start),
        end: offset_to_position(content, span.end()),
    }
}

/// A protocol location for a span in some file, reading the target's text
/// for position mapping. `None` when the content is not available.
pub(crate) fn location_for(fs: &InMemoryFileSystem, uri: &Url, span: TextSpan) -> Option<Location> {
    let content = fs.get_content(uri).ok()?;
    Some(Location {
        uri: uri.clone(),
        range: span_to_range(&content, span),
    })
}

/// Maps the backend's script-element kinds onto LSP symbol kinds.
pub(crate) fn symbol_kind(kind: &str) -> SymbolKind {
    match kind {
        "module" => SymbolKind::MODULE,
        "class" => SymbolKind::CLASS,
        "interface" => SymbolKind::INTERFACE,
        "enum" => SymbolKind::ENUM,
        "function" => SymbolKind::FUNCTION,
        "method" => SymbolKind::METHOD,
        "constructor" => SymbolKind::CONSTRUCTOR,
        "property" | "getter" | "setter" => SymbolKind::PROPERTY,
        "const" | "let" | "var" => SymbolKind::VARIABLE,
        "type" | "type alias" => SymbolKind::TYPE_PARAMETER,
        _ => SymbolKind::VARIABLE,
    }
}

/// Maps the backend's completion-entry kinds onto LSP item kinds.
pub(crate) fn completion_kind(kind: &str) -> CompletionItemKind {
    match kind {
        "class" => CompletionItemKind::CLASS,
        "interface" => CompletionItemKind::INTERFACE,
        "enum" => CompletionItemKind::ENUM,
        "function" => CompletionItemKind::FUNCTION,
        "method" | "constructor" => CompletionItemKind::METHOD,
        "property" | "getter" | "setter" => CompletionItemKind::PROPERTY,
        "module" => CompletionItemKind::MODULE,
        "keyword" => CompletionItemKind::KEYWORD,
        "type" | "type alias" => CompletionItemKind::REFERENCE,
        _ => CompletionItemKind::VARIABLE,
    }
}

pub(crate) fn severity(category: DiagnosticCategory) -> DiagnosticSeverity {
    match category {
        DiagnosticCategory::Error => DiagnosticSeverity::ERROR,
        DiagnosticCategory::Warning => DiagnosticSeverity::WARNING,
        DiagnosticCategory::Message | DiagnosticCategory::Suggestion => {
            DiagnosticSeverity::INFORMATION
        }
    }
}
