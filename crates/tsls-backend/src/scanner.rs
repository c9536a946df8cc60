//! The lexical reference backend.
//!
//! A real type checker plugs in behind [`LanguageService`]; this backend
//! answers the same queries from token streams and per-file declaration
//! tables. It is accurate for declaration-shaped questions (outlines,
//! same-name definition lookup, occurrence scans) and makes no attempt at
//! type inference.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use url::Url;

use tsls_vfs::path;

use crate::lex::{self, LexError, Token, TokenKind};
use crate::resolve;
use crate::types::{
    CompletionEntry, DefinitionSpan, DiagnosticCategory, DiagnosticItem, IdentifierOccurrence,
    NavigateToItem, NavigationTree, PreProcessedFile, QuickInfo, ReferenceEntry, SymbolDescriptor,
    TextSpan,
};
use crate::{BackendError, BackendFactory, LanguageService, LanguageServiceHost, Result};

pub struct ScannerBackendFactory;

impl BackendFactory for ScannerBackendFactory {
    fn create(&self, host: Arc<dyn LanguageServiceHost>) -> Result<Arc<dyn LanguageService>> {
        Ok(Arc::new(ScannerBackend::new(host)))
    }
}

/// One declaration found by scanning.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: String,
    pub name_span: TextSpan,
    pub decl_span: TextSpan,
    pub container: Option<(String, String)>,
    pub display: String,
    pub documentation: String,
}

struct FileAnalysis {
    tokens: Vec<Token>,
    declarations: Vec<Declaration>,
    lex_errors: Vec<LexError>,
}

struct CacheEntry {
    version: i64,
    analysis: Arc<FileAnalysis>,
}

pub struct ScannerBackend {
    host: Arc<dyn LanguageServiceHost>,
    cache: Mutex<FxHashMap<Url, CacheEntry>>,
}

impl ScannerBackend {
    pub fn new(host: Arc<dyn LanguageServiceHost>) -> Self {
        Self {
            host,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    fn analysis(&self, uri: &Url) -> Result<Arc<FileAnalysis>> {
        let version = self.host.script_version(uri);
        if let Some(entry) = self.cache.lock().get(uri) {
            if entry.version == version {
                return Ok(Arc::clone(&entry.analysis));
            }
        }
        let text = self
            .host
            .script_snapshot(uri)
            .ok_or_else(|| BackendError::UnknownFile(uri.clone()))?;
        let (tokens, lex_errors) = lex::tokenize(&text);
        let declarations = extract_declarations(&text, &tokens);
        let analysis = Arc::new(FileAnalysis {
            tokens,
            declarations,
            lex_errors,
        });
        self.cache.lock().insert(
            uri.clone(),
            CacheEntry {
                version,
                analysis: Arc::clone(&analysis),
            },
        );
        Ok(analysis)
    }

    /// Declarations with this name: same file first, then the rest of the
    /// program.
    fn find_definitions(&self, uri: &Url, name: &str) -> Result<Vec<(Url, Declaration)>> {
        let local = self.analysis(uri)?;
        let mut found: Vec<(Url, Declaration)> = local
            .declarations
            .iter()
            .filter(|decl| decl.name == name)
            .map(|decl| (uri.clone(), decl.clone()))
            .collect();
        if !found.is_empty() {
            return Ok(found);
        }
        for file in self.host.script_file_names() {
            if file == *uri {
                continue;
            }
            let Ok(analysis) = self.analysis(&file) else {
                continue;
            };
            found.extend(
                analysis
                    .declarations
                    .iter()
                    .filter(|decl| decl.name == name)
                    .map(|decl| (file.clone(), decl.clone())),
            );
        }
        Ok(found)
    }
}

impl LanguageService for ScannerBackend {
    fn definitions_at(&self, uri: &Url, offset: u32) -> Result<Vec<DefinitionSpan>> {
        let analysis = self.analysis(uri)?;
        let Some(ident) = lex::identifier_at(&analysis.tokens, offset) else {
            return Ok(Vec::new());
        };
        Ok(self
            .find_definitions(uri, &ident.text)?
            .into_iter()
            .map(|(file, decl)| DefinitionSpan {
                uri: file,
                span: decl.decl_span,
            })
            .collect())
    }

    fn quick_info_at(&self, uri: &Url, offset: u32) -> Result<Option<QuickInfo>> {
        let analysis = self.analysis(uri)?;
        let Some(ident) = lex::identifier_at(&analysis.tokens, offset) else {
            return Ok(None);
        };
        let span = ident.span();
        let definitions = self.find_definitions(uri, &ident.text)?;
        Ok(definitions.into_iter().next().map(|(_, decl)| QuickInfo {
            kind: decl.kind,
            display: decl.display,
            documentation: decl.documentation,
            span,
        }))
    }

    fn references_at(&self, uri: &Url, offset: u32) -> Result<Vec<ReferenceEntry>> {
        let analysis = self.analysis(uri)?;
        let Some(ident) = lex::identifier_at(&analysis.tokens, offset) else {
            return Ok(Vec::new());
        };
        let name = ident.text.clone();
        let mut references = Vec::new();
        for file in self.host.script_file_names() {
            let Ok(analysis) = self.analysis(&file) else {
                continue;
            };
            for token in &analysis.tokens {
                if token.kind == TokenKind::Identifier && token.text == name {
                    let span = token.span();
                    let is_definition = analysis
                        .declarations
                        .iter()
                        .any(|decl| decl.name_span == span);
                    references.push(ReferenceEntry {
                        uri: file.clone(),
                        span,
                        is_definition,
                    });
                }
            }
        }
        Ok(references)
    }

    fn navigation_tree(&self, uri: &Url) -> Result<NavigationTree> {
        let analysis = self.analysis(uri)?;
        let text_end = analysis
            .tokens
            .last()
            .map_or(0, |token| token.span().end());
        Ok(NavigationTree {
            text: path::basename(uri),
            kind: "module".to_string(),
            spans: vec![TextSpan::from_bounds(0, text_end)],
            child_items: build_tree(&analysis.declarations, None),
        })
    }

    fn navigate_to(&self, query: &str, limit: usize) -> Result<Vec<NavigateToItem>> {
        let needle = query.to_lowercase();
        let mut items = Vec::new();
        for file in self.host.script_file_names() {
            let Ok(analysis) = self.analysis(&file) else {
                continue;
            };
            for decl in &analysis.declarations {
                if !needle.is_empty() && !decl.name.to_lowercase().contains(&needle) {
                    continue;
                }
                items.push(NavigateToItem {
                    name: decl.name.clone(),
                    kind: decl.kind.clone(),
                    uri: file.clone(),
                    span: decl.decl_span,
                    container_name: decl.container.as_ref().map(|(name, _)| name.clone()),
                    container_kind: decl.container.as_ref().map(|(_, kind)| kind.clone()),
                });
                if items.len() >= limit {
                    return Ok(items);
                }
            }
        }
        Ok(items)
    }

    fn completions_at(&self, uri: &Url, _offset: u32) -> Result<Vec<CompletionEntry>> {
        let analysis = self.analysis(uri)?;
        let mut seen = FxHashSet::default();
        let mut entries = Vec::new();
        for decl in &analysis.declarations {
            if seen.insert(decl.name.clone()) {
                entries.push(CompletionEntry {
                    name: decl.name.clone(),
                    kind: decl.kind.clone(),
                    sort_text: decl.name.clone(),
                    detail: Some(decl.display.clone()),
                    documentation: (!decl.documentation.is_empty())
                        .then(|| decl.documentation.clone()),
                });
            }
        }
        Ok(entries)
    }

    fn diagnostics_for(&self, uri: &Url) -> Result<Vec<DiagnosticItem>> {
        let analysis = self.analysis(uri)?;
        Ok(analysis
            .lex_errors
            .iter()
            .map(|error| DiagnosticItem {
                uri: Some(uri.clone()),
                span: error.span,
                messages: vec![error.message.clone()],
                category: DiagnosticCategory::Error,
                code: error.code,
            })
            .collect())
    }

    fn program_files(&self) -> Vec<Url> {
        self.host.script_file_names()
    }

    fn identifiers_in(&self, uri: &Url) -> Result<Vec<IdentifierOccurrence>> {
        let analysis = self.analysis(uri)?;
        Ok(analysis
            .tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Identifier)
            .map(|token| IdentifierOccurrence {
                text: token.text.clone(),
                offset: token.offset,
            })
            .collect())
    }

    fn symbol_at(&self, uri: &Url, offset: u32) -> Result<Option<SymbolDescriptor>> {
        let analysis = self.analysis(uri)?;
        let Some(ident) = lex::identifier_at(&analysis.tokens, offset) else {
            return Ok(None);
        };
        let definitions = self.find_definitions(uri, &ident.text)?;
        Ok(definitions.into_iter().next().map(|(file, decl)| {
            SymbolDescriptor {
                name: Some(decl.name),
                kind: Some(decl.kind),
                container_name: decl.container.as_ref().map(|(name, _)| name.clone()),
                container_kind: decl.container.as_ref().map(|(_, kind)| kind.clone()),
                file_path: Some(file.path().to_string()),
                package: None,
            }
        }))
    }

    fn pre_process(&self, text: &str) -> PreProcessedFile {
        pre_process_text(text)
    }

    fn resolve_module_name(&self, specifier: &str, containing: &Url) -> Option<Url> {
        resolve::resolve_module_name(
            self.host.as_ref(),
            specifier,
            containing,
            &self.host.compilation_settings(),
        )
    }
}

fn build_tree(declarations: &[Declaration], parent: Option<&str>) -> Vec<NavigationTree> {
    declarations
        .iter()
        .filter(|decl| decl.container.as_ref().map(|(name, _)| name.as_str()) == parent)
        .map(|decl| NavigationTree {
            text: decl.name.clone(),
            kind: decl.kind.clone(),
            spans: vec![decl.decl_span],
            child_items: build_tree(declarations, Some(decl.name.as_str())),
        })
        .collect()
}

const MODIFIERS: &[&str] = &[
    "export", "declare", "abstract", "default", "async", "public", "private", "protected",
    "static", "readonly",
];

/// Scans a token stream for declarations.
///
/// Containers (classes, interfaces, enums, namespaces, functions) are
/// tracked through a brace-depth stack so nested declarations are
/// attributed and declaration spans run to the closing brace. Variable
/// declarations span the declarator, the way the compiler reports them.
pub fn extract_declarations(text: &str, tokens: &[Token]) -> Vec<Declaration> {
    let sig: Vec<&Token> = tokens
        .iter()
        .filter(|token| token.kind != TokenKind::Comment)
        .collect();
    let mut decls: Vec<Declaration> = Vec::new();
    let mut container_stack: Vec<(usize, i32)> = Vec::new();
    let mut pending_container: Option<usize> = None;
    let mut brace_depth = 0i32;
    let mut paren_depth = 0i32;
    let mut modifier_start: Option<u32> = None;
    let mut member_position = true;

    let container_of = |stack: &[(usize, i32)], decls: &[Declaration]| {
        stack
            .last()
            .map(|(idx, _)| (decls[*idx].name.clone(), decls[*idx].kind.clone()))
    };

    let mut i = 0usize;
    while i < sig.len() {
        let token = sig[i];
        match token.kind {
            TokenKind::Punct => {
                match token.text.as_str() {
                    "{" if paren_depth == 0 => {
                        brace_depth += 1;
                        if let Some(idx) = pending_container.take() {
                            container_stack.push((idx, brace_depth));
                        }
                        member_position = true;
                    }
                    "{" => brace_depth += 1,
                    "}" => {
                        let top = container_stack.last().copied();
                        if let Some((idx, depth)) = top {
                            if depth == brace_depth {
                                decls[idx].decl_span = TextSpan::from_bounds(
                                    decls[idx].decl_span.start,
                                    token.span().end(),
                                );
                                container_stack.pop();
                            }
                        }
                        brace_depth -= 1;
                        member_position = true;
                    }
                    "(" => {
                        paren_depth += 1;
                        member_position = false;
                    }
                    ")" => {
                        paren_depth -= 1;
                        member_position = false;
                    }
                    ";" | "," => {
                        if let Some(idx) = pending_container.take() {
                            // A bodiless signature; close it at the separator.
                            decls[idx].decl_span = TextSpan::from_bounds(
                                decls[idx].decl_span.start,
                                token.span().end(),
                            );
                        }
                        member_position = true;
                    }
                    _ => member_position = false,
                }
                if !matches!(token.text.as_str(), "{" | "}" | ";" | ",") {
                    modifier_start = None;
                }
            }
            TokenKind::Keyword => {
                let lexeme = token.text.as_str();
                if MODIFIERS.contains(&lexeme) {
                    if modifier_start.is_none() {
                        modifier_start = Some(token.offset);
                    }
                } else {
                    match lexeme {
                        "class" | "interface" | "enum" => {
                            if let Some(name) = identifier_after(&sig, i + 1) {
                                let start = modifier_start.take().unwrap_or(token.offset);
                                let container = container_of(&container_stack, &decls);
                                let display = slice_display(text, start, name.span().end());
                                let idx =
                                    push_decl(&mut decls, name, lexeme, start, display, container);
                                pending_container = Some(idx);
                                i += 1;
                            }
                        }
                        "namespace" | "module" => {
                            if let Some(name) = identifier_after(&sig, i + 1) {
                                let start = modifier_start.take().unwrap_or(token.offset);
                                let container = container_of(&container_stack, &decls);
                                let display = slice_display(text, start, name.span().end());
                                let idx = push_decl(
                                    &mut decls, name, "module", start, display, container,
                                );
                                pending_container = Some(idx);
                                i += 1;
                            }
                        }
                        "function" => {
                            let mut j = i + 1;
                            if sig.get(j).is_some_and(|token| token.text == "*") {
                                j += 1;
                            }
                            if let Some(name) = identifier_after(&sig, j) {
                                let start = modifier_start.take().unwrap_or(token.offset);
                                let display_end =
                                    params_end(&sig, j + 1).unwrap_or_else(|| name.span().end());
                                let container = container_of(&container_stack, &decls);
                                let display = slice_display(text, start, display_end);
                                let idx = push_decl(
                                    &mut decls, name, "function", start, display, container,
                                );
                                pending_container = Some(idx);
                                i = j;
                            }
                        }
                        "const" | "let" | "var" => {
                            let mut j = i + 1;
                            loop {
                                let Some(name) = identifier_after(&sig, j) else {
                                    break;
                                };
                                let (end, next) = declarator_end(&sig, j + 1);
                                let display =
                                    format!("{lexeme} {}", slice_display(text, name.offset, end));
                                let container = container_of(&container_stack, &decls);
                                let idx = push_decl(
                                    &mut decls,
                                    name,
                                    lexeme,
                                    name.offset,
                                    display,
                                    container,
                                );
                                decls[idx].decl_span = TextSpan::from_bounds(name.offset, end);
                                match next {
                                    Some(next) if sig[next].text == "," => j = next + 1,
                                    _ => break,
                                }
                            }
                            modifier_start = None;
                            i = j;
                        }
                        "type" => {
                            if let Some(name) = identifier_after(&sig, i + 1) {
                                let follows = sig.get(i + 2).map(|token| token.text.as_str());
                                if matches!(follows, Some("=" | "<")) {
                                    let start = modifier_start.take().unwrap_or(token.offset);
                                    let (end, _) = declarator_end(&sig, i + 1);
                                    let container = container_of(&container_stack, &decls);
                                    let display = slice_display(text, start, name.span().end());
                                    let idx = push_decl(
                                        &mut decls, name, "type", start, display, container,
                                    );
                                    decls[idx].decl_span = TextSpan::from_bounds(start, end);
                                    i += 1;
                                }
                            }
                        }
                        "constructor" => {
                            if !container_stack.is_empty()
                                && sig.get(i + 1).is_some_and(|token| token.text == "(")
                            {
                                let start = modifier_start.take().unwrap_or(token.offset);
                                let display_end =
                                    params_end(&sig, i + 1).unwrap_or_else(|| token.span().end());
                                let container = container_of(&container_stack, &decls);
                                let display = slice_display(text, start, display_end);
                                let idx = push_decl_named(
                                    &mut decls,
                                    "constructor".to_string(),
                                    token.span(),
                                    "constructor",
                                    start,
                                    display,
                                    container,
                                );
                                pending_container = Some(idx);
                            }
                        }
                        "get" | "set" => {
                            if !container_stack.is_empty() && member_position {
                                if let Some(name) = identifier_after(&sig, i + 1) {
                                    if sig.get(i + 2).is_some_and(|token| token.text == "(") {
                                        let start =
                                            modifier_start.take().unwrap_or(token.offset);
                                        let display_end = params_end(&sig, i + 2)
                                            .unwrap_or_else(|| name.span().end());
                                        let container = container_of(&container_stack, &decls);
                                        let display = slice_display(text, start, display_end);
                                        let idx = push_decl(
                                            &mut decls, name, "property", start, display,
                                            container,
                                        );
                                        pending_container = Some(idx);
                                        i += 1;
                                    }
                                }
                            }
                        }
                        _ => {
                            modifier_start = None;
                        }
                    }
                    member_position = false;
                }
            }
            TokenKind::Identifier => {
                if member_position
                    && !container_stack.is_empty()
                    && paren_depth == 0
                    && sig.get(i + 1).is_some_and(|token| token.text == "(")
                {
                    let start = modifier_start.take().unwrap_or(token.offset);
                    let display_end = params_end(&sig, i + 1).unwrap_or_else(|| token.span().end());
                    let container = container_of(&container_stack, &decls);
                    let display = slice_display(text, start, display_end);
                    let idx = push_decl_named(
                        &mut decls,
                        token.text.clone(),
                        token.span(),
                        "method",
                        start,
                        display,
                        container,
                    );
                    pending_container = Some(idx);
                }
                member_position = false;
                modifier_start = None;
            }
            _ => {
                member_position = false;
                modifier_start = None;
            }
        }
        i += 1;
    }

    attach_documentation(text, tokens, &mut decls);
    decls
}

fn identifier_after<'a>(sig: &[&'a Token], index: usize) -> Option<&'a Token> {
    sig.get(index)
        .copied()
        .filter(|token| token.kind == TokenKind::Identifier)
}

fn push_decl(
    decls: &mut Vec<Declaration>,
    name: &Token,
    kind: &str,
    start: u32,
    display: String,
    container: Option<(String, String)>,
) -> usize {
    push_decl_named(
        decls,
        name.text.clone(),
        name.span(),
        kind,
        start,
        display,
        container,
    )
}

#[allow(clippy::too_many_arguments)]
fn push_decl_named(
    decls: &mut Vec<Declaration>,
    name: String,
    name_span: TextSpan,
    kind: &str,
    start: u32,
    display: String,
    container: Option<(String, String)>,
) -> usize {
    decls.push(Declaration {
        name,
        kind: kind.to_string(),
        name_span,
        decl_span: TextSpan::from_bounds(start, name_span.end()),
        container,
        display,
        documentation: String::new(),
    });
    decls.len() - 1
}

/// End offset of a declarator: the last token before a top-level `,` or
/// `;` (or the end of input). Returns the separator index as well.
fn declarator_end(sig: &[&Token], from: usize) -> (u32, Option<usize>) {
    let mut depth = 0i32;
    let mut end = sig
        .get(from.saturating_sub(1))
        .map_or(0, |token| token.span().end());
    let mut i = from;
    while i < sig.len() {
        let token = sig[i];
        match token.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                if depth == 0 {
                    return (end, Some(i));
                }
                depth -= 1;
            }
            ";" | "," if depth == 0 => return (end, Some(i)),
            _ => {}
        }
        end = token.span().end();
        i += 1;
    }
    (end, None)
}

/// End offset of a parameter list starting at an opening paren.
fn params_end(sig: &[&Token], open: usize) -> Option<u32> {
    if !sig.get(open).is_some_and(|token| token.text == "(") {
        return None;
    }
    let mut depth = 0i32;
    for token in sig.iter().skip(open) {
        match token.text.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Some(token.span().end());
                }
            }
            _ => {}
        }
    }
    None
}

fn slice_display(text: &str, start: u32, end: u32) -> String {
    text.get(start as usize..end as usize)
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attaches the nearest leading block comment to each declaration.
fn attach_documentation(text: &str, tokens: &[Token], decls: &mut [Declaration]) {
    for decl in decls.iter_mut() {
        let start = decl.decl_span.start;
        let doc = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Comment)
            .filter(|token| token.span().end() <= start)
            .filter(|token| {
                text.get(token.span().end() as usize..start as usize)
                    .is_some_and(|gap| gap.chars().all(char::is_whitespace))
            })
            .next_back();
        if let Some(comment) = doc {
            decl.documentation = clean_comment(&comment.text);
        }
    }
}

fn clean_comment(raw: &str) -> String {
    let body = raw
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/")
        .trim_start_matches("//");
    body.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts imports, requires and triple-slash references from a text.
pub fn pre_process_text(text: &str) -> PreProcessedFile {
    let (tokens, _) = lex::tokenize(text);
    let mut imported = Vec::new();
    let mut referenced = Vec::new();
    let sig: Vec<&Token> = tokens
        .iter()
        .filter(|token| token.kind != TokenKind::Comment)
        .collect();

    for token in &tokens {
        if token.kind == TokenKind::Comment && token.text.starts_with("///") {
            if let Some(reference) = reference_path(&token.text) {
                referenced.push(reference);
            }
        }
    }

    let mut i = 0usize;
    while i < sig.len() {
        let token = sig[i];
        match (token.kind, token.text.as_str()) {
            (TokenKind::Keyword, "import") => {
                if let Some(next) = sig.get(i + 1) {
                    if next.kind == TokenKind::String {
                        imported.push(next.text.clone());
                        i += 1;
                    } else if let Some(specifier) = statement_specifier(&sig, i + 1) {
                        imported.push(specifier);
                    }
                }
            }
            (TokenKind::Keyword, "export") => {
                if let Some(specifier) = statement_specifier(&sig, i + 1) {
                    imported.push(specifier);
                }
            }
            (TokenKind::Identifier, "require") => {
                if sig.get(i + 1).is_some_and(|token| token.text == "(") {
                    if let Some(argument) = sig.get(i + 2) {
                        if argument.kind == TokenKind::String {
                            imported.push(argument.text.clone());
                            i += 2;
                        }
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    dedup(&mut imported);
    dedup(&mut referenced);
    PreProcessedFile {
        imported_files: imported,
        referenced_files: referenced,
    }
}

/// Scans forward inside one statement for `from "specifier"` or
/// `require("specifier")`.
fn statement_specifier(sig: &[&Token], from: usize) -> Option<String> {
    for i in from..sig.len() {
        let token = sig[i];
        match (token.kind, token.text.as_str()) {
            (TokenKind::Punct, ";") => return None,
            (TokenKind::Keyword, "from") => {
                return sig
                    .get(i + 1)
                    .filter(|next| next.kind == TokenKind::String)
                    .map(|next| next.text.clone());
            }
            (TokenKind::Identifier, "require") => {
                if sig.get(i + 1).is_some_and(|next| next.text == "(") {
                    return sig
                        .get(i + 2)
                        .filter(|argument| argument.kind == TokenKind::String)
                        .map(|argument| argument.text.clone());
                }
            }
            // `import`/`export` without a module specifier runs into the
            // next statement's keyword; stop there.
            (TokenKind::Keyword, "import" | "export" | "const" | "let" | "var" | "function"
            | "class" | "interface" | "enum") if i > from => return None,
            _ => {}
        }
    }
    None
}

fn reference_path(comment: &str) -> Option<String> {
    let idx = comment.find("path")?;
    let rest = &comment[idx + 4..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn dedup(values: &mut Vec<String>) {
    let mut seen = FxHashSet::default();
    values.retain(|value| seen.insert(value.clone()));
}
