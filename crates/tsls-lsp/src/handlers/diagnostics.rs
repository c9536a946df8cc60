//! Diagnostics publishing.
//!
//! The publisher remembers which files last went out with problems so a
//! file whose diagnostics have cleared receives one empty publish, which
//! is what makes the client drop its markers.

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tower_lsp::lsp_types::{Diagnostic, NumberOrString, Url};
use tracing::debug;

use tsls_backend::DiagnosticItem;
use tsls_vfs::InMemoryFileSystem;

use crate::client::LanguageClient;
use crate::state::Workspace;

use super::lsp_utils::{severity, span_to_range};

#[derive(Default)]
pub struct DiagnosticsPublisher {
    problem_files: Mutex<FxHashSet<Url>>,
}

impl DiagnosticsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes one batch of diagnostics, grouped by file. Diagnostics
    /// without a file are dropped. Files that had problems last round and
    /// are absent from this batch go out with an empty list.
    pub async fn publish(
        &self,
        client: &dyn LanguageClient,
        fs: &InMemoryFileSystem,
        items: Vec<DiagnosticItem>,
    ) {
        let mut grouped: FxHashMap<Url, Vec<Diagnostic>> = FxHashMap::default();
        for item in items {
            let Some(uri) = item.uri.clone() else {
                continue;
            };
            let entry = grouped.entry(uri.clone()).or_default();
            match fs.get_content(&uri) {
                Ok(content) => entry.push(translate(&content, &item)),
                Err(err) => debug!("diagnostic for unavailable file {uri}: {err}"),
            }
        }

        let previous = std::mem::take(&mut *self.problem_files.lock());
        for uri in previous {
            grouped.entry(uri).or_default();
        }

        let mut ordered: Vec<_> = grouped.into_iter().collect();
        ordered.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let mut now_problematic = FxHashSet::default();
        for (uri, diagnostics) in ordered {
            if !diagnostics.is_empty() {
                now_problematic.insert(uri.clone());
            }
            client.publish_diagnostics(uri, diagnostics).await;
        }
        self.problem_files.lock().extend(now_problematic);
    }
}

fn translate(content: &str, item: &DiagnosticItem) -> Diagnostic {
    Diagnostic {
        range: span_to_range(content, item.span),
        severity: Some(severity(item.category)),
        code: Some(NumberOrString::Number(item.code as i32)),
        source: Some("ts".to_string()),
        message: item.messages.join("\n"),
        ..Diagnostic::default()
    }
}

/// Recomputes and publishes diagnostics for the program that owns `uri`.
pub async fn update_for(client: &dyn LanguageClient, workspace: &Workspace, uri: &Url) {
    let Ok(config) = workspace.manager.configuration_for(uri) else {
        return;
    };
    let Ok(service) = config.service() else {
        return;
    };
    let mut files = service.program_files();
    if !files.contains(uri) {
        files.push(uri.clone());
    }
    let mut items = Vec::new();
    for file in files {
        match service.diagnostics_for(&file) {
            Ok(diagnostics) => items.extend(diagnostics),
            Err(err) => debug!("no diagnostics for {file}: {err}"),
        }
    }
    workspace.publisher.publish(client, &workspace.fs, items).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tsls_backend::{DiagnosticCategory, TextSpan};
    use tsls_vfs::LibrarySet;

    use crate::client::recording::RecordingClient;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn fs_with(files: &[(&str, &str)]) -> InMemoryFileSystem {
        let fs = InMemoryFileSystem::new(
            uri("file:///src"),
            Arc::new(LibrarySet::new("5.4.5")),
        );
        for (path, text) in files {
            fs.add(&uri(path), Some((*text).to_string()));
        }
        fs
    }

    fn error(file: &str, code: i64, message: &str) -> DiagnosticItem {
        DiagnosticItem {
            uri: Some(uri(file)),
            span: TextSpan::new(6, 4),
            messages: vec![message.to_string()],
            category: DiagnosticCategory::Error,
            code,
        }
    }

    #[tokio::test]
    async fn publishes_grouped_diagnostics_with_protocol_shape() {
        let fs = fs_with(&[("file:///src/dummy.ts", "const text: string = 33;")]);
        let client = RecordingClient::default();
        let publisher = DiagnosticsPublisher::new();

        publisher
            .publish(
                &client,
                &fs,
                vec![error(
                    "file:///src/dummy.ts",
                    2322,
                    "Type '33' is not assignable to type 'string'.",
                )],
            )
            .await;

        let published = client.published.lock();
        assert_eq!(published.len(), 1);
        let (file, diagnostics) = &published[0];
        assert_eq!(file, &uri("file:///src/dummy.ts"));
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.code, Some(NumberOrString::Number(2322)));
        assert_eq!(diagnostic.source.as_deref(), Some("ts"));
        assert!(diagnostic.message.starts_with("Type '33' is not assignable"));
        assert_eq!(
            diagnostic.severity,
            Some(tower_lsp::lsp_types::DiagnosticSeverity::ERROR)
        );
    }

    #[tokio::test]
    async fn cleared_files_receive_an_empty_publish() {
        let fs = fs_with(&[("file:///src/a.ts", "const a: string = 1;")]);
        let client = RecordingClient::default();
        let publisher = DiagnosticsPublisher::new();

        publisher
            .publish(&client, &fs, vec![error("file:///src/a.ts", 2322, "bad")])
            .await;
        client.published.lock().clear();

        // The next update no longer mentions a.ts: one empty publish.
        publisher.publish(&client, &fs, Vec::new()).await;
        {
            let published = client.published.lock();
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].0, uri("file:///src/a.ts"));
            assert!(published[0].1.is_empty());
        }
        client.published.lock().clear();

        // Once cleared, the file is forgotten.
        publisher.publish(&client, &fs, Vec::new()).await;
        assert!(client.published.lock().is_empty());
    }

    #[tokio::test]
    async fn a_problem_moving_between_files_clears_the_old_one() {
        let fs = fs_with(&[
            ("file:///src/a.ts", "const a: string = 1;"),
            ("file:///src/b.ts", "const b = 2;"),
        ]);
        let client = RecordingClient::default();
        let publisher = DiagnosticsPublisher::new();

        publisher
            .publish(&client, &fs, vec![error("file:///src/a.ts", 2322, "bad")])
            .await;
        client.published.lock().clear();

        publisher
            .publish(&client, &fs, vec![error("file:///src/b.ts", 2322, "bad")])
            .await;

        let published = client.published.lock();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, uri("file:///src/a.ts"));
        assert!(published[0].1.is_empty());
        assert_eq!(published[1].0, uri("file:///src/b.ts"));
        assert_eq!(published[1].1.len(), 1);
    }

    #[tokio::test]
    async fn diagnostics_without_a_file_are_dropped() {
        let fs = fs_with(&[]);
        let client = RecordingClient::default();
        let publisher = DiagnosticsPublisher::new();
        publisher
            .publish(
                &client,
                &fs,
                vec![DiagnosticItem {
                    uri: None,
                    span: TextSpan::default(),
                    messages: vec!["global problem".to_string()],
                    category: DiagnosticCategory::Error,
                    code: 1,
                }],
            )
            .await;
        assert!(client.published.lock().is_empty());
    }

    #[tokio::test]
    async fn multi_part_messages_join_with_newlines() {
        let fs = fs_with(&[("file:///src/a.ts", "const a = 1;")]);
        let client = RecordingClient::default();
        let publisher = DiagnosticsPublisher::new();
        publisher
            .publish(
                &client,
                &fs,
                vec![DiagnosticItem {
                    uri: Some(uri("file:///src/a.ts")),
                    span: TextSpan::new(0, 5),
                    messages: vec!["outer message".to_string(), "inner detail".to_string()],
                    category: DiagnosticCategory::Warning,
                    code: 7,
                }],
            )
            .await;
        let published = client.published.lock();
        assert_eq!(published[0].1[0].message, "outer message\ninner detail");
    }
}
