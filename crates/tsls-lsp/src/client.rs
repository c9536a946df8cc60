//! The server-to-client surface the core depends on.
//!
//! The project model and publisher talk to a [`LanguageClient`] rather
//! than the transport's client type, so tests can capture publishes.

use async_trait::async_trait;
use tower_lsp::lsp_types::{Diagnostic, MessageType, Url};

#[async_trait]
pub trait LanguageClient: Send + Sync {
    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>);

    async fn log_message(&self, typ: MessageType, message: String);
}

#[async_trait]
impl LanguageClient for tower_lsp::Client {
    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        tower_lsp::Client::publish_diagnostics(self, uri, diagnostics, None).await;
    }

    async fn log_message(&self, typ: MessageType, message: String) {
        tower_lsp::Client::log_message(self, typ, message).await;
    }
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use parking_lot::Mutex;

    /// Captures everything published for assertions.
    #[derive(Default)]
    pub struct RecordingClient {
        pub published: Mutex<Vec<(Url, Vec<Diagnostic>)>>,
        pub logged: Mutex<Vec<(MessageType, String)>>,
    }

    #[async_trait]
    impl LanguageClient for RecordingClient {
        async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
            self.published.lock().push((uri, diagnostics));
        }

        async fn log_message(&self, typ: MessageType, message: String) {
            self.logged.lock().push((typ, message));
        }
    }
}
