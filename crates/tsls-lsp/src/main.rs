//! `tsls` - a TypeScript/JavaScript language-analysis server.
//!
//! Listens for JSON-RPC connections over TCP and serves one LSP session
//! per connection. In strict mode workspace content is fetched from the
//! client; otherwise it is read from the local disk beneath the
//! workspace root.

mod client;
mod ext;
mod handlers;
mod remote;
mod server;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_lsp::Server;
use tracing::info;

use tsls_backend::ScannerBackendFactory;

use crate::server::TsLanguageServer;
use crate::state::ServerOptions;

#[derive(Debug, Parser)]
#[command(name = "tsls", version, about = "TypeScript/JavaScript language server")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 2089)]
    port: u16,

    /// Maximum number of concurrently served connections.
    #[arg(long, default_value_t = num_cpus::get())]
    cluster: usize,

    /// Fetch workspace content from the client instead of local disk.
    #[arg(long)]
    strict: bool,

    /// Log JSON-RPC traffic.
    #[arg(long)]
    trace: bool,

    /// Write logs to a file instead of stderr.
    #[arg(long)]
    logfile: Option<PathBuf>,
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let default_level = if args.trace { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    match &args.logfile {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot open logfile {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let options = ServerOptions {
        strict: args.strict,
        factory: Arc::new(ScannerBackendFactory),
        apply_plugin: None,
    };

    let listener = TcpListener::bind(("127.0.0.1", args.port))
        .await
        .with_context(|| format!("cannot listen on port {}", args.port))?;
    info!("tsls listening on 127.0.0.1:{} (cluster {})", args.port, args.cluster);

    let connections = Arc::new(Semaphore::new(args.cluster.max(1)));
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("failed to accept connection")?;
        let permit = Arc::clone(&connections)
            .acquire_owned()
            .await
            .context("connection limiter closed")?;
        info!("connection from {peer}");
        let options = options.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let (read, write) = tokio::io::split(stream);
            let (service, socket) = TsLanguageServer::service(options);
            Server::new(read, write, socket).serve(service).await;
            info!("connection from {peer} closed");
        });
    }
}
