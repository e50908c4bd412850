//! `shelf`: serve a personal e-book library over HTTP.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use futures::TryStreamExt;
use shelf_api::BookResource;
use shelf_catalog::{Database, Repository};
use shelf_config::{Config, ServerConfig};
use shelf_library::{Library, SweepEvent, SweepOptions};
use shelf_storage::BackendHandle;
use shelf_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shelf", version, about = "Personal e-book library server")]
struct Cli {
    /// Configuration file [default: config.toml in the platform config directory]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Remove uploaded files that no book refers to any more
    Sweep {
        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
        /// Leave files modified within this many minutes alone
        #[arg(long, default_value_t = 10)]
        min_age_minutes: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let db = Database::connect(&config.library.database).await.or_raise(|| ErrorKind::Catalog)?;
    let backend: BackendHandle =
        Arc::new(LocalBackend::new("uploads", &config.library.upload_dir).or_raise(|| ErrorKind::Storage)?);
    tracing::info!(
        database = %config.library.database.display(),
        uploads = %config.library.upload_dir.display(),
        "Library opened"
    );
    let library = Library::new(backend, Repository::from(&db), config.library_settings());

    let result = match cli.command {
        Command::Serve => serve(library, &config.server).await,
        Command::Sweep { dry_run, min_age_minutes } => {
            let options = SweepOptions { dry_run, min_age: time::Duration::minutes(min_age_minutes.into()) };
            sweep(&library, options).await
        },
    };
    db.close().await;
    result
}

async fn serve(library: Library, server: &ServerConfig) -> Result<()> {
    let resource = BookResource::new(Arc::new(library)).embed_covers(server.embed_covers);
    let app = shelf_api::router(resource, server.max_upload_bytes);
    let listener = TcpListener::bind(server.listen).await.or_raise(|| ErrorKind::Bind(server.listen))?;
    tracing::info!(address = %server.listen, "Listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.or_raise(|| ErrorKind::Serve)?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Could not listen for Ctrl+C, stopping now");
    }
}

async fn sweep(library: &Library, options: SweepOptions) -> Result<()> {
    let mut events = std::pin::pin!(library.sweep(options));
    while let Some(event) = events.try_next().await.or_raise(|| ErrorKind::Sweep)? {
        match event {
            SweepEvent::Started { books } => tracing::info!(books, dry_run = options.dry_run, "Sweeping uploads"),
            SweepEvent::Released { .. } => {},
            SweepEvent::SkippedRecent { path } => {
                tracing::info!(path = %path.display(), "Orphan is too recent to remove, skipping")
            },
            SweepEvent::Complete { released, bytes } if options.dry_run => {
                tracing::info!(files = released, bytes, "Dry run complete, nothing was removed")
            },
            SweepEvent::Complete { released, bytes } => tracing::info!(files = released, bytes, "Sweep complete"),
        }
    }
    Ok(())
}
