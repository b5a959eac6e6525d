//! Quill server binary — the main entry point for the quill blog service.
//!
//! `quill-server serve` starts an axum HTTP server with structured logging,
//! per-request database wiring, and graceful shutdown on SIGTERM/SIGINT.
//! `quill-server init-db` clears the existing data and creates new tables.

use std::net::SocketAddr;
use std::path::Path;

use clap::{Parser, Subcommand};
use quill_db::{init_db, RequestContext};
use quill_server::config::{self, Config};
use quill_server::{app, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quill-server", about = "Quill blog service backend", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (the default when no subcommand is given).
    Serve,
    /// Clear the existing data and create new tables.
    InitDb,
}

fn resolve_config_path(flag: Option<String>) -> (Option<String>, &'static str) {
    if let Some(path) = flag.filter(|value| !value.trim().is_empty()) {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("QUILL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Creates the database file's parent directory. The connection layer only
/// opens files; making room for them is the factory's job.
fn ensure_database_dir(db_path: &str) {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .expect("failed to create database directory — check database.path in config");
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let (resolved_config_path, config_source) = resolve_config_path(cli.config);
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    init_tracing(&config.logging);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    ensure_database_dir(&config.database.path);

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => run_init_db(&config),
        Command::Serve => {
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("failed to build tokio runtime")
                .block_on(serve(config));
        }
    }
}

/// The administrative bootstrap command: drops and recreates all tables.
///
/// Any failure aborts with a non-zero exit and no confirmation text.
fn run_init_db(config: &Config) {
    let ctx = RequestContext::new(config.database.connection_settings());
    let db = ctx
        .db()
        .expect("failed to open database — check database.path in config");

    init_db(&db, &config.database.schema_source())
        .expect("failed to initialize the database schema");

    ctx.close();
    println!("Initialized the database.");
}

async fn serve(config: Config) {
    let state = AppState {
        db: config.database.connection_settings(),
    };

    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting quill server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("quill server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
