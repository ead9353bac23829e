//! carnet server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the JSON API under `/api`.
//!
//! # Administrators
//!
//! Administrators cannot self-register. Create one from the command line,
//! typing the password on stdin:
//!
//! ```text
//! cargo run -p carnet-server -- --create-admin root@clinic.example
//! ```

mod settings;

use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use carnet_api::auth::hash_password;
use carnet_core::{registration::NewAccount, service::RecordService};
use carnet_document::XhtmlRenderer;
use carnet_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Carnet medical record server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: std::path::PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create an administrator with this email, password read from stdin,
  /// and exit.
  #[arg(long, value_name = "EMAIL")]
  create_admin: Option<String>,

  /// First name of the administrator created with `--create-admin`.
  #[arg(long, default_value = "")]
  first_name: String,

  /// Last name of the administrator created with `--create-admin`.
  #[arg(long, default_value = "")]
  last_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let hash = hash_password(&password).context("failed to hash password")?;
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = ServerConfig::load(&cli.config).context("failed to read configuration")?;

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let renderer = XhtmlRenderer::new(server_cfg.export_title.clone());
  let service = RecordService::new(Arc::new(store), Arc::new(renderer));

  // Helper mode: provision an administrator and exit.
  if let Some(email) = cli.create_admin {
    let account = NewAccount::admin(&email, &cli.first_name, &cli.last_name)
      .context("invalid administrator email")?;
    let password = read_password()?;
    let hash = hash_password(&password).context("failed to hash password")?;
    let created = service
      .register(account, hash)
      .await
      .context("failed to create administrator")?;
    println!("created administrator {}", created.actor.actor_id);
    return Ok(());
  }

  let app = Router::new()
    .nest("/api", carnet_api::api_router(service))
    .layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\r', '\n']).to_owned();
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  Ok(password)
}
