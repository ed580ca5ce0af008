//! roster-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `ROSTER_*` environment variables, connects to the directory, and serves
//! the membership API over HTTP.
//!
//! # Password hash generation
//!
//! To produce a `userPassword` value for seeding the directory:
//!
//! ```text
//! cargo run -p roster-server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use roster_core::{directory::DirectoryStore, group, layout::DirectoryLayout, password};
use roster_ldap::LdapDirectory;
use roster_memory::MemoryDirectory;
use roster_server::{
  AppState, BackendKind, ServerConfig,
  mailer::{LogTransport, MailQueue, TemplateRenderer},
  tokens::JwtTokenService,
};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roster membership server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the `{ARGON2}` hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let secret = read_password()?;
    let hash = password::hash_password(&secret).context("failed to hash password")?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("ROSTER")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  match server_cfg.backend {
    BackendKind::Ldap => {
      let ldap_cfg = server_cfg
        .ldap
        .clone()
        .context("backend \"ldap\" needs an [ldap] section")?;
      let directory = LdapDirectory::new(ldap_cfg);
      directory
        .connect()
        .await
        .context("failed to connect to the directory")?;
      serve(directory, server_cfg).await
    }
    BackendKind::Memory => {
      tracing::warn!("using the in-memory directory; nothing will be persisted");
      let directory = MemoryDirectory::new();
      seed_general_group(&directory, &server_cfg.directory).await?;
      serve(directory, server_cfg).await
    }
  }
}

async fn serve<D: DirectoryStore + 'static>(
  directory: D,
  server_cfg: ServerConfig,
) -> anyhow::Result<()> {
  let (mail_queue, _worker) = MailQueue::spawn(
    server_cfg.mail_queue_capacity,
    TemplateRenderer::new(&server_cfg.template_dir, &server_cfg.frontend_url),
    LogTransport,
  );

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(
    Arc::new(directory),
    server_cfg.clone(),
    Arc::new(JwtTokenService::new(&server_cfg.jwt_secret)),
    Arc::new(mail_queue),
  );
  let app = roster_server::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// An empty in-memory directory still needs the general group, or activation
/// fails on its last step.
async fn seed_general_group(
  directory: &MemoryDirectory,
  layout: &DirectoryLayout,
) -> anyhow::Result<()> {
  let ou = &layout.general_group;
  directory
    .add(
      &layout.group_dn(ou),
      &[group::GROUP_CLASS, "top"],
      vec![
        (group::attr::OU.to_owned(), vec![ou.clone()]),
        (group::attr::COMMON_NAME.to_owned(), vec![ou.clone()]),
      ],
    )
    .await
    .context("failed to seed the general group")
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
