//! carewatch server binary.
//!
//! Reads `carewatch.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and either serves the risk API over HTTP or runs
//! one batch scoring pass.
//!
//! ```
//! cargo run -p carewatch-server -- serve
//! cargo run -p carewatch-server -- batch --state IL
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use carewatch_core::{
  engine::RiskEngine,
  fact::FacilityFilter,
  profile::ScoringProfile,
};
use carewatch_engine::{BatchOptions, RiskService, cancellation};
use carewatch_store_sqlite::SqliteStore;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use settings::Settings;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Carewatch facility risk engine")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "carewatch.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the risk API over HTTP.
  Serve,
  /// Score every matching facility and persist one snapshot each.
  Batch(BatchArgs),
}

#[derive(Args)]
struct BatchArgs {
  /// Only score facilities in this state.
  #[arg(long)]
  state: Option<String>,

  /// Only score this facility.
  #[arg(long)]
  facility: Option<String>,

  /// Timestamp stamped on every snapshot of the run. Re-using one replaces
  /// that run's rows. Defaults to now.
  #[arg(long)]
  calculated_at: Option<DateTime<Utc>>,
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
  let settings = Settings::load(&cli.config)?;

  // Open SQLite store.
  let store_path = settings.resolved_store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let profile = ScoringProfile::named(settings.scoring_profile);
  tracing::info!(
    profile = profile.name(),
    model_version = %profile.model_version(),
    lookback_months = settings.lookback_months,
    "scoring profile selected"
  );
  let engine = RiskEngine::new(profile).with_lookback_months(settings.lookback_months);
  let service = Arc::new(RiskService::new(Arc::new(store), engine));

  match cli.command {
    Command::Serve => serve(service, &settings).await,
    Command::Batch(args) => batch(service, &settings, args).await,
  }
}

async fn serve(service: Arc<RiskService<SqliteStore>>, settings: &Settings) -> anyhow::Result<()> {
  let app = carewatch_api::api_router(service).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", settings.host, settings.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
    })
    .await
    .context("server error")?;

  Ok(())
}

async fn batch(
  service: Arc<RiskService<SqliteStore>>,
  settings: &Settings,
  args: BatchArgs,
) -> anyhow::Result<()> {
  let options = BatchOptions {
    filter:        FacilityFilter { state: args.state, facility_id: args.facility },
    calculated_at: args.calculated_at.unwrap_or_else(Utc::now),
    workers:       settings.batch.workers(),
    flush_size:    settings.batch.flush_size,
  };

  // Ctrl-C stops dispatch; computed snapshots are still flushed.
  let (handle, token) = cancellation();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("interrupt received, finishing in-flight facilities");
      handle.cancel();
    }
  });

  let report = service
    .run_batch(options, token)
    .await
    .context("batch run failed")?;

  println!(
    "{}",
    serde_json::to_string_pretty(&report).context("failed to serialise batch report")?
  );
  Ok(())
}
