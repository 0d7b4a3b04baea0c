// kart_server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use kartflow::Flows;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use kart_server::clock::SystemClock;
use kart_server::config::{AppConfig, LogFormat, StorageBackend};
use kart_server::db::memory::MemoryBackend;
use kart_server::db::postgres::PgPools;
use kart_server::errors::AppError;
use kart_server::flows::register_all_flows;
use kart_server::services::{gateway, reaper};
use kart_server::state::AppState;
use kart_server::web::configure_app_routes;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  // LOG_FORMAT is read before the full config so config loading is itself logged.
  let _ = dotenvy::dotenv();
  let log_format = match std::env::var("LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
    Ok(v) if v == "json" => LogFormat::Json,
    _ => LogFormat::Pretty,
  };
  init_tracing(log_format);
  tracing::info!("Starting kart server...");

  let app_config = Arc::new(AppConfig::from_env().context("loading configuration")?);

  let (stores, pools) = match app_config.storage_backend {
    StorageBackend::Postgres => {
      let ledger_url = app_config
        .ledger_database_url
        .as_deref()
        .context("ledger database url missing")?;
      let catalog_url = app_config
        .catalog_database_url
        .as_deref()
        .context("catalog database url missing")?;
      let pools = PgPools::connect(ledger_url, catalog_url, app_config.db_max_connections)
        .await
        .context("connecting to postgres")?;
      pools.init_schema().await.context("initialising schema")?;
      tracing::info!("Connected to the ledger and catalog databases.");
      (pools.stores(), Some(pools))
    }
    StorageBackend::Memory => {
      tracing::warn!("Using in-memory stores; nothing survives a restart.");
      (MemoryBackend::new().stores(), None)
    }
  };

  let flows = Arc::new(Flows::<AppError>::new());
  let app_state = AppState {
    stores,
    gateway: gateway::from_config(&app_config).context("building payment gateway")?,
    clock: Arc::new(SystemClock),
    config: app_config.clone(),
    flows: flows.clone(),
  };
  register_all_flows(&flows, &app_state);

  let reaper = reaper::spawn(app_state.clone());

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  let server_state = app_state.clone();
  let served = HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(server_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("binding {}", server_address))?
  .run()
  .await;

  reaper.stop().await;
  if let Some(pools) = pools {
    pools.close().await;
  }
  tracing::info!("Server stopped.");
  served.context("running http server")
}
