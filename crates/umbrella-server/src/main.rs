use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use umbrella_hardware::mock::MockNfcReader;
use umbrella_reader::{NotificationBus, ReaderController};
use umbrella_server::{AppState, LogFormat, ServerConfig, StoreKind, router};
use umbrella_storage::{
    AnyStatusStore, Database, PostgrestStatusStore, SqliteStatusStore, UmbrellaService,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_format);
    config.validate().context("invalid configuration")?;

    info!("Umbrella desk server v{}", umbrella_core::VERSION);

    let (store, database) = open_store(&config).await?;
    info!(backend = store.backend_name(), "status store ready");
    let service = UmbrellaService::new(store);
    if let Err(e) = service.health_check().await {
        warn!(
            backend = service.store().backend_name(),
            error = %e,
            "store health check failed, continuing"
        );
    }

    let (reader, simulator) = MockNfcReader::new();
    let controller = Arc::new(ReaderController::new(
        reader,
        service,
        NotificationBus::new(config.event_capacity),
        config.reader_config(),
    ));
    info!(reader = %controller.reader_info().name, "reader attached");

    if config.auto_start {
        let outcome = controller.start().await;
        info!(?outcome, "reader auto-start");
    }

    let app = router(AppState::new(Arc::clone(&controller)).with_simulator(simulator));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    controller.shutdown().await;
    if let Some(database) = database {
        database.close().await;
    }
    info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn open_store(config: &ServerConfig) -> Result<(AnyStatusStore, Option<Database>)> {
    match config.store {
        StoreKind::Sqlite => {
            let database = Database::new(config.database_config())
                .await
                .with_context(|| format!("failed to open database {}", config.database_path))?;
            info!(path = %config.database_path, "using SQLite store");
            let store = SqliteStatusStore::from_database(&database);
            Ok((store.into(), Some(database)))
        }
        StoreKind::Supabase => {
            let store = PostgrestStatusStore::new(config.supabase_config()?)
                .context("failed to configure Supabase store")?;
            info!("using Supabase store");
            Ok((store.into(), None))
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
