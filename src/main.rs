use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use beacon::admin::create_admin_router;
use beacon::config::{Config, SiteRegistry};
use beacon::ingest::create_ingest_router;
use beacon::mailer::LogMailer;
use beacon::server::{supervise, Listener};
use beacon::state::AppContext;
use beacon::storage::{NoopStorage, SqliteStorage, Storage};

/// Pool size for the event log database
const DB_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let sites = SiteRegistry::load(&config.site_config_path)
        .with_context(|| format!("failed to load site config from {}", config.site_config_path))?;
    info!(
        sites = sites.sites().len(),
        ignored_nets = sites.ignored_nets().len(),
        "Loaded configuration from {}",
        config.site_config_path
    );

    let storage = open_storage(sites.database_url()).await;

    let state = Arc::new(AppContext::new(
        sites,
        storage,
        Arc::new(LogMailer),
        config.ingest.clone(),
        config.contact.clone(),
    )?);

    let listeners = vec![
        Listener::new(
            "public",
            config.public_server.addr(),
            create_ingest_router(Arc::clone(&state)),
        ),
        Listener::new(
            "admin",
            config.admin_server.addr(),
            create_admin_router(Arc::clone(&state)),
        ),
    ];
    let listener_count = listeners.len();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor = tokio::spawn(supervise(listeners, shutdown_rx));

    let results = tokio::select! {
        joined = &mut supervisor => joined.context("listener supervisor panicked")?,
        _ = shutdown_signal() => {
            info!("Shutdown requested, draining in-flight requests");
            let _ = shutdown_tx.send(true);
            supervisor.await.context("listener supervisor panicked")?
        }
    };

    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
    if failed == listener_count {
        anyhow::bail!("all listeners failed");
    }
    Ok(())
}

/// Open the durable event log, or fall back to a no-op sink so the process
/// keeps serving live metrics
async fn open_storage(database_url: Option<&str>) -> Arc<dyn Storage> {
    let Some(url) = database_url else {
        warn!("No database configured, events will not be persisted");
        return Arc::new(NoopStorage);
    };

    let storage = match SqliteStorage::new(url, DB_MAX_CONNECTIONS).await {
        Ok(storage) => storage,
        Err(e) => {
            warn!(error = %e, "Could not open database {url}, events will not be persisted");
            return Arc::new(NoopStorage);
        }
    };
    if let Err(e) = storage.init().await {
        warn!(error = %e, "Could not initialize database {url}, events will not be persisted");
        return Arc::new(NoopStorage);
    }

    info!("Using SQLite storage: {}", url);
    Arc::new(storage)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
